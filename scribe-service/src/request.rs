use crate::audio::AudioClip;
use crate::config::ProviderKind;
use crate::error::{ScribeError, ScribeResult};
use crate::quota::QuotaContext;
use crate::schema::FormSchema;

/// Per-request model selection
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    /// `model` or `provider/model`
    pub chat_model: Option<String>,
    pub audio_model: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptionRequest {
    pub clips: Vec<AudioClip>,
    pub schema: Option<FormSchema>,
    /// Typed clinician notes sent alongside the transcript
    pub text: Option<String>,
    /// Transcript from an earlier run; the audio is not transcribed again
    pub transcript: Option<String>,
    pub prompt: Option<String>,
    pub overrides: ModelOverrides,
    pub quota: Option<QuotaContext>,
}

impl TranscriptionRequest {
    pub fn new(clips: Vec<AudioClip>) -> Self {
        Self {
            clips,
            ..Self::default()
        }
    }

    pub fn single(clip: AudioClip) -> Self {
        Self::new(vec![clip])
    }

    pub fn with_schema(mut self, schema: FormSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.overrides.chat_model = Some(model.into());
        self
    }

    pub fn with_audio_model(mut self, model: impl Into<String>) -> Self {
        self.overrides.audio_model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.overrides.temperature = Some(temperature);
        self
    }

    pub fn with_quota(mut self, quota: QuotaContext) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Typed notes, if any non-blank text was given.
    pub fn notes(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Previously produced transcript, if a non-blank one was given.
    pub fn prior_transcript(&self) -> Option<&str> {
        self.transcript.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.clips
            .iter()
            .filter_map(|c| c.descriptor.duration_ms)
            .fold(0u64, u64::saturating_add)
    }

    /// Read WAV headers, then run the provider-independent checks.
    pub fn prepare(mut self) -> ScribeResult<Self> {
        self.clips = self
            .clips
            .into_iter()
            .map(AudioClip::probe)
            .collect::<ScribeResult<Vec<_>>>()?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ScribeResult<()> {
        if self.clips.is_empty() && self.prior_transcript().is_none() {
            return Err(ScribeError::missing_field(
                "at least one audio clip or a prior transcript is required",
            ));
        }
        for (index, clip) in self.clips.iter().enumerate() {
            clip.validate().map_err(|e| match e {
                ScribeError::Validation { code, message } => ScribeError::Validation {
                    code,
                    message: format!("clip {}: {}", index, message),
                },
                other => other,
            })?;
        }

        if let Some(temperature) = self.overrides.temperature {
            if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
                return Err(ScribeError::invalid_input(format!(
                    "temperature {} is outside 0..=2",
                    temperature
                )));
            }
        }

        if let Some(schema) = &self.schema {
            schema.validate()?;
        }
        Ok(())
    }

    /// Checks that need the resolved provider. Clips are skipped when a
    /// prior transcript replaces them.
    pub fn validate_for(&self, provider: ProviderKind) -> ScribeResult<()> {
        if self.prior_transcript().is_none() {
            for clip in &self.clips {
                clip.validate_for(provider)?;
            }
        }
        self.chat_model_for(provider)?;
        Ok(())
    }

    /// Chat model named by the override, with any provider prefix removed.
    ///
    /// `openai/...` is accepted on Azure, which hosts the same models. A
    /// prefix that is not a provider name is part of the model name.
    pub fn chat_model_for(&self, provider: ProviderKind) -> ScribeResult<Option<String>> {
        let requested = match self.overrides.chat_model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => model,
            _ => return Ok(None),
        };

        let Some((prefix, model)) = requested.split_once('/') else {
            return Ok(Some(requested.to_string()));
        };
        let Ok(named) = prefix.parse::<ProviderKind>() else {
            return Ok(Some(requested.to_string()));
        };

        let compatible = named == provider
            || (named == ProviderKind::OpenAi && provider == ProviderKind::Azure);
        if !compatible {
            return Err(ScribeError::invalid_input(format!(
                "chat model \"{}\" belongs to the {} provider but {} is configured",
                requested, named, provider
            )));
        }
        if model.trim().is_empty() {
            return Err(ScribeError::invalid_input(format!(
                "chat model \"{}\" has no model name",
                requested
            )));
        }
        Ok(Some(model.trim().to_string()))
    }
}
