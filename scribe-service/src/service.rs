use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use logger_redacted::{redacted_preview, redacted_warn};
use serde_json::Value;
use tracing::{debug, info, instrument, Span};

use crate::config::{EnvLookup, ProcessEnv, ProviderConfig, ProviderKind};
use crate::error::{ScribeError, ScribeResult};
use crate::prompt::{system_prompt, SUMMARIZE_AFTER_MS};
use crate::providers::{
    create_provider, CompletionContent, CompletionRequest, ScribeProvider, TranscribeOptions,
};
use crate::request::TranscriptionRequest;
use crate::schema::{FieldBatch, FormSchema};
use crate::transcription::{TranscriptionMetadata, TranscriptionResult};

/// Transcription orchestrator.
///
/// Holds no per-request state; one instance can serve concurrent requests.
#[derive(Clone)]
pub struct ScribeService {
    env: Arc<dyn EnvLookup>,
    http: reqwest::Client,
}

impl Default for ScribeService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScribeService {
    /// Service reading fallback settings from the process environment
    pub fn new() -> Self {
        Self {
            env: Arc::new(ProcessEnv),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_env(env: impl EnvLookup + 'static) -> Self {
        Self {
            env: Arc::new(env),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Transcribe the request's audio and, when a schema is attached, map the
    /// transcript onto its fields.
    ///
    /// Nothing is sent upstream until the request, the configuration and
    /// the quota have all been checked.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed request
    /// - `Configuration` when the provider lacks a required setting
    /// - `Quota` when the user or facility may not use the scribe
    /// - `Provider` when an upstream call fails
    /// - `Mapping` when the completion cannot be mapped; it carries the
    ///   transcript as a partial result
    #[instrument(
        name = "scribe.transcribe",
        skip_all,
        fields(provider = tracing::field::Empty, clips = request.clips.len())
    )]
    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
        config: &ProviderConfig,
    ) -> ScribeResult<TranscriptionResult> {
        let request = request.prepare()?;
        let resolved = config.resolve(self.env.as_ref())?;
        let kind = resolved.kind();
        Span::current().record("provider", kind.as_str());

        request.validate_for(kind)?;
        let chat_model = request
            .chat_model_for(kind)?
            .unwrap_or_else(|| resolved.provider.chat_model().to_string());
        let audio_model = resolved.provider.audio_model().map(|default| {
            request
                .overrides
                .audio_model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(default)
                .to_string()
        });

        if let Some(quota) = &request.quota {
            quota.check()?;
        }

        let plan = request
            .schema
            .as_ref()
            .map(|schema| schema.extraction_plan(resolved.max_fields_per_request));

        info!(
            chat_model = %chat_model,
            audio_model = audio_model.as_deref().unwrap_or("-"),
            fields = request.schema.as_ref().map_or(0, FormSchema::field_count),
            batches = plan.as_ref().map_or(0, Vec::len),
            "starting transcription"
        );

        let provider = create_provider(&resolved, self.http.clone());
        let temperature = request.overrides.temperature.unwrap_or(0.0);
        let mut metadata = TranscriptionMetadata::new(kind, chat_model.clone(), audio_model.clone());

        let started = Instant::now();
        let summarize = kind == ProviderKind::Google && request.total_duration_ms() > SUMMARIZE_AFTER_MS;
        let options = TranscribeOptions {
            model: audio_model.as_deref().unwrap_or(&chat_model),
            temperature,
            summarize,
        };

        let raw_text = match request.prior_transcript() {
            Some(prior) => {
                info!(transcript_chars = prior.chars().count(), "reusing prior transcript");
                prior.to_string()
            }
            None => {
                let mut parts = Vec::with_capacity(request.clips.len());
                for clip in &request.clips {
                    let transcript = provider.transcribe(clip, &options).await?;
                    metadata.usage.add(transcript.usage);
                    metadata.transcript_summarized |= transcript.summarized;
                    metadata.record_thinking(transcript.thinking);
                    if !transcript.text.is_empty() {
                        parts.push(transcript.text);
                    }
                }
                parts.join(" ")
            }
        };
        metadata.transcription_ms = elapsed_ms(started);

        debug!(
            transcript_chars = raw_text.chars().count(),
            preview = %redacted_preview!(&raw_text),
            "transcript ready"
        );

        let Some(plan) = plan else {
            return Ok(TranscriptionResult::new(raw_text, metadata));
        };

        let mut user_messages = Vec::new();
        if let Some(notes) = request.notes() {
            user_messages.push(notes.to_string());
        }
        if !raw_text.is_empty() {
            user_messages.push(raw_text.clone());
        }
        if user_messages.is_empty() {
            info!("nothing to extract from, skipping completion");
            return Ok(TranscriptionResult::new(raw_text, metadata).with_fields(BTreeMap::new()));
        }

        let prompt = system_prompt(request.prompt.as_deref());
        let completion_started = Instant::now();
        let extraction = extract(
            provider.as_ref(),
            &plan,
            &chat_model,
            temperature,
            &prompt,
            &user_messages,
            &mut metadata,
        )
        .await;
        metadata.completion_ms = Some(elapsed_ms(completion_started));

        match extraction {
            Ok(fields) => {
                info!(
                    mapped_fields = fields.len(),
                    tokens = metadata.usage.total(),
                    "transcription completed"
                );
                Ok(TranscriptionResult::new(raw_text, metadata).with_fields(fields))
            }
            Err(Extraction::Failed(error)) => Err(error),
            Err(Extraction::Unmappable { reason, merged }) => {
                redacted_warn!(
                    mapped_fields = merged.len(),
                    "completion could not be mapped: {}",
                    reason
                );
                let mut partial = TranscriptionResult::new(raw_text, metadata);
                if !merged.is_empty() {
                    partial = partial.with_fields(merged);
                }
                Err(ScribeError::Mapping {
                    reason,
                    partial: Box::new(partial),
                })
            }
        }
    }
}

enum Extraction {
    Failed(ScribeError),
    Unmappable {
        reason: String,
        merged: BTreeMap<String, Value>,
    },
}

/// One completion per batch, merged in order.
async fn extract(
    provider: &dyn ScribeProvider,
    plan: &[FieldBatch],
    model: &str,
    temperature: f32,
    prompt: &str,
    user_messages: &[String],
    metadata: &mut TranscriptionMetadata,
) -> Result<BTreeMap<String, Value>, Extraction> {
    let mut merged = BTreeMap::new();
    for (index, batch) in plan.iter().enumerate() {
        let completion = provider
            .complete(&CompletionRequest {
                model,
                temperature,
                system_prompt: prompt,
                user_messages,
                batch,
            })
            .await
            .map_err(Extraction::Failed)?;

        metadata.extraction_calls += 1;
        metadata.retries += completion.retries;
        metadata.usage.add(completion.usage);
        metadata.record_thinking(completion.thinking);
        if let Some(id) = completion.id {
            metadata.completion_ids.push(id);
        }

        let parsed = match completion.content {
            CompletionContent::Arguments(value) => Ok(value),
            CompletionContent::Text(text) => serde_json::from_str::<Value>(&text)
                .map_err(|e| format!("completion is not valid JSON: {}", e)),
            CompletionContent::Unusable(reason) => Err(reason),
        };
        let mapped = parsed.and_then(|value| batch.map_values(&value));

        match mapped {
            Ok(fields) => {
                debug!(batch = index, fields = fields.len(), "batch mapped");
                merged.extend(fields);
            }
            Err(reason) => {
                let reason = if plan.len() > 1 {
                    format!("batch {} of {}: {}", index + 1, plan.len(), reason)
                } else {
                    reason
                };
                return Err(Extraction::Unmappable { reason, merged });
            }
        }
    }
    Ok(merged)
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Convenience wrapper: one-shot service reading the process environment.
///
/// # Errors
///
/// See [`ScribeService::transcribe`].
pub async fn transcribe(
    request: TranscriptionRequest,
    config: &ProviderConfig,
) -> ScribeResult<TranscriptionResult> {
    ScribeService::new().transcribe(request, config).await
}
