use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::ProviderKind;

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
}

impl TokenUsage {
    /// What the host charges against the quota.
    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cached_tokens = self.cached_tokens.saturating_add(other.cached_tokens);
    }
}

/// Transcription metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionMetadata {
    pub id: Uuid,
    pub provider: ProviderKind,
    pub chat_model: String,
    /// Absent for Google, where the chat model hears the audio.
    pub audio_model: Option<String>,
    pub transcription_ms: u64,
    pub completion_ms: Option<u64>,
    pub completion_ids: Vec<String>,
    pub usage: TokenUsage,
    pub transcript_summarized: bool,
    pub extraction_calls: u32,
    pub retries: u32,
    /// Model thought summaries (Gemini 2.5 pro)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TranscriptionMetadata {
    pub fn new(provider: ProviderKind, chat_model: impl Into<String>, audio_model: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            chat_model: chat_model.into(),
            audio_model,
            transcription_ms: 0,
            completion_ms: None,
            completion_ids: Vec::new(),
            usage: TokenUsage::default(),
            transcript_summarized: false,
            extraction_calls: 0,
            retries: 0,
            thinking: None,
            created_at: Utc::now(),
        }
    }

    pub fn record_thinking(&mut self, thinking: Option<String>) {
        let Some(thinking) = thinking else {
            return;
        };
        match &mut self.thinking {
            Some(existing) => {
                existing.push_str("\n\n");
                existing.push_str(&thinking);
            }
            None => self.thinking = Some(thinking),
        }
    }
}

/// Transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub raw_text: String,
    /// Field id to extracted value; `None` when no schema was supplied.
    pub fields: Option<BTreeMap<String, Value>>,
    pub metadata: TranscriptionMetadata,
}

impl TranscriptionResult {
    pub fn new(raw_text: impl Into<String>, metadata: TranscriptionMetadata) -> Self {
        Self {
            raw_text: raw_text.into(),
            fields: None,
            metadata,
        }
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn field(&self, id: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(id))
    }
}
