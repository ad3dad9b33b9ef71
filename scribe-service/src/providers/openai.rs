use std::time::Duration;

use async_trait::async_trait;
use error_common::ErrorContext;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    read_json, send_checked, ChatCompletion, Completion, CompletionContent, CompletionRequest,
    ScribeProvider, SpeechToText, TranscribeOptions, Transcript,
};
use crate::audio::AudioClip;
use crate::config::ProviderKind;
use crate::error::{ScribeError, ScribeResult};
use crate::schema::EXTRACTION_FUNCTION_NAME;
use crate::transcription::TokenUsage;

/// Where an OpenAI-style API lives and how it authenticates.
pub trait OpenAiTarget: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Full URL of `path` (e.g. `audio/translations`) for `model`.
    fn url(&self, model: &str, path: &str) -> String;

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}

/// api.openai.com, or anything speaking the same protocol
pub struct OpenAiPlatform {
    base_url: String,
    api_key: SecretString,
}

impl OpenAiPlatform {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
        }
    }
}

impl OpenAiTarget for OpenAiPlatform {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn url(&self, _model: &str, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(self.api_key.expose_secret())
    }
}

/// Client for the OpenAI audio translation and chat completion endpoints
pub struct OpenAiCompatible<T: OpenAiTarget> {
    http: reqwest::Client,
    target: T,
    timeout: Duration,
}

pub type OpenAiProvider = OpenAiCompatible<OpenAiPlatform>;

impl<T: OpenAiTarget> OpenAiCompatible<T> {
    pub fn new(http: reqwest::Client, target: T, timeout: Duration) -> Self {
        Self { http, target, timeout }
    }

    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new(self.target.kind().as_str(), operation)
    }
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    id: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cached_tokens: usage.prompt_tokens_details.map_or(0, |d| d.cached_tokens),
        }
    }
}

#[async_trait]
impl<T: OpenAiTarget> SpeechToText for OpenAiCompatible<T> {
    /// Uses the translations endpoint, so the transcript is always English.
    async fn transcribe(&self, clip: &AudioClip, options: &TranscribeOptions<'_>) -> ScribeResult<Transcript> {
        let context = self.context("transcribe").add_context("model", options.model);
        let encoding = clip.descriptor.encoding;

        let part = Part::bytes(clip.data.clone())
            .file_name(format!("file.{}", encoding.extension()))
            .mime_str(encoding.mime_type())
            .map_err(|e| ScribeError::request_failed(context.clone(), &e))?;
        let form = Form::new()
            .part("file", part)
            .text("model", options.model.to_string())
            .text("response_format", "json");

        debug!(
            provider = %self.target.kind(),
            bytes = clip.len(),
            encoding = %encoding,
            "submitting audio for translation"
        );

        let builder = self
            .target
            .authorize(self.http.post(self.target.url(options.model, "audio/translations")))
            .multipart(form);
        let response = send_checked(builder, self.timeout, &context).await?;
        let body: TranslationResponse = read_json(response, &context).await?;

        Ok(Transcript {
            text: body.text.trim().to_string(),
            usage: TokenUsage::default(),
            summarized: false,
            thinking: None,
        })
    }
}

#[async_trait]
impl<T: OpenAiTarget> ChatCompletion for OpenAiCompatible<T> {
    async fn complete(&self, request: &CompletionRequest<'_>) -> ScribeResult<Completion> {
        let context = self.context("chat_completion").add_context("model", request.model);

        let mut messages = vec![json!({ "role": "system", "content": request.system_prompt })];
        messages.extend(
            request
                .user_messages
                .iter()
                .map(|text| json!({ "role": "user", "content": text })),
        );

        let body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": EXTRACTION_FUNCTION_NAME,
                    "schema": request.batch.json_schema(true),
                    "strict": true,
                },
            },
        });

        let builder = self
            .target
            .authorize(self.http.post(self.target.url(request.model, "chat/completions")))
            .json(&body);
        let response = send_checked(builder, self.timeout, &context).await?;
        let parsed: ChatResponse = read_json(response, &context).await?;

        let usage = parsed.usage.map(TokenUsage::from).unwrap_or_default();
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ScribeError::invalid_response(context.clone(), "completion has no choices"))?;

        let content = match (choice.message.refusal, choice.message.content) {
            (Some(refusal), _) => CompletionContent::Unusable(format!("model refused: {}", refusal)),
            _ if choice.finish_reason.as_deref() == Some("length") => {
                CompletionContent::Unusable("completion was cut off at the token limit".into())
            }
            (None, Some(content)) => CompletionContent::Text(content),
            (None, None) => CompletionContent::Unusable("completion has no content".into()),
        };

        Ok(Completion {
            content,
            id: parsed.id,
            usage,
            retries: 0,
            thinking: None,
        })
    }
}

impl<T: OpenAiTarget> ScribeProvider for OpenAiCompatible<T> {
    fn kind(&self) -> ProviderKind {
        self.target.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_url_and_kind() {
        let target = OpenAiPlatform::new("https://api.openai.com/v1", SecretString::from("sk-x".to_string()));
        assert_eq!(
            target.url("whisper-1", "audio/translations"),
            "https://api.openai.com/v1/audio/translations"
        );
        assert_eq!(target.kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn test_usage_conversion() {
        let usage: ChatUsage = serde_json::from_value(json!({
            "prompt_tokens": 812,
            "completion_tokens": 64,
            "prompt_tokens_details": { "cached_tokens": 512 }
        }))
        .unwrap();
        let usage = TokenUsage::from(usage);
        assert_eq!(usage.cached_tokens, 512);
        assert_eq!(usage.total(), 876);
    }
}
