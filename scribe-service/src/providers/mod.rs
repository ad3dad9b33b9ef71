pub mod openai;
pub mod azure;
pub mod google;

use std::time::Duration;

use async_trait::async_trait;
use error_common::ErrorContext;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::audio::AudioClip;
use crate::config::{ProviderKind, ResolvedConfig, ResolvedProvider};
use crate::error::{ScribeError, ScribeResult};
use crate::schema::FieldBatch;
use crate::transcription::TokenUsage;

pub use azure::{AzureDeployment, AzureProvider};
pub use google::GoogleProvider;
pub use openai::{OpenAiCompatible, OpenAiPlatform, OpenAiProvider, OpenAiTarget};

#[derive(Debug, Clone, Copy)]
pub struct TranscribeOptions<'a> {
    pub model: &'a str,
    pub temperature: f32,
    /// Ask for a summary instead of a verbatim transcript, where supported
    pub summarize: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub text: String,
    pub usage: TokenUsage,
    pub summarized: bool,
    /// Thought summary, when the model was asked to include one
    pub thinking: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub system_prompt: &'a str,
    /// Typed notes and transcript, in that order
    pub user_messages: &'a [String],
    pub batch: &'a FieldBatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionContent {
    /// Message text expected to hold JSON
    Text(String),
    /// Already-parsed function call arguments
    Arguments(Value),
    /// Refusal, truncation or a finish that carries no answer
    Unusable(String),
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub content: CompletionContent,
    pub id: Option<String>,
    pub usage: TokenUsage,
    pub retries: u32,
    pub thinking: Option<String>,
}

/// Submit audio, get transcript text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip, options: &TranscribeOptions<'_>) -> ScribeResult<Transcript>;
}

/// Submit prompt and output schema, get a structured completion.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> ScribeResult<Completion>;
}

pub trait ScribeProvider: SpeechToText + ChatCompletion {
    fn kind(&self) -> ProviderKind;
}

/// Create a provider instance based on configuration
pub fn create_provider(config: &ResolvedConfig, http: reqwest::Client) -> Box<dyn ScribeProvider> {
    let timeout = config.request_timeout;
    match &config.provider {
        ResolvedProvider::OpenAi { api_key, base_url, .. } => Box::new(OpenAiProvider::new(
            http,
            OpenAiPlatform::new(base_url.clone(), api_key.clone()),
            timeout,
        )),
        ResolvedProvider::Azure { api_key, endpoint, api_version, .. } => Box::new(AzureProvider::new(
            http,
            AzureDeployment::new(endpoint.clone(), api_version.clone(), api_key.clone()),
            timeout,
        )),
        ResolvedProvider::Google { access_token, project_id, location, base_url, .. } => {
            Box::new(GoogleProvider::new(
                http,
                base_url.clone(),
                project_id.clone(),
                location.clone(),
                access_token.clone(),
                timeout,
            ))
        }
    }
}

/// Send with a timeout and turn transport failures and non-2xx answers
/// into provider errors.
pub(crate) async fn send_checked(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
    context: &ErrorContext,
) -> ScribeResult<reqwest::Response> {
    let response = builder
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ScribeError::request_failed(context.clone(), &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScribeError::upstream(context.clone().with_status(status.as_u16()), &body));
    }
    Ok(response)
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &ErrorContext,
) -> ScribeResult<T> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ScribeError::request_failed(context.clone().with_status(status), &e))?;

    serde_json::from_str(&body).map_err(|e| {
        ScribeError::invalid_response(
            context.clone().with_status(status),
            format!("unexpected response body: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_create_provider_matches_resolved_kind() {
        let env = std::collections::HashMap::new();
        let configs = [
            ProviderConfig::new().with_api_key("sk-test"),
            ProviderConfig::new()
                .with_provider(ProviderKind::Azure)
                .with_api_key("k")
                .with_azure("https://care.openai.azure.com", "2024-06-01"),
            ProviderConfig::new()
                .with_provider(ProviderKind::Google)
                .with_google("care-prod", "us-central1")
                .with_chat_model("gemini-2.5-flash"),
        ];

        for config in configs {
            let resolved = config.resolve(&env).unwrap();
            let provider = create_provider(&resolved, reqwest::Client::new());
            assert_eq!(provider.kind(), resolved.kind());
        }
    }
}
