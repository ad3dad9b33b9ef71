use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use error_common::ErrorContext;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    read_json, send_checked, ChatCompletion, Completion, CompletionContent, CompletionRequest,
    ScribeProvider, SpeechToText, TranscribeOptions, Transcript,
};
use crate::audio::AudioClip;
use crate::config::ProviderKind;
use crate::error::{ScribeError, ScribeResult};
use crate::prompt::transcription_instruction;
use crate::schema::EXTRACTION_FUNCTION_NAME;
use crate::transcription::TokenUsage;

const FINISH_STOP: &str = "STOP";
const FINISH_MALFORMED_FUNCTION_CALL: &str = "MALFORMED_FUNCTION_CALL";

/// Gemini on Vertex AI.
///
/// There is no audio model: the chat model receives the clip inline and is
/// asked for a transcript. Extraction is a forced function call.
pub struct GoogleProvider {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    location: String,
    access_token: Option<SecretString>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
    finish_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    cached_content_token_count: u64,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(usage: UsageMetadata) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            cached_tokens: usage.cached_content_token_count,
        }
    }
}

impl GenerateContentResponse {
    fn take_usage(&mut self) -> TokenUsage {
        self.usage_metadata.take().map(TokenUsage::from).unwrap_or_default()
    }

    fn first_candidate(self) -> Option<Candidate> {
        self.candidates.into_iter().next()
    }
}

impl Candidate {
    fn finish_description(&self) -> String {
        let reason = self.finish_reason.as_deref().unwrap_or("UNSPECIFIED");
        match &self.finish_message {
            Some(message) => format!("{}: {}", reason, message),
            None => reason.to_string(),
        }
    }

    /// Non-thought text parts, joined.
    fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Thought summaries, present when `includeThoughts` was set.
    fn thoughts(&self) -> Option<String> {
        let thoughts: Vec<&str> = self
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter(|p| p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!thoughts.is_empty()).then(|| thoughts.join("\n"))
    }

    fn function_args(self) -> Option<Value> {
        self.content?
            .parts
            .into_iter()
            .find_map(|p| p.function_call)
            .map(|call| call.args)
    }
}

/// Thinking settings for the 2.5 family: off for flash, a small visible
/// budget for pro (which cannot disable thinking).
fn thinking_config(model: &str) -> Option<Value> {
    if !model.contains("2.5") {
        return None;
    }
    if model.contains("pro") {
        Some(json!({ "thinkingBudget": 1024, "includeThoughts": true }))
    } else {
        Some(json!({ "thinkingBudget": 0 }))
    }
}

fn generation_config(model: &str, temperature: f32) -> Value {
    let mut config = json!({ "temperature": temperature });
    if let Some(thinking) = thinking_config(model) {
        config["thinkingConfig"] = thinking;
    }
    config
}

impl GoogleProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        location: impl Into<String>,
        access_token: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            project_id: project_id.into(),
            location: location.into(),
            access_token,
            timeout,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.base_url, self.project_id, self.location, model
        )
    }

    async fn generate(&self, model: &str, body: &Value, context: &ErrorContext) -> ScribeResult<GenerateContentResponse> {
        let mut builder = self.http.post(self.endpoint(model)).json(body);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        let response = send_checked(builder, self.timeout, context).await?;
        read_json(response, context).await
    }
}

#[async_trait]
impl SpeechToText for GoogleProvider {
    async fn transcribe(&self, clip: &AudioClip, options: &TranscribeOptions<'_>) -> ScribeResult<Transcript> {
        let context = ErrorContext::new(ProviderKind::Google.as_str(), "transcribe")
            .add_context("model", options.model);
        let encoding = clip.descriptor.encoding;

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": transcription_instruction(options.summarize) },
                    { "inlineData": { "mimeType": encoding.mime_type(), "data": STANDARD.encode(&clip.data) } },
                ],
            }],
            "generationConfig": generation_config(options.model, options.temperature),
        });

        debug!(bytes = clip.len(), encoding = %encoding, summarize = options.summarize, "submitting audio to gemini");

        let mut response = self.generate(options.model, &body, &context).await?;
        let usage = response.take_usage();
        let candidate = response
            .first_candidate()
            .ok_or_else(|| ScribeError::invalid_response(context.clone(), "response has no candidates"))?;

        if candidate.finish_reason.as_deref() != Some(FINISH_STOP) {
            return Err(ScribeError::invalid_response(
                context,
                format!("transcription did not finish: {}", candidate.finish_description()),
            ));
        }

        Ok(Transcript {
            text: candidate.text().trim().to_string(),
            usage,
            summarized: options.summarize,
            thinking: candidate.thoughts(),
        })
    }
}

#[async_trait]
impl ChatCompletion for GoogleProvider {
    async fn complete(&self, request: &CompletionRequest<'_>) -> ScribeResult<Completion> {
        let context = ErrorContext::new(ProviderKind::Google.as_str(), "generate_content")
            .add_context("model", request.model);

        let contents: Vec<Value> = request
            .user_messages
            .iter()
            .map(|text| json!({ "role": "user", "parts": [{ "text": text }] }))
            .collect();

        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": contents,
            "tools": [{
                "functionDeclarations": [{
                    "name": EXTRACTION_FUNCTION_NAME,
                    "description": "Return the form field values extracted from the encounter.",
                    "parametersJsonSchema": request.batch.json_schema(false),
                }],
            }],
            "toolConfig": {
                "functionCallingConfig": {
                    "mode": "ANY",
                    "allowedFunctionNames": [EXTRACTION_FUNCTION_NAME],
                },
            },
            "generationConfig": generation_config(request.model, request.temperature),
        });

        let mut usage = TokenUsage::default();
        let mut retries = 0;
        loop {
            let mut response = self.generate(request.model, &body, &context).await?;
            usage.add(response.take_usage());
            let id = response.response_id.take();
            let candidate = response
                .first_candidate()
                .ok_or_else(|| ScribeError::invalid_response(context.clone(), "response has no candidates"))?;

            let finish = candidate.finish_reason.as_deref().unwrap_or_default();
            if finish == FINISH_MALFORMED_FUNCTION_CALL && retries == 0 {
                warn!(model = request.model, "gemini returned a malformed function call, retrying once");
                retries += 1;
                continue;
            }

            let thinking = candidate.thoughts();
            let content = if finish != FINISH_STOP {
                CompletionContent::Unusable(format!(
                    "completion did not finish successfully: {}",
                    candidate.finish_description()
                ))
            } else {
                match candidate.function_args() {
                    Some(args) => CompletionContent::Arguments(args),
                    None => CompletionContent::Unusable("completion has no function call".into()),
                }
            };

            return Ok(Completion {
                content,
                id,
                usage,
                retries,
                thinking,
            });
        }
    }
}

impl ScribeProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thinking_config_by_model() {
        assert_eq!(thinking_config("gemini-2.0-flash"), None);
        assert_eq!(thinking_config("gemini-2.5-flash"), Some(json!({ "thinkingBudget": 0 })));
        assert_eq!(
            thinking_config("gemini-2.5-pro"),
            Some(json!({ "thinkingBudget": 1024, "includeThoughts": true }))
        );
    }

    #[test]
    fn test_candidate_text_skips_thoughts() {
        let candidate: Candidate = serde_json::from_value(json!({
            "content": { "parts": [
                { "text": "considering the vitals", "thought": true },
                { "text": "Patient reports " },
                { "text": "mild fever." }
            ]},
            "finishReason": "STOP"
        }))
        .unwrap();
        assert_eq!(candidate.text(), "Patient reports mild fever.");
        assert_eq!(candidate.thoughts().as_deref(), Some("considering the vitals"));
    }

    #[test]
    fn test_function_args_extracted() {
        let candidate: Candidate = serde_json::from_value(json!({
            "content": { "parts": [
                { "functionCall": { "name": "process_ai_form_fill", "args": { "q0": { "value": 38, "note": null } } } }
            ]},
            "finishReason": "STOP"
        }))
        .unwrap();
        assert_eq!(candidate.function_args(), Some(json!({ "q0": { "value": 38, "note": null } })));
    }

    #[test]
    fn test_endpoint_layout() {
        let provider = GoogleProvider::new(
            reqwest::Client::new(),
            "https://europe-west4-aiplatform.googleapis.com",
            "care-prod",
            "europe-west4",
            None,
            Duration::from_secs(5),
        );
        assert_eq!(
            provider.endpoint("gemini-2.5-flash"),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/care-prod/locations/europe-west4/publishers/google/models/gemini-2.5-flash:generateContent"
        );
    }
}
