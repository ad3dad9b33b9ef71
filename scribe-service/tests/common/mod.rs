#![allow(dead_code)]

use std::collections::HashMap;

use scribe_service::{
    AudioClip, AudioEncoding, FormField, FormSchema, ScribeService, TranscriptionRequest,
};
use serde_json::{json, Value};

pub const TRANSCRIPT: &str = "Patient is a 54 year old male. SpO2 is 94 percent. Complains of chest pain since this morning.";

pub fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn service(pairs: &[(&str, &str)]) -> ScribeService {
    ScribeService::with_env(env(pairs))
}

pub fn clip() -> AudioClip {
    AudioClip::new(b"ID3\x04\x00fake-mp3-frames".to_vec(), AudioEncoding::Mp3)
}

pub fn vitals_schema() -> FormSchema {
    FormSchema::from_fields(
        "Vitals",
        vec![
            FormField::new("spo2", "integer").with_name("SpO2"),
            FormField::new("complaint", "string").with_name("Chief complaint"),
            FormField::new("triage", "choice").with_options(["Urgent", "Routine"]),
        ],
    )
}

pub fn vitals_request() -> TranscriptionRequest {
    TranscriptionRequest::single(clip()).with_schema(vitals_schema())
}

pub fn translation_body(text: &str) -> String {
    json!({ "text": text }).to_string()
}

/// OpenAI chat completion whose message content is `content` serialised.
pub fn chat_body(content: &Value) -> String {
    chat_body_raw(&content.to_string())
}

pub fn chat_body_raw(content: &str) -> String {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content, "refusal": null },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 420,
            "completion_tokens": 38,
            "prompt_tokens_details": { "cached_tokens": 0 }
        }
    })
    .to_string()
}

pub fn gemini_text_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 300, "candidatesTokenCount": 25 },
        "responseId": "resp-transcribe"
    })
    .to_string()
}

pub fn gemini_call_body(args: &Value) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{
                "functionCall": { "name": "process_ai_form_fill", "args": args }
            }]},
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 500, "candidatesTokenCount": 40, "cachedContentTokenCount": 0 },
        "responseId": "resp-extract"
    })
    .to_string()
}

pub fn gemini_finish_body(reason: &str) -> String {
    json!({
        "candidates": [{ "finishReason": reason, "finishMessage": "model output could not be parsed" }],
        "usageMetadata": { "promptTokenCount": 500, "candidatesTokenCount": 0 },
        "responseId": "resp-failed"
    })
    .to_string()
}
