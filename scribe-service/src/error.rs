use error_common::{codes, CodedError, DataSanitizer, ErrorCategory, ErrorContext};
use thiserror::Error;

use crate::transcription::TranscriptionResult;

#[derive(Error, Debug)]
pub enum ScribeError {
    /// A setting required by the selected provider is missing or invalid.
    #[error("Configuration error: {message}")]
    Configuration { code: &'static str, message: String },

    /// The request itself is malformed.
    #[error("Validation error: {message}")]
    Validation { code: &'static str, message: String },

    /// The upstream call failed (transport, auth, non-2xx, unreadable body).
    #[error("Provider error ({context}): {message}")]
    Provider {
        code: &'static str,
        context: ErrorContext,
        message: String,
    },

    /// The completion could not be mapped onto the form schema.
    ///
    /// The transcript was produced and is carried in `partial`.
    #[error("Mapping error: {reason}")]
    Mapping {
        reason: String,
        partial: Box<TranscriptionResult>,
    },

    /// The user or facility may not use the scribe right now.
    #[error("Quota error: {0}")]
    Quota(String),
}

pub type ScribeResult<T> = Result<T, ScribeError>;

impl ScribeError {
    pub fn missing_setting(key: &str, provider: impl std::fmt::Display) -> Self {
        ScribeError::Configuration {
            code: codes::configuration::MISSING_SETTING,
            message: format!(
                "the \"{}\" setting is required when using the {} provider; set it in the plugin config or the environment",
                key, provider
            ),
        }
    }

    pub fn invalid_setting(key: &str, message: impl std::fmt::Display) -> Self {
        ScribeError::Configuration {
            code: codes::configuration::INVALID_SETTING,
            message: format!("invalid value for \"{}\": {}", key, message),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ScribeError::Validation {
            code: codes::validation::INVALID_INPUT,
            message: message.into(),
        }
    }

    pub fn missing_field(message: impl Into<String>) -> Self {
        ScribeError::Validation {
            code: codes::validation::MISSING_REQUIRED_FIELD,
            message: message.into(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        ScribeError::Validation {
            code: codes::validation::INVALID_FORMAT,
            message: message.into(),
        }
    }

    pub fn too_large(message: impl Into<String>) -> Self {
        ScribeError::Validation {
            code: codes::validation::PAYLOAD_TOO_LARGE,
            message: message.into(),
        }
    }

    /// Transport-level failure: connect error, timeout, broken body.
    pub fn request_failed(context: ErrorContext, error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else {
            logger_redacted::redact_default(&error.to_string())
        };
        ScribeError::Provider {
            code: codes::provider::REQUEST_FAILED,
            context,
            message,
        }
    }

    /// Non-2xx answer. The body is sanitised and redacted before it is kept.
    pub fn upstream(context: ErrorContext, body: &str) -> Self {
        let code = if context.is_auth_failure() {
            codes::provider::AUTHENTICATION_FAILED
        } else {
            codes::provider::UPSTREAM_ERROR
        };
        let body = DataSanitizer::default().sanitize_upstream_body(body);
        ScribeError::Provider {
            code,
            context,
            message: logger_redacted::redact_default(&body),
        }
    }

    pub fn invalid_response(context: ErrorContext, message: impl Into<String>) -> Self {
        ScribeError::Provider {
            code: codes::provider::INVALID_RESPONSE,
            context,
            message: message.into(),
        }
    }

    /// Transcript recovered from a mapping failure.
    pub fn partial_result(&self) -> Option<&TranscriptionResult> {
        match self {
            ScribeError::Mapping { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub fn into_partial_result(self) -> Option<TranscriptionResult> {
        match self {
            ScribeError::Mapping { partial, .. } => Some(*partial),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ScribeError::Configuration { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ScribeError::Validation { .. })
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, ScribeError::Provider { .. })
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, ScribeError::Mapping { .. })
    }
}

impl CodedError for ScribeError {
    fn code(&self) -> &'static str {
        match self {
            ScribeError::Configuration { code, .. }
            | ScribeError::Validation { code, .. }
            | ScribeError::Provider { code, .. } => code,
            ScribeError::Mapping { .. } => codes::mapping::UNMAPPABLE_RESPONSE,
            ScribeError::Quota(_) => codes::quota::QUOTA_DENIED,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            ScribeError::Configuration { .. } => ErrorCategory::Configuration,
            ScribeError::Validation { .. } => ErrorCategory::Validation,
            ScribeError::Provider { .. } => ErrorCategory::Provider,
            ScribeError::Mapping { .. } => ErrorCategory::Mapping,
            ScribeError::Quota(_) => ErrorCategory::Quota,
        }
    }
}
