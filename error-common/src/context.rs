use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where an upstream failure happened.
///
/// Never put request payloads (audio, transcripts, prompts) in here; the
/// context ends up in error messages and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub provider: String,
    pub operation: String,
    pub status: Option<u16>,
    pub additional: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            status: None,
            additional: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn add_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional.insert(key.into(), value.into());
        self
    }

    /// 401 and 403 responses.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, Some(401) | Some(403))
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.provider, self.operation)?;
        if let Some(status) = self.status {
            write!(f, " (status {})", status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status() {
        let ctx = ErrorContext::new("azure", "chat_completion").with_status(429);
        assert_eq!(ctx.to_string(), "azure chat_completion (status 429)");
    }

    #[test]
    fn test_auth_failure_detection() {
        assert!(ErrorContext::new("openai", "transcribe").with_status(401).is_auth_failure());
        assert!(!ErrorContext::new("openai", "transcribe").with_status(500).is_auth_failure());
        assert!(!ErrorContext::new("openai", "transcribe").is_auth_failure());
    }
}
