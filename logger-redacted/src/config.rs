// Logger configuration
use serde::{Deserialize, Serialize};

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable `fmt` output
    Pretty,
    /// Bunyan-style JSON lines
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub log_level: String,
    pub format: LogFormat,
    pub service_name: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            service_name: "care-scribe".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Read `SCRIBE_LOG_FORMAT`, `SCRIBE_LOG_REDACTION` and `SCRIBE_LOG_LEVEL`.
    ///
    /// Unknown values fall back to the defaults; `RUST_LOG` still wins over
    /// the level at subscriber initialisation.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let format = match std::env::var("SCRIBE_LOG_FORMAT")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let redaction_enabled = std::env::var("SCRIBE_LOG_REDACTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.redaction_enabled);

        let log_level = std::env::var("SCRIBE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Self {
            redaction_enabled,
            log_level,
            format,
            service_name: defaults.service_name,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
