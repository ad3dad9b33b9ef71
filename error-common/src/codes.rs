// Error codes implementation
// Standardized error codes surfaced to the host application

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Provider,
    Mapping,
    Quota,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Provider => "provider",
            ErrorCategory::Mapping => "mapping",
            ErrorCategory::Quota => "quota",
        }
    }

    /// Whether the caller can fix the failure by changing its input or settings.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Configuration | ErrorCategory::Validation | ErrorCategory::Quota
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const INVALID_FORMAT: &str = "VALIDATION_1003";
    pub const PAYLOAD_TOO_LARGE: &str = "VALIDATION_1004";
}

pub mod configuration {
    pub const MISSING_SETTING: &str = "CONFIG_5001";
    pub const INVALID_SETTING: &str = "CONFIG_5002";
}

pub mod provider {
    pub const REQUEST_FAILED: &str = "PROVIDER_6001";
    pub const AUTHENTICATION_FAILED: &str = "PROVIDER_6002";
    pub const UPSTREAM_ERROR: &str = "PROVIDER_6003";
    pub const INVALID_RESPONSE: &str = "PROVIDER_6004";
}

pub mod mapping {
    pub const UNMAPPABLE_RESPONSE: &str = "MAPPING_7001";
}

pub mod quota {
    pub const QUOTA_DENIED: &str = "QUOTA_8001";
}
