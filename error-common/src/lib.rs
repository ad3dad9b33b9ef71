//! Common error handling utilities for Care Scribe
//!
//! Provides the pieces every scribe crate shares when it reports a failure:
//!
//! - **Error Codes**: stable, machine-readable codes the host application can
//!   branch on without parsing messages
//! - **Error Categories**: the coarse class of a failure (configuration,
//!   validation, upstream provider, mapping, quota)
//! - **Context Preservation**: which provider and operation failed, and with
//!   which HTTP status, without carrying request payloads
//! - **Sanitisation**: upstream error bodies are trimmed before they end up in
//!   an error message
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, CodedError, ErrorCategory, ErrorContext};
//!
//! #[derive(Debug)]
//! struct MissingKey;
//!
//! impl std::fmt::Display for MissingKey {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "api key missing")
//!     }
//! }
//!
//! impl std::error::Error for MissingKey {}
//!
//! impl CodedError for MissingKey {
//!     fn code(&self) -> &'static str {
//!         codes::configuration::MISSING_SETTING
//!     }
//!
//!     fn category(&self) -> ErrorCategory {
//!         ErrorCategory::Configuration
//!     }
//! }
//!
//! let context = ErrorContext::new("openai", "transcribe").with_status(401);
//! assert_eq!(MissingKey.code(), "CONFIG_5001");
//! assert_eq!(context.status, Some(401));
//! ```

pub mod codes;
pub mod context;
pub mod sanitization;

pub use codes::*;
pub use context::*;
pub use sanitization::*;

/// An error that exposes a stable code and category.
pub trait CodedError: std::error::Error {
    /// Stable code such as `VALIDATION_1001`.
    fn code(&self) -> &'static str;

    fn category(&self) -> ErrorCategory;

    /// Emit the error as a structured `tracing` event.
    fn log(&self, context: &str) {
        tracing::error!(
            context = context,
            error_code = self.code(),
            error_category = %self.category(),
            error = %self,
            "scribe error occurred"
        );
    }
}
