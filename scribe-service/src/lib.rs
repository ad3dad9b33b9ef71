//! Care Scribe transcription orchestrator
//!
//! Takes recorded audio from the host application, has a third-party
//! provider transcribe it and, when a form schema is attached, asks a
//! chat-completion model to fill the form's fields from the transcript.
//!
//! # Providers
//!
//! - **OpenAI**: Whisper translations + chat completions with strict JSON schema output
//! - **Azure OpenAI**: the same protocol against a deployment, `api-key` auth
//! - **Google Vertex AI**: Gemini hears the audio inline and fills the form
//!   through a forced function call
//!
//! Settings come from the host's [`ProviderConfig`] first, then from
//! `SCRIBE_*` environment variables, then from built-in defaults.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use scribe_service::{AudioClip, AudioEncoding, FormField, FormSchema, ProviderConfig, ScribeService, TranscriptionRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let audio = std::fs::read("encounter.webm")?;
//! let schema = FormSchema::from_fields(
//!     "Vitals",
//!     vec![FormField::new("spo2", "integer").with_name("SpO2")],
//! );
//!
//! let request = TranscriptionRequest::single(AudioClip::new(audio, AudioEncoding::Webm))
//!     .with_schema(schema);
//!
//! let result = ScribeService::new()
//!     .transcribe(request, &ProviderConfig::from_env()?)
//!     .await?;
//!
//! println!("{}", result.raw_text);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod prompt;
pub mod providers;
pub mod quota;
pub mod request;
pub mod schema;
pub mod service;
pub mod transcription;

pub use audio::*;
pub use config::*;
pub use error::*;
pub use quota::*;
pub use request::*;
pub use schema::*;
pub use service::*;
pub use transcription::*;
