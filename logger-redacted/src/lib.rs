//! HIPAA-conscious logging for the scribe
//!
//! Dictated encounters are protected health information. Everything that
//! reaches a log sink goes through [`PiiRedactor`] first, so a stray
//! `debug!` with a transcript preview or an upstream error body that echoes
//! an API key does not end up in plain text on disk.
//!
//! # Detected Data Types
//!
//! - **API keys / bearer tokens**: `sk-...` → `sk-[REDACTED]`
//! - **Email Addresses**: user@example.com → EMAIL[hash]
//! - **Phone Numbers**: (555) 123-4567 → PHONE[hash]
//! - **SSN**: 123-45-6789 → SSN[hash]
//! - **Credit Cards**: 4111-1111-1111-1111 → CC[hash]
//! - **IP Addresses**: 192.168.1.1 → IP[hash]
//! - **Medical Record Numbers**: MRN123456 → MRN[hash]
//!
//! Hashes are stable, so the same redacted value can be correlated across
//! log lines without revealing it.
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{init, LoggerConfig};
//!
//! fn main() -> Result<(), logger_redacted::LoggerError> {
//!     init(&LoggerConfig::from_env())?;
//!     tracing::info!("scribe ready");
//!     Ok(())
//! }
//! ```

pub mod redactor;
pub mod macros;
pub mod config;

pub use redactor::*;
pub use config::*;

use std::io::{self, Write};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global `tracing` subscriber.
///
/// Logs go to stderr. `RUST_LOG` overrides `config.log_level` when set.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init(config: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let writer = RedactingMakeWriter::new(config.redaction_enabled);

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new(config.service_name.clone(), writer))
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(writer),
                )
                .try_init()?;
        }
    }
    Ok(())
}

/// `MakeWriter` that runs every formatted event through the default redactor.
#[derive(Debug, Clone, Copy)]
pub struct RedactingMakeWriter {
    enabled: bool,
}

impl RedactingMakeWriter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl<'a> MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(io::stderr(), self.enabled)
    }
}

/// Writer that redacts each buffer before forwarding it.
///
/// The formatters hand over one complete event per `write` call.
pub struct RedactingWriter<W: Write> {
    inner: W,
    enabled: bool,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W, enabled: bool) -> Self {
        Self { inner, enabled }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.enabled {
            return self.inner.write(buf);
        }
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(redact_default(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_redacts_event_text() {
        let mut writer = RedactingWriter::new(Vec::new(), true);
        let line = b"upstream said: invalid key sk-abcdefghijklmnopqrst\n";
        let written = writer.write(line).unwrap();
        assert_eq!(written, line.len());

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert!(out.contains("sk-[REDACTED]"));
        assert!(!out.contains("abcdefghijklmnopqrst"));
    }

    #[test]
    fn test_writer_passthrough_when_disabled() {
        let mut writer = RedactingWriter::new(Vec::new(), false);
        writer.write_all(b"call (555) 123-4567").unwrap();
        assert_eq!(writer.into_inner(), b"call (555) 123-4567".to_vec());
    }
}
