// Logging macros

/// Redacted, truncated preview of free text for `debug!` fields.
///
/// ```rust
/// let transcript = "Patient MRN123456 reports chest pain";
/// let preview = logger_redacted::redacted_preview!(transcript);
/// assert!(!preview.contains("123456"));
/// ```
#[macro_export]
macro_rules! redacted_preview {
    ($text:expr) => {
        $crate::preview_default($text, 80)
    };
    ($text:expr, $max:expr) => {
        $crate::preview_default($text, $max)
    };
}

/// `tracing::warn!` whose message is redacted before formatting.
#[macro_export]
macro_rules! redacted_warn {
    ($($field:ident = $value:expr,)* $fmt:literal $(, $arg:expr)* $(,)?) => {
        tracing::warn!($($field = $value,)* "{}", $crate::redact_default(&format!($fmt $(, $arg)*)))
    };
}
