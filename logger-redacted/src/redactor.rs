use regex::Regex;
use lazy_static::lazy_static;
use sha2::{Sha256, Digest};
use base64::{Engine as _, engine::general_purpose};

lazy_static! {
    static ref API_KEY_REGEX: Regex = Regex::new(r"\bsk-[A-Za-z0-9_-]{12,}").expect("api key pattern");
    static ref BEARER_REGEX: Regex = Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/-]+=*").expect("bearer pattern");
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern");
    static ref CREDIT_CARD_REGEX: Regex = Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b").expect("card pattern");
    static ref SSN_REGEX: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern");
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b").expect("phone pattern");
    static ref IP_REGEX: Regex = Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("ip pattern");
    static ref MRN_REGEX: Regex = Regex::new(r"(?i)\bMRN[-:\s]?\d+\b").expect("mrn pattern");

    static ref DEFAULT_REDACTOR: PiiRedactor = PiiRedactor::new(RedactionConfig::default());
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_secrets: bool,
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_ssn: bool,
    pub redact_credit_cards: bool,
    pub redact_ip_addresses: bool,
    pub redact_mrn: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_secrets: true,
            redact_emails: true,
            redact_phones: true,
            redact_ssn: true,
            redact_credit_cards: true,
            redact_ip_addresses: true,
            redact_mrn: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    /// Add an organisation-specific pattern, applied after the built-in ones.
    pub fn with_custom_pattern(mut self, pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        self.custom_patterns.push((Regex::new(pattern)?, replacement.to_string()));
        Ok(self)
    }
}

/// PII redactor for log messages and upstream error bodies
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Secrets never get a correlation hash.
        if self.config.redact_secrets {
            result = API_KEY_REGEX.replace_all(&result, "sk-[REDACTED]").to_string();
            result = BEARER_REGEX.replace_all(&result, "Bearer [REDACTED]").to_string();
        }

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        if self.config.redact_credit_cards {
            result = self.redact_with(&CREDIT_CARD_REGEX, &result, "CC", "****-****-****-****");
        }

        if self.config.redact_ssn {
            result = self.redact_with(&SSN_REGEX, &result, "SSN", "***-**-****");
        }

        if self.config.redact_phones {
            result = self.redact_with(&PHONE_REGEX, &result, "PHONE", "(***) ***-****");
        }

        if self.config.redact_ip_addresses {
            result = self.redact_ip_addresses(&result);
        }

        if self.config.redact_mrn {
            result = self.redact_with(&MRN_REGEX, &result, "MRN", "MRN[REDACTED]");
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Redact, then keep at most `max_chars` characters.
    pub fn preview(&self, text: &str, max_chars: usize) -> String {
        let redacted = self.redact(text);
        if redacted.chars().count() <= max_chars {
            return redacted;
        }
        let mut truncated: String = redacted.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }

    fn redact_with(&self, regex: &Regex, text: &str, label: &str, mask: &str) -> String {
        regex.replace_all(text, |caps: &regex::Captures| {
            if self.config.hash_for_correlation {
                format!("{}[{}]", label, self.hash_value(&caps[0]))
            } else {
                mask.to_string()
            }
        }).to_string()
    }

    fn redact_emails(&self, text: &str) -> String {
        EMAIL_REGEX.replace_all(text, |caps: &regex::Captures| {
            let email = &caps[0];
            if self.config.hash_for_correlation {
                format!("EMAIL[{}]", self.hash_value(email))
            } else {
                match email.split_once('@') {
                    Some((local, domain)) => format!(
                        "{}***@{}***",
                        local.chars().next().unwrap_or('*'),
                        domain.chars().next().unwrap_or('*')
                    ),
                    None => "***@***.com".to_string(),
                }
            }
        }).to_string()
    }

    fn redact_ip_addresses(&self, text: &str) -> String {
        IP_REGEX.replace_all(text, |caps: &regex::Captures| {
            let ip = &caps[0];
            if self.config.hash_for_correlation {
                format!("IP[{}]", self.hash_value(ip))
            } else {
                let parts: Vec<&str> = ip.split('.').collect();
                match (parts.first(), parts.last()) {
                    (Some(first), Some(last)) if parts.len() == 4 => format!("{}.***.***.{}", first, last),
                    _ => "***.***.***.***".to_string(),
                }
            }
        }).to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(&result[..8]) // Use first 8 bytes for shorter hash
    }
}

/// Redact with the default configuration.
pub fn redact_default(text: &str) -> String {
    DEFAULT_REDACTOR.redact(text)
}

/// Redacted, truncated preview with the default configuration.
pub fn preview_default(text: &str, max_chars: usize) -> String {
    DEFAULT_REDACTOR.preview(text, max_chars)
}
