// Sanitization utilities
// Upstream bodies can be large HTML pages or echo request content

/// Longest upstream body kept in an error message.
pub const MAX_UPSTREAM_BODY_CHARS: usize = 512;

pub struct DataSanitizer {
    max_chars: usize,
}

impl Default for DataSanitizer {
    fn default() -> Self {
        Self::new(MAX_UPSTREAM_BODY_CHARS)
    }
}

impl DataSanitizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Collapse whitespace, drop control characters and cap the length.
    pub fn sanitize_upstream_body(&self, body: &str) -> String {
        let collapsed = body
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut cleaned: String = collapsed
            .chars()
            .filter(|c| !c.is_control())
            .take(self.max_chars)
            .collect();

        if collapsed.chars().count() > self.max_chars {
            cleaned.push_str("...");
        }
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_truncated() {
        let sanitizer = DataSanitizer::new(5);
        assert_eq!(sanitizer.sanitize_upstream_body("abcdefgh"), "abcde...");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let sanitizer = DataSanitizer::default();
        assert_eq!(
            sanitizer.sanitize_upstream_body("{\n  \"error\":\t\"bad\"\n}"),
            "{ \"error\": \"bad\" }"
        );
    }
}
