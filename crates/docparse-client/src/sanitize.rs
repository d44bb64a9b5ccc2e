//! Log-line sanitization
//!
//! Response bodies and document content end up in log lines. They are
//! decoded lossily, truncated, and scrubbed of credentials first.

use std::borrow::Cow;

const MAX_VISIBLE_LENGTH: usize = 500;

/// Decode bytes as UTF-8, replacing invalid sequences with U+FFFD
pub fn sanitize_bytes(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Prepare text for a log line: truncate and redact secrets
pub fn sanitize_for_log(text: &str) -> String {
    let truncated = if text.chars().count() > MAX_VISIBLE_LENGTH {
        let head: String = text.chars().take(MAX_VISIBLE_LENGTH).collect();
        format!("{}... ({} chars total)", head, text.chars().count())
    } else {
        text.to_string()
    };

    redact_sensitive_patterns(&truncated)
}

fn redact_sensitive_patterns(text: &str) -> String {
    let patterns = [
        ("Bearer ", "Bearer [REDACTED]"),
        ("api_key=", "api_key=[REDACTED]"),
        ("\"api_key\":\"", "\"api_key\":\"[REDACTED]"),
        ("token=", "token=[REDACTED]"),
    ];

    let mut result = text.to_string();
    for (pattern, replacement) in patterns {
        let mut search_from = 0;
        while let Some(found) = result[search_from..].find(pattern) {
            let idx = search_from + found;
            let value_start = idx + pattern.len();
            let end = result[value_start..]
                .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'')
                .map(|i| value_start + i)
                .unwrap_or(result.len());
            result = format!("{}{}{}", &result[..idx], replacement, &result[end..]);
            search_from = idx + replacement.len();
        }
    }

    result
}
