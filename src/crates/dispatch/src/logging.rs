//! Logging helpers
//!
//! Model replies and request text end up in debug logs; they go through
//! [`redact_secrets`] and [`preview`] first.

use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::debug;

/// Await `future`, logging how long the named stage took.
///
/// ```rust,ignore
/// let reply = timed("model_call", model.chat(request)).await;
/// ```
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    debug!(stage = name, "Starting");

    let result = future.await;

    debug!(stage = name, elapsed_ms = start.elapsed().as_millis() as u64, "Completed");
    result
}

fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)(api[\s_-]?key|apikey)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(password|passwd|pwd)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(token|secret)\s*[:=]\s*\S+", "$1: [REDACTED]"),
            (r"(?i)(authorization)\s*:\s*bearer\s+\S+", "$1: Bearer [REDACTED]"),
            (r"\bsk-[A-Za-z0-9]{8,}", "[REDACTED]"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

/// Replace credentials that look like API keys, tokens or passwords.
pub fn redact_secrets(input: &str) -> String {
    secret_patterns()
        .iter()
        .fold(input.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// First `max_chars` characters of `input`, with an ellipsis when cut.
pub fn preview(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &input[..cut]),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_secrets() {
        let redacted = redact_secrets("api_key=abc123 and Authorization: Bearer xyz.789");
        assert!(!redacted.contains("abc123"));
        assert!(!redacted.contains("xyz.789"));
        assert!(redacted.contains("[REDACTED]"));

        let redacted = redact_secrets("key sk-0123456789abcdef in prose");
        assert_eq!(redacted, "key [REDACTED] in prose");
    }

    #[test]
    fn test_redact_leaves_plain_text() {
        let text = r#"{"function_call": {"name": "check_shipping"}}"#;
        assert_eq!(redact_secrets(text), text);
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("查订单 123 状态", 3), "查订单…");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[tokio::test]
    async fn test_timed_returns_inner_value() {
        assert_eq!(timed("noop", async { 7 }).await, 7);
    }
}
