//! Recovering a structured call from raw model output.
//!
//! Model replies arrive decorated: markdown fences, `<think>` reasoning blocks
//! (which may themselves contain braces), prose before or after the payload.
//! The extractor strips the decoration first, then looks for the first
//! balanced object, so braces inside discarded reasoning can never be taken
//! for the payload. A marker only opens a block outside JSON string
//! literals, so argument text that mentions a marker survives.

use crate::action::{Arguments, StructuredCall};
use crate::logging::{preview, redact_secrets};
use crate::ExtractionError;
use serde_json::{Map, Value};

const FENCE_TOKENS: [&str; 3] = ["```json", "```JSON", "```"];

/// What a well-formed reply turned out to contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A `function_call` wrapper with a name and arguments
    Call(StructuredCall),
    /// Valid JSON without a recognisable call. Not an error.
    NoActionableIntent,
}

/// Parses model replies into [`Extraction`]s
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    reasoning_open: String,
    reasoning_close: String,
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self {
            reasoning_open: "<think>".to_string(),
            reasoning_close: "</think>".to_string(),
        }
    }
}

impl ResponseExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different reasoning block delimiters
    pub fn with_reasoning_markers(
        mut self,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Self {
        self.reasoning_open = open.into();
        self.reasoning_close = close.into();
        self
    }

    /// Extract a call from `raw`.
    ///
    /// Reasoning blocks are removed pairwise before the object search. When
    /// that leaves no usable object and the reply carried a closing marker
    /// whose opening one was cut off, the text after that marker is tried.
    ///
    /// # Errors
    ///
    /// * [`ExtractionError::NoJsonFound`] when no `{ ... }` candidate exists
    /// * [`ExtractionError::MalformedJson`] when the candidate does not parse
    pub fn extract(&self, raw: &str) -> Result<Extraction, ExtractionError> {
        tracing::debug!(
            reply = %preview(&redact_secrets(raw), 400),
            "Extracting call from model reply"
        );

        let scan = self.scan_reasoning(raw);
        let first = parse_candidate(&scan.stripped);
        if first.is_ok() {
            return first;
        }

        if let Some(offset) = scan.after_orphan_close {
            let tail = self.scan_reasoning(&raw[offset..]);
            if let Ok(extraction) = parse_candidate(&tail.stripped) {
                tracing::debug!("Call found after an unpaired closing marker");
                return Ok(extraction);
            }
        }

        first
    }

    /// Remove every complete reasoning block, nested content included.
    ///
    /// Only paired markers delimit a block. Markers inside JSON string
    /// literals are text, and unpaired markers are left where they are.
    pub fn strip_reasoning(&self, text: &str) -> String {
        self.scan_reasoning(text).stripped
    }

    fn scan_reasoning(&self, text: &str) -> ReasoningScan {
        let open = self.reasoning_open.as_str();
        let close = self.reasoning_close.as_str();

        let mut scan = ReasoningScan::default();
        if open.is_empty() || close.is_empty() {
            scan.stripped = text.to_string();
            return scan;
        }

        let mut block_depth = 0usize;
        let mut block_start = 0usize;
        let mut kept_from = 0usize;
        let mut json = JsonCursor::default();
        let mut pos = 0usize;

        while let Some(ch) = text[pos..].chars().next() {
            let rest = &text[pos..];

            if block_depth > 0 {
                if rest.starts_with(close) {
                    block_depth -= 1;
                    pos += close.len();
                    if block_depth == 0 {
                        kept_from = pos;
                    }
                    continue;
                }
                if rest.starts_with(open) {
                    block_depth += 1;
                    pos += open.len();
                    continue;
                }
            } else if !json.in_string {
                if rest.starts_with(open) {
                    scan.stripped.push_str(&text[kept_from..pos]);
                    block_start = pos;
                    block_depth = 1;
                    pos += open.len();
                    continue;
                }
                if rest.starts_with(close) {
                    pos += close.len();
                    scan.after_orphan_close = Some(pos);
                    continue;
                }
                json.step(ch);
            } else {
                json.step(ch);
            }

            pos += ch.len_utf8();
        }

        if block_depth > 0 {
            scan.stripped.push_str(&text[block_start..]);
        } else {
            scan.stripped.push_str(&text[kept_from..]);
        }
        scan
    }
}

#[derive(Debug, Default)]
struct ReasoningScan {
    stripped: String,
    /// Offset just past the last closing marker with no opening one
    after_orphan_close: Option<usize>,
}

/// Tracks whether the scan sits inside a JSON string literal
#[derive(Debug, Default)]
struct JsonCursor {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonCursor {
    fn step(&mut self, ch: char) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return;
        }

        match ch {
            '{' => self.depth += 1,
            '}' => self.depth = self.depth.saturating_sub(1),
            '"' if self.depth > 0 => self.in_string = true,
            _ => {}
        }
    }
}

fn parse_candidate(text: &str) -> Result<Extraction, ExtractionError> {
    let cleaned = strip_fences(text);
    let candidate = find_object(&cleaned).ok_or(ExtractionError::NoJsonFound)?;

    let value: Value = serde_json::from_str(candidate.trim())
        .map_err(|e| ExtractionError::MalformedJson(e.to_string()))?;

    Ok(match parse_function_call(&value) {
        Some(call) => Extraction::Call(call),
        None => Extraction::NoActionableIntent,
    })
}

fn strip_fences(text: &str) -> String {
    FENCE_TOKENS
        .iter()
        .fold(text.to_string(), |acc, token| acc.replace(token, ""))
}

/// First balanced `{ ... }` substring.
///
/// Braces inside JSON strings do not count. If the first object never
/// closes, falls back to the span from the first `{` to the last `}` and
/// lets the parser report what is wrong with it.
fn find_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    if let Some(end) = balanced_end(text, start) {
        return Some(&text[start..=end]);
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_function_call(value: &Value) -> Option<StructuredCall> {
    let wrapper = value.get("function_call")?.as_object()?;
    let name = wrapper.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match wrapper.get("arguments")? {
        Value::Object(map) => normalize_arguments(map),
        // OpenAI-style: arguments as a JSON-encoded string
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => normalize_arguments(&map),
            _ => return None,
        },
        _ => return None,
    };

    Some(StructuredCall {
        name: name.to_string(),
        arguments,
    })
}

/// Flatten argument values to text. `null` means absent.
fn normalize_arguments(map: &Map<String, Value>) -> Arguments {
    map.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(raw: &str) -> Result<Extraction, ExtractionError> {
        ResponseExtractor::new().extract(raw)
    }

    fn call(raw: &str) -> StructuredCall {
        match extract(raw) {
            Ok(Extraction::Call(call)) => call,
            other => panic!("expected a call, got {:?}", other),
        }
    }

    const BARE: &str =
        r#"{"function_call": {"name": "check_shipping", "arguments": {"order_id": "123"}}}"#;

    #[test]
    fn test_bare_call() {
        let call = call(BARE);
        assert_eq!(call.name, "check_shipping");
        assert_eq!(call.arg("order_id"), Some("123"));
    }

    #[test]
    fn test_fenced_call() {
        let raw = format!("```json\n{}\n```", BARE);
        assert_eq!(call(&raw), call(BARE));

        let raw = format!("```\n{}\n```", BARE);
        assert_eq!(call(&raw), call(BARE));
    }

    #[test]
    fn test_reasoning_with_braces_is_discarded() {
        let raw = format!(
            "<think>The user wants {{\"function_call\": {{\"name\": \"delete_event\"}}}}, or maybe not {{</think>\n{}",
            BARE
        );
        assert_eq!(call(&raw), call(BARE));
    }

    #[test]
    fn test_nested_reasoning_is_discarded_entirely() {
        let raw = format!("<think>outer <think>inner {{}}</think> still thinking</think>{}", BARE);
        assert_eq!(call(&raw), call(BARE));
    }

    #[test]
    fn test_unterminated_marker_is_not_a_block() {
        let raw = format!("<think>{} and then the reply got cut", BARE);
        assert_eq!(call(&raw), call(BARE));

        let raw = "<think>still deciding whether to call check_shipping";
        assert_eq!(extract(raw), Err(ExtractionError::NoJsonFound));
    }

    #[test]
    fn test_marker_inside_argument_value_is_text() {
        let raw = r#"{"function_call":{"name":"create_event","arguments":{"summary":"talk on <think> tags","calendar_id":"p"}}}"#;
        let call = call(raw);
        assert_eq!(call.name, "create_event");
        assert_eq!(call.arg("summary"), Some("talk on <think> tags"));
        assert_eq!(call.arg("calendar_id"), Some("p"));
    }

    #[test]
    fn test_paired_markers_split_across_values_are_text() {
        let raw = r#"{"function_call": {"name": "create_event", "arguments": {"summary": "a <think>", "description": "</think> b"}}}"#;
        let call = call(raw);
        assert_eq!(call.arg("summary"), Some("a <think>"));
        assert_eq!(call.arg("description"), Some("</think> b"));
    }

    #[test]
    fn test_payload_between_two_blocks() {
        let raw = format!("<think>first pass</think>\n{}\n<think>double check</think>", BARE);
        assert_eq!(call(&raw), call(BARE));
    }

    #[test]
    fn test_each_block_is_stripped_separately() {
        let extractor = ResponseExtractor::new();
        assert_eq!(
            extractor.strip_reasoning("a<think>x</think>b<think>y<think>z</think></think>c"),
            "abc"
        );
        assert_eq!(extractor.strip_reasoning(BARE), BARE);
    }

    #[test]
    fn test_orphan_closing_marker() {
        let raw = format!("reasoning {{ with a brace </think>{}", BARE);
        assert_eq!(call(&raw), call(BARE));
    }

    #[test]
    fn test_surrounding_prose_and_second_object() {
        let raw = format!("Sure! Here you go:\n{}\nAlso: {{\"other\": 1}}", BARE);
        assert_eq!(call(&raw), call(BARE));
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"{"function_call": {"name": "create_event", "arguments": {"summary": "Fix } bug {", "calendar_id": "primary"}}} trailing }"#;
        let call = call(raw);
        assert_eq!(call.arg("summary"), Some("Fix } bug {"));
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let raw = r#"{"function_call": {"name": "create_event", "arguments": {"summary": "say \"hi}\""}}}"#;
        assert_eq!(call(raw).arg("summary"), Some("say \"hi}\""));
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(
            extract("I could not understand the question."),
            Err(ExtractionError::NoJsonFound)
        );
        assert_eq!(extract(""), Err(ExtractionError::NoJsonFound));
        assert_eq!(extract("only a closing }"), Err(ExtractionError::NoJsonFound));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            extract("{\"function_call\": {\"name\": }"),
            Err(ExtractionError::MalformedJson(_))
        ));
        assert!(matches!(
            extract("{not json at all}"),
            Err(ExtractionError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_unclosed_object_falls_back_to_last_brace() {
        assert!(matches!(
            extract(r#"{"a": {"b": 1}"#),
            Err(ExtractionError::MalformedJson(_))
        ));
        assert!(matches!(
            extract(r#"{"k": "open string } }"#),
            Err(ExtractionError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_trailing_stray_brace_is_ignored() {
        assert_eq!(
            extract(r#"{"a": {"b": 1} }x{"#),
            Ok(Extraction::NoActionableIntent)
        );
    }

    #[test]
    fn test_no_actionable_intent() {
        assert_eq!(
            extract(r#"{"message": "Which order do you mean?"}"#),
            Ok(Extraction::NoActionableIntent)
        );
        assert_eq!(
            extract(r#"{"function_call": {"name": "check_shipping"}}"#),
            Ok(Extraction::NoActionableIntent)
        );
        assert_eq!(
            extract(r#"{"function_call": {"name": "", "arguments": {}}}"#),
            Ok(Extraction::NoActionableIntent)
        );
    }

    #[test]
    fn test_argument_normalisation() {
        let raw = r#"{"function_call": {"name": "x", "arguments": {
            "order_id": 123, "urgent": true, "note": null, "tags": ["a", "b"], "loc": {"lat": 1}
        }}}"#;
        let call = call(raw);
        assert_eq!(call.arg("order_id"), Some("123"));
        assert_eq!(call.arg("urgent"), Some("true"));
        assert_eq!(call.arg("note"), None);
        assert_eq!(call.arg("tags"), Some(r#"["a","b"]"#));
        assert_eq!(call.arg("loc"), Some(r#"{"lat":1}"#));
    }

    #[test]
    fn test_string_encoded_arguments() {
        let raw = r#"{"function_call": {"name": "check_shipping", "arguments": "{\"order_id\": \"456\"}"}}"#;
        assert_eq!(call(raw).arg("order_id"), Some("456"));
    }

    #[test]
    fn test_custom_reasoning_markers() {
        let extractor =
            ResponseExtractor::new().with_reasoning_markers("<reasoning>", "</reasoning>");
        let raw = format!("<reasoning>{{oops</reasoning>{}", BARE);
        assert!(matches!(extractor.extract(&raw), Ok(Extraction::Call(_))));
    }
}
