//! Decoding free-text strategy replies.
//!
//! A reply is expected to contain an optional `<thinking>…</thinking>` note
//! followed by one JSON object, but sources are sloppy: prose around the
//! object, several objects, trailing commas. [`parse_reply`] extracts the
//! note, removes the thinking block, drops trailing commas, and decodes the
//! last brace-delimited object (without nested braces) that carries at least
//! one directive field.

use serde::{Deserialize, Serialize};

use super::packet::RawIntent;
use crate::error::IntentError;

const THINK_OPEN: &str = "<thinking>";
const THINK_CLOSE: &str = "</thinking>";
const DIRECTIVE_KEYS: [&str; 4] = ["dx", "dy", "shoot", "shoot_probability"];

/// A decoded strategy reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleReply {
    /// The directive, still unvalidated.
    pub intent: RawIntent,
    /// The source's reasoning note, if it gave one.
    pub thinking: Option<String>,
}

/// Decodes a reply text.
///
/// # Errors
///
/// Returns [`IntentError::Undecodable`] if no object with a directive field
/// can be decoded.
///
/// # Example
///
/// ```
/// use riposte_core::intent::parse_reply;
///
/// let reply = parse_reply("<thinking>close in</thinking>\n{\"dx\": -0.9, \"shoot\": true, \"tick_id\": 4,}").unwrap();
/// assert_eq!(reply.thinking.as_deref(), Some("close in"));
/// assert_eq!(reply.intent.dx, Some(-0.9));
/// assert_eq!(reply.intent.dy, None);
/// ```
pub fn parse_reply(text: &str) -> Result<OracleReply, IntentError> {
    let thinking = extract_thinking(text);
    let body = strip_trailing_commas(&strip_thinking(text));

    let mut last_error = None;
    for candidate in flat_objects(&body).into_iter().rev() {
        let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(candidate) else {
            continue;
        };
        if !DIRECTIVE_KEYS.iter().any(|k| map.contains_key(*k)) {
            continue;
        }
        match serde_json::from_value::<RawIntent>(serde_json::Value::Object(map)) {
            Ok(intent) => return Ok(OracleReply { intent, thinking }),
            Err(err) => last_error = Some(err.to_string()),
        }
    }

    Err(IntentError::Undecodable(
        last_error.unwrap_or_else(|| "no directive object in reply".to_string()),
    ))
}

fn extract_thinking(text: &str) -> Option<String> {
    let start = text.find(THINK_OPEN)? + THINK_OPEN.len();
    let len = text[start..].find(THINK_CLOSE)?;
    let note = text[start..start + len].trim();
    (!note.is_empty()).then(|| note.to_string())
}

fn strip_thinking(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(THINK_OPEN) {
        let Some(close) = rest[open..].find(THINK_CLOSE) else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + THINK_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, c) in chars.iter().enumerate() {
        if *c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(*c);
    }
    out
}

/// Non-overlapping `{…}` spans that contain no other brace, left to right.
fn flat_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        match bytes[i + 1..].iter().position(|b| *b == b'{' || *b == b'}') {
            Some(offset) if bytes[i + 1 + offset] == b'}' => {
                let end = i + 1 + offset;
                spans.push(&text[i..=end]);
                i = end + 1;
            }
            Some(offset) => i += 1 + offset,
            None => break,
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let reply = parse_reply(r#"{"dx": 0.5, "dy": -0.5, "shoot": false, "tick_id": 9}"#).unwrap();
        assert_eq!(reply.intent.tick_id, Some(9));
        assert_eq!(reply.intent.shoot, Some(false));
        assert_eq!(reply.thinking, None);
    }

    #[test]
    fn last_directive_object_wins() {
        let text = r#"Example: {"dx": 1.0, "tick_id": 1} ... final: {"note": "x"} {"dx": -0.2, "tick_id": 2} trailing {"other": 1}"#;
        let reply = parse_reply(text).unwrap();
        assert_eq!(reply.intent.tick_id, Some(2));
        assert_eq!(reply.intent.dx, Some(-0.2));
    }

    #[test]
    fn braces_inside_thinking_are_ignored() {
        let text = "<thinking>maybe {\"dx\": 1}</thinking>{\"dy\": 0.4, \"tick_id\": 3}";
        let reply = parse_reply(text).unwrap();
        assert_eq!(reply.intent.dy, Some(0.4));
        assert_eq!(reply.intent.dx, None);
        assert_eq!(reply.thinking.as_deref(), Some("maybe {\"dx\": 1}"));
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let reply = parse_reply("{\"dx\": 0.1,\n \"shoot\": true,\n}").unwrap();
        assert_eq!(reply.intent.shoot, Some(true));
    }

    #[test]
    fn nested_object_is_skipped_for_inner_one() {
        let reply = parse_reply(r#"{"wrapper": {"dx": 0.3, "tick_id": 5}}"#).unwrap();
        assert_eq!(reply.intent.dx, Some(0.3));
    }

    #[test]
    fn garbage_is_undecodable() {
        assert!(matches!(parse_reply("I refuse."), Err(IntentError::Undecodable(_))));
        assert!(matches!(parse_reply("{\"mood\": 1}"), Err(IntentError::Undecodable(_))));
        assert!(matches!(parse_reply("{\"dx\": \"left\"}"), Err(IntentError::Undecodable(_))));
    }

    #[test]
    fn empty_thinking_is_none() {
        let reply = parse_reply("<thinking>  </thinking>{\"shoot\": true}").unwrap();
        assert_eq!(reply.thinking, None);
    }
}
