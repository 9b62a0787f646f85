//! Parsing of schema-constrained model output.
//!
//! Models often wrap JSON in Markdown fences even when a response schema was
//! requested. Both helpers here strip that wrapping and surface a
//! [`AgentError::MalformedResponse`] instead of a raw `serde_json` error.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::AgentError;

const EXCERPT_CHARS: usize = 120;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:json)?[ \t]*\r?\n?").expect("fence pattern is valid")
});

static FENCED_JSON_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("fenced block pattern is valid")
});

/// Removes every Markdown code fence marker and trims the remainder.
pub fn strip_code_fences(text: &str) -> String {
    FENCE.replace_all(text, "").trim().to_string()
}

/// Parses a model response as JSON after removing code fences.
pub fn parse_json<T>(text: &str) -> Result<T, AgentError>
where
    T: DeserializeOwned,
{
    let cleaned = strip_code_fences(text);
    serde_json::from_str(&cleaned).map_err(|err| {
        tracing::warn!(error = %err, excerpt = %excerpt(text), "malformed_structured_output");
        AgentError::MalformedResponse {
            excerpt: excerpt(text),
        }
    })
}

/// Extracts a JSON array from free-form text, as returned by grounded
/// (search-backed) answers that cannot carry a response schema.
///
/// A fenced `json` block wins; otherwise the span from the first `[` to the
/// last `]` is parsed.
pub fn extract_json_array<T>(text: &str) -> Result<T, AgentError>
where
    T: DeserializeOwned,
{
    let malformed = || AgentError::MalformedResponse {
        excerpt: excerpt(text),
    };

    if let Some(block) = FENCED_JSON_BLOCK
        .captures(text)
        .and_then(|captures| captures.get(1))
    {
        return serde_json::from_str(block.as_str()).map_err(|_| malformed());
    }

    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(malformed());
    };
    if end < start {
        return Err(malformed());
    }

    serde_json::from_str(&text[start..=end]).map_err(|_| malformed())
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn fenced_json_round_trips() {
        let value: Value = parse_json("```json\n{\"a\":1}\n```").expect("parses");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn bare_fences_and_whitespace_are_tolerated() {
        let value: Vec<String> =
            parse_json("  ```\n[\"Tell me about yourself\"]\n```  ").expect("parses");
        assert_eq!(value, vec!["Tell me about yourself".to_string()]);
    }

    #[test]
    fn unparseable_text_is_a_malformed_response() {
        let err = parse_json::<Value>("Sure! Here is your JSON: {oops").expect_err("must fail");
        match err {
            AgentError::MalformedResponse { excerpt } => {
                assert!(excerpt.starts_with("Sure! Here is your JSON"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_message_is_user_facing() {
        let err = parse_json::<Value>("nope").expect_err("must fail");
        assert!(
            err.to_string()
                .starts_with("The AI returned a malformed JSON response.")
        );
    }

    #[test]
    fn excerpt_is_truncated_on_a_char_boundary() {
        let long = "é".repeat(200);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Video {
        title: String,
        video_id: String,
    }

    #[test]
    fn extract_array_prefers_fenced_block() {
        let text = "Here are some videos:\n```json\n[{\"title\":\"A\",\"videoId\":\"abcdefghijk\"}]\n```\nEnjoy [them]!";
        let videos: Vec<Video> = extract_json_array(text).expect("extracts");
        assert_eq!(
            videos,
            vec![Video {
                title: "A".to_string(),
                video_id: "abcdefghijk".to_string(),
            }]
        );
    }

    #[test]
    fn extract_array_falls_back_to_bracket_span() {
        let text = "Results: [{\"title\":\"B\",\"videoId\":\"bbbbbbbbbbb\"}] (from search)";
        let videos: Vec<Video> = extract_json_array(text).expect("extracts");
        assert_eq!(videos[0].title, "B");
    }

    #[test]
    fn extract_array_without_brackets_fails() {
        let err = extract_json_array::<Vec<Video>>("no videos found").expect_err("must fail");
        assert!(matches!(err, AgentError::MalformedResponse { .. }));
    }
}
