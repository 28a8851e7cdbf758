//! Strict parsing of structured model output.
//!
//! Models are asked for bare JSON but routinely wrap it in code fences or
//! prose. Extraction strips the wrapping; parsing is then parse-or-fail
//! against the strict schemas in `model`. No best-effort attribute access.

use crate::model::{CritiqueDraft, Hypothesis};
use thiserror::Error;

/// A structured-output parse failure, carried into reformat retries.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON payload found in model output")]
    NoPayload,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty hypothesis slate")]
    EmptySlate,
}

/// Locate the JSON payload inside raw model output.
///
/// Prefers a fenced ```json block; otherwise takes the outermost
/// `[`..`]` or `{`..`}` span.
pub fn extract_payload(text: &str) -> Option<&str> {
    if let Some(fenced) = extract_fenced(text) {
        return Some(fenced);
    }
    let array = outermost_span(text, '[', ']');
    let object = outermost_span(text, '{', '}');
    match (array, object) {
        (Some(a), Some(o)) => {
            // Whichever opens first is the payload.
            if text.find('[').unwrap_or(usize::MAX) < text.find('{').unwrap_or(usize::MAX) {
                Some(a)
            } else {
                Some(o)
            }
        }
        (Some(a), None) => Some(a),
        (None, Some(o)) => Some(o),
        (None, None) => None,
    }
}

fn extract_fenced(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    let inner = body[..end].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

fn outermost_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse a slate of hypotheses from raw model output.
///
/// Accepts either a JSON array or a single object (treated as a slate of
/// one). An empty array is an error — a slate must contain work.
pub fn parse_slate(text: &str) -> Result<Vec<Hypothesis>, ParseError> {
    let payload = extract_payload(text).ok_or(ParseError::NoPayload)?;
    let slate: Vec<Hypothesis> = if payload.trim_start().starts_with('[') {
        serde_json::from_str(payload)?
    } else {
        vec![serde_json::from_str(payload)?]
    };
    if slate.is_empty() {
        return Err(ParseError::EmptySlate);
    }
    Ok(slate)
}

/// Parse a critique verdict from raw model output.
pub fn parse_critique(text: &str) -> Result<CritiqueDraft, ParseError> {
    let payload = extract_payload(text).ok_or(ParseError::NoPayload)?;
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HYPOTHESIS: &str = r#"{
        "short_description": "s", "long_description": "l", "novelty": 5,
        "not_novel": "", "missing": "", "superfluous": "",
        "anomaly": {"raised": false, "reason": ""},
        "biohazard": {"raised": false, "reason": ""},
        "references": [], "relation_to_literature": ""
    }"#;

    #[test]
    fn extracts_fenced_json() {
        let text = format!("Here you go:\n```json\n[{}]\n```\nDone.", HYPOTHESIS);
        let slate = parse_slate(&text).unwrap();
        assert_eq!(slate.len(), 1);
    }

    #[test]
    fn extracts_bare_array_with_surrounding_prose() {
        let text = format!("Sure! [{}] Hope that helps.", HYPOTHESIS);
        let slate = parse_slate(&text).unwrap();
        assert_eq!(slate.len(), 1);
    }

    #[test]
    fn single_object_becomes_slate_of_one() {
        let slate = parse_slate(HYPOTHESIS).unwrap();
        assert_eq!(slate.len(), 1);
        assert_eq!(slate[0].short_description, "s");
    }

    #[test]
    fn empty_array_is_an_error() {
        assert!(matches!(parse_slate("[]"), Err(ParseError::EmptySlate)));
    }

    #[test]
    fn prose_without_json_is_an_error() {
        assert!(matches!(
            parse_slate("I cannot generate hypotheses for these genes."),
            Err(ParseError::NoPayload)
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let text = r#"[{"short_description": "unterminated"#;
        assert!(matches!(parse_slate(text), Err(ParseError::Json(_))));
    }

    #[test]
    fn parses_critique_object() {
        let text = r#"{
            "novelty": "7", "not_novel": "a", "missing": "b", "superfluous": "c",
            "anomaly": {"raised": false, "reason": ""},
            "biohazard": {"raised": true, "reason": "dual use"},
            "references": ["PMID:1"], "relation_to_literature": "d"
        }"#;
        let draft = parse_critique(text).unwrap();
        assert_eq!(draft.novelty, 7);
        assert!(draft.biohazard.raised);
    }
}
