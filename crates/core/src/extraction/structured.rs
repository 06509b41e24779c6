//! Parsing and schema validation of structured extraction output.

use crate::extraction::base::ExtractionError;
use jsonschema::JSONSchema;
use serde_json::Value;

/// Locate the JSON payload inside model output.
///
/// Prefers a fenced code block; otherwise takes the span from the first
/// `[` or `{` to the last matching closer.
pub fn locate_json(text: &str) -> Option<&str> {
    if let Some(fenced) = fenced_block(text) {
        let trimmed = fenced.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return Some(trimmed);
        }
    }

    let start = text.find(['[', '{'])?;
    let closer = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Contents of the first fenced code block, without the info string.
pub fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Parse `text` as JSON and validate it against `schema`.
pub fn parse_structured(text: &str, schema: &Value) -> Result<Value, ExtractionError> {
    let violation = |message: String| ExtractionError::SchemaViolation {
        message,
        raw: text.to_string(),
    };

    let payload = locate_json(text).ok_or_else(|| violation("no JSON value found".to_string()))?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| violation(format!("malformed JSON: {e}")))?;

    let compiled = JSONSchema::compile(schema)
        .map_err(|e| ExtractionError::ExecutionError(format!("invalid schema: {e}")))?;

    if let Err(errors) = compiled.validate(&value) {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(violation(messages.join("; ")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string_array_schema() -> Value {
        json!({
            "type": "array",
            "items": { "type": "string" },
            "minItems": 1
        })
    }

    #[test]
    fn test_locate_json_prefers_fence() {
        let text = "Here you go [note]\n```json\n[\"a\", \"b\"]\n```\nthanks";
        assert_eq!(locate_json(text), Some("[\"a\", \"b\"]"));
    }

    #[test]
    fn test_locate_json_bare_object() {
        let text = "result: {\"name\": \"x\"} done";
        assert_eq!(locate_json(text), Some("{\"name\": \"x\"}"));
    }

    #[test]
    fn test_locate_json_none() {
        assert_eq!(locate_json("nothing to see"), None);
    }

    #[test]
    fn test_parse_structured_valid() {
        let value = parse_structured("[\"Move (Block Type: moveP)\"]", &string_array_schema()).unwrap();
        assert_eq!(value, json!(["Move (Block Type: moveP)"]));
    }

    #[test]
    fn test_parse_structured_schema_violation_keeps_raw() {
        let raw = "[1, 2]";
        let err = parse_structured(raw, &string_array_schema()).unwrap_err();
        match err {
            ExtractionError::SchemaViolation { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_structured_malformed_json() {
        let err = parse_structured("[\"unterminated", &string_array_schema()).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaViolation { .. }));
    }
}
