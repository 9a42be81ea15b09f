use serde_json::Value;
use tracing::debug;

use crate::error::NormalizationError;
use crate::models::{AnalysisInstance, AnalysisResult};

/// Upper bound on messages kept on either side of a flagged message
pub const MAX_CONTEXT_MESSAGES: usize = 10;

/// Turn raw model output into a bounded `AnalysisResult`.
///
/// The model is told to emit a bare JSON array, but this does not rely on it:
/// 1. Trim and strip every code fence marker (triple backticks, with or
///    without a `json` tag)
/// 2. Slice from the first `[` to the last `]`, dropping surrounding prose
/// 3. Parse the slice as JSON
/// 4. Require `context-before` and `context-after` arrays on each element and
///    bound them
///
/// Only the context upper bound is enforced. Messages, instance ids, `flagged`
/// and any other keys are passed through as the model produced them, as are
/// the instance count and the lower bound on context size.
pub fn normalize(raw: &str) -> Result<AnalysisResult, NormalizationError> {
    let sanitized = strip_fences(raw.trim());
    let span = extract_array_span(&sanitized).ok_or(NormalizationError::NoJsonArrayFound)?;

    let value: Value =
        serde_json::from_str(span).map_err(|source| NormalizationError::InvalidJson {
            sanitized: span.to_string(),
            source,
        })?;

    // A span that opens with `[`, closes with `]` and parses can only be an array
    let Value::Array(items) = value else {
        return Err(NormalizationError::NoJsonArrayFound);
    };

    let instances = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut instance: AnalysisInstance = serde_json::from_value(item)
                .map_err(|source| NormalizationError::MalformedInstance { index, source })?;
            instance.truncate_context(MAX_CONTEXT_MESSAGES);
            Ok(instance)
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Normalized {} instances", instances.len());

    Ok(AnalysisResult::new(instances))
}

fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Slice from the first `[` through the last `]`, inclusive
fn extract_array_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(i: usize) -> Value {
        json!({"time": 1_700_000_000 + i as i64, "author": "alice", "message": format!("m{}", i)})
    }

    fn instance(before: usize, after: usize) -> Value {
        let context_before: Vec<Value> = (0..before).map(message).collect();
        let context_after: Vec<Value> = (100..100 + after).map(message).collect();
        json!({
            "instance_ID": 1,
            "context-before": context_before,
            "flagged": [
                {"time": 1_700_000_500, "author": "mallory", "message": "flagged"},
                {"time": 0, "author": "AI-ANALYZER", "message": "why"}
            ],
            "context-after": context_after
        })
    }

    #[test]
    fn test_no_brackets() {
        let err = normalize("no brackets here").unwrap_err();
        assert!(matches!(err, NormalizationError::NoJsonArrayFound));
    }

    #[test]
    fn test_brackets_in_wrong_order() {
        let err = normalize("] then [").unwrap_err();
        assert!(matches!(err, NormalizationError::NoJsonArrayFound));
    }

    #[test]
    fn test_fenced_empty_array() {
        let result = normalize("```json\n[]\n```").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_bare_empty_array() {
        assert!(normalize("  []  ").unwrap().is_empty());
    }

    #[test]
    fn test_prose_and_fences_around_array() {
        let array = json!([instance(3, 3)]);
        let raw = format!(
            "Sure! Here are my findings:\n```json\n{}\n```\nLet me know if you need more.",
            serde_json::to_string_pretty(&array).unwrap()
        );

        let result = normalize(&raw).unwrap();

        assert_eq!(result.len(), 1);
        let expected: AnalysisInstance = serde_json::from_value(instance(3, 3)).unwrap();
        assert_eq!(result.instances[0], expected);
    }

    #[test]
    fn test_bare_closing_fences_are_stripped_anywhere() {
        let raw = "```\n[]\n``` trailing ```";
        assert!(normalize(raw).unwrap().is_empty());
    }

    fn texts(messages: &[Value]) -> Vec<&str> {
        messages.iter().filter_map(|m| m["message"].as_str()).collect()
    }

    #[test]
    fn test_context_before_keeps_last_ten() {
        let raw = json!([instance(11, 2)]).to_string();

        let result = normalize(&raw).unwrap();

        let inst = &result.instances[0];
        assert_eq!(inst.context_before.len(), 10);
        assert_eq!(inst.context_before[0]["message"], "m1");
        assert_eq!(inst.context_before[9]["message"], "m10");
        assert_eq!(inst.context_after.len(), 2);
        assert_eq!(inst.flagged().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_context_after_keeps_first_ten() {
        let raw = json!([instance(0, 25)]).to_string();

        let result = normalize(&raw).unwrap();

        let expected: Vec<String> = (100..110).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts(&result.instances[0].context_after), expected);
    }

    #[test]
    fn test_minimum_context_not_enforced() {
        let result = normalize(&json!([instance(0, 1)]).to_string()).unwrap();
        assert!(result.instances[0].context_before.is_empty());
        assert_eq!(result.instances[0].context_after.len(), 1);
    }

    #[test]
    fn test_instance_count_not_capped() {
        let many: Vec<Value> = (0..12).map(|_| instance(1, 1)).collect();
        let result = normalize(&Value::Array(many).to_string()).unwrap();
        assert_eq!(result.len(), 12);
    }

    #[test]
    fn test_idempotent() {
        let raw = json!([instance(14, 13), instance(2, 0)]).to_string();

        let first = normalize(&raw).unwrap();
        let second = normalize(&serde_json::to_string(&first).unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_json_carries_sanitized_text() {
        let raw = "```json\n[{\"instance_ID\": 1,]\n```";

        let err = normalize(raw).unwrap_err();

        match err {
            NormalizationError::InvalidJson { sanitized, .. } => {
                assert_eq!(sanitized, "[{\"instance_ID\": 1,]");
            }
            other => panic!("expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn test_two_arrays_with_prose_between_is_invalid() {
        let err = normalize("[1] and also [2]").unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidJson { .. }));
    }

    #[test]
    fn test_missing_context_after_is_malformed() {
        let mut broken = instance(2, 2);
        broken.as_object_mut().unwrap().remove("context-after");
        let raw = json!([instance(1, 1), broken]).to_string();

        let err = normalize(&raw).unwrap_err();

        assert!(matches!(
            err,
            NormalizationError::MalformedInstance { index: 1, .. }
        ));
    }

    #[test]
    fn test_null_context_before_is_malformed() {
        let mut broken = instance(2, 2);
        broken["context-before"] = Value::Null;

        let err = normalize(&json!([broken]).to_string()).unwrap_err();

        assert!(matches!(
            err,
            NormalizationError::MalformedInstance { index: 0, .. }
        ));
    }

    #[test]
    fn test_non_object_element_is_malformed() {
        let err = normalize("[42]").unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::MalformedInstance { index: 0, .. }
        ));
    }

    #[test]
    fn test_loose_message_fields_pass_through() {
        let loose = json!({
            "instance_ID": "1",
            "context-before": [
                {"author": null, "message": "who said this"},
                {"author": "bob", "message": "no timestamp"}
            ],
            "flagged": [
                {"time": "10/12/2024, 21:04", "author": "eve", "message": "meet me"},
                {"time": 0, "author": "AI-ANALYZER", "message": "meetup request"}
            ],
            "context-after": [{"time": 1729284750.5, "author": "bob", "message": "ok"}]
        });

        let result = normalize(&json!([loose.clone()]).to_string()).unwrap();

        assert_eq!(serde_json::to_value(&result).unwrap(), json!([loose]));
        assert_eq!(result.instances[0].instance_id(), Some(&json!("1")));
        assert_eq!(result.instances[0].rationale(), Some("meetup request"));
    }

    #[test]
    fn test_null_id_and_flagged_are_kept() {
        let raw = r#"[{"instance_ID": null, "context-before": [], "flagged": null, "context-after": []}]"#;

        let result = normalize(raw).unwrap();

        let out = serde_json::to_value(&result).unwrap();
        assert_eq!(out[0]["instance_ID"], Value::Null);
        assert!(out[0].as_object().unwrap().contains_key("instance_ID"));
        assert!(out[0].as_object().unwrap().contains_key("flagged"));
    }

    #[test]
    fn test_non_array_context_after_is_malformed() {
        let mut broken = instance(2, 2);
        broken["context-after"] = json!("none");

        let err = normalize(&json!([broken]).to_string()).unwrap_err();

        assert!(matches!(
            err,
            NormalizationError::MalformedInstance { index: 0, .. }
        ));
    }
}
