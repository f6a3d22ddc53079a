//! Structural validation of uploaded JSON-LD checkpoints.

use serde_json::{Map, Value};

use super::convert::jsonld_to_v2;
use super::error::CheckpointConversionError;
use super::jsonld::{
    JsonLdCheckpoint, RatingType, DATA_FEED_TYPE, QUESTION_TYPE, SOURCE_CODE_TYPE,
};
use super::v2::UnifiedCheckpoint;
use crate::obs;
use crate::result::json_type_name;

fn check_ratings(ratings: Option<&Value>, location: &str, violations: &mut Vec<String>) {
    let Some(ratings) = ratings else {
        return;
    };
    let Some(ratings) = ratings.as_array() else {
        violations.push(format!(
            "{location}.rating must be an array, found {}",
            json_type_name(ratings)
        ));
        return;
    };
    for (i, rating) in ratings.iter().enumerate() {
        let at = format!("{location}.rating[{i}]");
        let Some(rating) = rating.as_object() else {
            violations.push(format!("{at} must be an object"));
            continue;
        };
        if !rating.get("name").is_some_and(Value::is_string) {
            violations.push(format!("{at} is missing `name`"));
        }
        match rating.get("additionalType") {
            Some(Value::String(t)) if RatingType::parse(t).is_some() => {}
            Some(Value::String(t)) => {
                violations.push(format!("{at} has invalid additionalType \"{t}\""))
            }
            Some(other) => violations.push(format!(
                "{at} has invalid additionalType of type {}",
                json_type_name(other)
            )),
            None => violations.push(format!("{at} is missing `additionalType`")),
        }
    }
}

fn check_question(question: &Map<String, Value>, location: &str, violations: &mut Vec<String>) {
    match question.get("@type") {
        Some(Value::String(t)) if t == QUESTION_TYPE => {}
        Some(_) => violations.push(format!("{location} @type must be \"{QUESTION_TYPE}\"")),
        None => violations.push(format!("{location} is missing `@type`")),
    }
    if !question.get("text").is_some_and(Value::is_string) {
        violations.push(format!("{location} is missing `text`"));
    }
    match question.get("acceptedAnswer") {
        Some(Value::Object(answer)) => {
            if !answer.get("text").is_some_and(Value::is_string) {
                violations.push(format!("{location}.acceptedAnswer is missing `text`"));
            }
        }
        Some(_) => violations.push(format!("{location}.acceptedAnswer must be an object")),
        None => violations.push(format!("{location} is missing `acceptedAnswer`")),
    }
    match question.get("hasPart") {
        Some(Value::Object(part)) => {
            if part.get("@type").and_then(Value::as_str) != Some(SOURCE_CODE_TYPE) {
                violations.push(format!(
                    "{location}.hasPart @type must be \"{SOURCE_CODE_TYPE}\""
                ));
            }
            if !part.get("text").is_some_and(Value::is_string) {
                violations.push(format!("{location}.hasPart is missing `text`"));
            }
        }
        Some(_) => violations.push(format!("{location}.hasPart must be an object")),
        None => violations.push(format!("{location} is missing `hasPart`")),
    }
    check_ratings(question.get("rating"), location, violations);
}

/// Check an uploaded document before conversion.
///
/// Every violation is collected; the returned error lists all of them.
pub fn validate_jsonld_checkpoint(doc: &Value) -> Result<(), CheckpointConversionError> {
    let mut violations = Vec::new();
    let Some(root) = doc.as_object() else {
        let err = CheckpointConversionError::single(format!(
            "checkpoint must be a JSON object, found {}",
            json_type_name(doc)
        ));
        obs::emit_checkpoint_rejected(1);
        return Err(err);
    };

    match root.get("@type") {
        Some(Value::String(t)) if t == DATA_FEED_TYPE => {}
        Some(other) => violations.push(format!(
            "root @type must be \"{DATA_FEED_TYPE}\", found {other}"
        )),
        None => violations.push("root is missing `@type`".to_string()),
    }

    check_ratings(root.get("rating"), "root", &mut violations);

    match root.get("dataFeedElement") {
        None => violations.push("missing `dataFeedElement`".to_string()),
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let at = format!("dataFeedElement[{i}]");
                match item.as_object().map(|o| o.get("item")) {
                    None => violations.push(format!("{at} must be an object")),
                    Some(None) => violations.push(format!("{at} is missing `item`")),
                    Some(Some(Value::Object(q))) => {
                        check_question(q, &format!("{at}.item"), &mut violations)
                    }
                    Some(Some(_)) => violations.push(format!("{at}.item must be an object")),
                }
            }
        }
        Some(other) => violations.push(format!(
            "dataFeedElement must be an array, found {}",
            json_type_name(other)
        )),
    }

    if !violations.is_empty() {
        obs::emit_checkpoint_rejected(violations.len());
    }
    CheckpointConversionError::check(violations)
}

/// Parse, validate and convert a JSON-LD checkpoint file's contents.
pub fn parse_jsonld_checkpoint(text: &str) -> Result<UnifiedCheckpoint, CheckpointConversionError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| CheckpointConversionError::single(format!("invalid JSON: {e}")))?;
    validate_jsonld_checkpoint(&value)?;
    let doc: JsonLdCheckpoint = serde_json::from_value(value).map_err(|e| {
        CheckpointConversionError::single(format!("malformed JSON-LD checkpoint: {e}"))
    })?;
    jsonld_to_v2(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(text: &str) -> Value {
        json!({
            "@type": "Question",
            "@id": format!("urn:uuid:question-{text}"),
            "text": text,
            "acceptedAnswer": { "@type": "Answer", "text": "42" },
            "hasPart": { "@type": "SoftwareSourceCode", "text": "class Answer: ..." }
        })
    }

    #[test]
    fn accepts_minimal_feed() {
        let doc = json!({
            "@type": "DataFeed",
            "dataFeedElement": [{ "@type": "DataFeedItem", "item": question("q1") }]
        });
        assert!(validate_jsonld_checkpoint(&doc).is_ok());
    }

    #[test]
    fn missing_feed_elements_and_bad_rating_are_both_reported() {
        let doc = json!({
            "@type": "DataFeed",
            "rating": [{ "@type": "Rating", "name": "x", "additionalType": "GlobalLLMTrait" }]
        });
        let err = validate_jsonld_checkpoint(&doc).unwrap_err();
        assert_eq!(err.violations.len(), 2);
        let msg = err.to_string();
        assert!(msg.contains("missing `dataFeedElement`"));
        assert!(msg.contains("invalid additionalType \"GlobalLLMTrait\""));
    }

    #[test]
    fn collects_question_violations() {
        let doc = json!({
            "@type": "Dataset",
            "dataFeedElement": [
                {},
                { "item": { "@type": "Question", "hasPart": { "@type": "Code", "text": "" } } }
            ]
        });
        let err = validate_jsonld_checkpoint(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("root @type must be \"DataFeed\""));
        assert!(msg.contains("dataFeedElement[0] is missing `item`"));
        assert!(msg.contains("dataFeedElement[1].item is missing `text`"));
        assert!(msg.contains("dataFeedElement[1].item is missing `acceptedAnswer`"));
        assert!(msg.contains("hasPart @type must be \"SoftwareSourceCode\""));
        assert_eq!(err.violations.len(), 5);
    }

    #[test]
    fn non_array_feed_is_rejected() {
        let doc = json!({ "@type": "DataFeed", "dataFeedElement": {} });
        let err = validate_jsonld_checkpoint(&doc).unwrap_err();
        assert_eq!(
            err.violations,
            vec!["dataFeedElement must be an array, found object"]
        );
    }

    #[test]
    fn parse_reports_invalid_json() {
        let err = parse_jsonld_checkpoint("{not json").unwrap_err();
        assert!(err.violations[0].starts_with("invalid JSON"));
    }

    #[test]
    fn parse_converts_valid_document() {
        let doc = json!({
            "@type": "DataFeed",
            "name": "Demo",
            "dataFeedElement": [{
                "@type": "DataFeedItem",
                "dateModified": "2026-01-01T00:00:00Z",
                "item": question("q1")
            }]
        });
        let cp = parse_jsonld_checkpoint(&doc.to_string()).unwrap();
        assert_eq!(cp.checkpoint.len(), 1);
        let item = &cp.checkpoint["urn:uuid:question-q1"];
        assert_eq!(item.raw_answer, "42");
        assert_eq!(item.last_modified, "2026-01-01T00:00:00Z");
        assert_eq!(
            cp.dataset_metadata.and_then(|m| m.name).as_deref(),
            Some("Demo")
        );
    }
}
