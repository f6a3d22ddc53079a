//! CSV export builder.
//!
//! Header layout is stable and independent of result order: registry fields
//! first, then one `rubric_<name>` column per global trait in sorted order,
//! then a single JSON column holding each row's question-specific traits.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::Path;

use serde_json::{Map, Value};

use super::fields::extract_from_value;
use super::{ExportError, ExportOptions};
use crate::obs;
use crate::result::ExportableResult;
use crate::rubric::Rubric;

/// Column holding the per-row question-specific trait object.
pub const QUESTION_SPECIFIC_COLUMN: &str = "question_specific_rubrics";

const GLOBAL_TRAIT_PREFIX: &str = "rubric_";

/// Quote a field if it contains a comma, quote, or line break.
pub fn escape_csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Render a JSON value as an unescaped CSV cell.
pub fn format_csv_value(value: &Value, is_json: bool) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if !is_json => s.clone(),
        other => other.to_string(),
    }
}

/// Sorted union of trait names present in any result's trait scores.
pub fn collect_trait_names(results: &[ExportableResult]) -> BTreeSet<String> {
    results
        .iter()
        .filter_map(|r| r.rubric.as_ref())
        .flat_map(|rubric| rubric.all_scores().map(|(name, _)| name.clone()))
        .collect()
}

/// Trait names split by whether the global rubric defines them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitPartition {
    pub global: Vec<String>,
    pub question_specific: Vec<String>,
}

/// Partition trait names; with no global rubric every trait is question-specific.
pub fn partition_traits(names: &BTreeSet<String>, global_rubric: Option<&Rubric>) -> TraitPartition {
    let (global, question_specific) = names
        .iter()
        .cloned()
        .partition(|name| global_rubric.is_some_and(|r| r.contains_trait(name)));
    TraitPartition {
        global,
        question_specific,
    }
}

fn push_row<'a>(out: &mut String, cells: impl IntoIterator<Item = Cow<'a, str>>) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        out.push_str(&cell);
        first = false;
    }
    out.push('\n');
}

/// Build the CSV document for `results`.
pub fn build_csv(
    results: &[ExportableResult],
    global_rubric: Option<&Rubric>,
    options: &ExportOptions,
) -> Result<String, ExportError> {
    let fields = options.resolve_fields()?;
    let partition = partition_traits(&collect_trait_names(results), global_rubric);
    let include_question_specific = !partition.question_specific.is_empty();

    let mut header: Vec<String> = fields.iter().map(|f| f.key.to_string()).collect();
    header.extend(
        partition
            .global
            .iter()
            .map(|name| format!("{GLOBAL_TRAIT_PREFIX}{name}")),
    );
    if include_question_specific {
        header.push(QUESTION_SPECIFIC_COLUMN.to_string());
    }

    let mut out = String::new();
    push_row(&mut out, header.iter().map(|h| escape_csv_field(h)));

    for (index, result) in results.iter().enumerate() {
        let json = serde_json::to_value(result)?;

        let mut cells: Vec<String> = fields
            .iter()
            .map(|field| {
                let value = extract_from_value(result, &json, field, index);
                format_csv_value(&value, field.is_json)
            })
            .collect();

        let rubric = result.rubric.as_ref();
        for name in &partition.global {
            let cell = rubric
                .and_then(|r| r.score(name))
                .map(|v| format_csv_value(v, false))
                .unwrap_or_default();
            cells.push(cell);
        }

        if include_question_specific {
            let specific: Map<String, Value> = partition
                .question_specific
                .iter()
                .filter_map(|name| {
                    rubric
                        .and_then(|r| r.score(name))
                        .map(|v| (name.clone(), v.clone()))
                })
                .collect();
            cells.push(serde_json::to_string(&Value::Object(specific))?);
        }

        push_row(&mut out, cells.iter().map(|c| escape_csv_field(c)));
    }

    obs::emit_export_built("csv", results.len(), header.len());
    Ok(out)
}

/// Build the CSV document and write it to `path`.
pub fn write_csv(
    path: &Path,
    results: &[ExportableResult],
    global_rubric: Option<&Rubric>,
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let content = build_csv(results, global_rubric, options)?;
    std::fs::write(path, content).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::LlmRubricTrait;
    use serde_json::json;

    fn result(question_id: &str, rubric: Value) -> ExportableResult {
        serde_json::from_value(json!({
            "metadata": {
                "question_id": question_id,
                "completed_without_errors": true,
                "answering_model": "m",
                "parsing_model": "p"
            },
            "rubric": rubric
        }))
        .expect("result")
    }

    #[test]
    fn escape_leaves_plain_fields_alone() {
        assert_eq!(escape_csv_field("plain text"), "plain text");
        assert!(matches!(escape_csv_field("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn escape_quotes_special_characters() {
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line1\nline2"), "\"line1\nline2\"");
        assert_eq!(escape_csv_field("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn format_value_by_kind() {
        assert_eq!(format_csv_value(&Value::Null, true), "");
        assert_eq!(format_csv_value(&json!("x"), false), "x");
        assert_eq!(format_csv_value(&json!("x"), true), "\"x\"");
        assert_eq!(format_csv_value(&json!(true), false), "true");
        assert_eq!(format_csv_value(&json!(3.5), false), "3.5");
        assert_eq!(format_csv_value(&json!({"a": [1]}), false), "{\"a\":[1]}");
    }

    #[test]
    fn partition_without_rubric_is_all_question_specific() {
        let names: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        let p = partition_traits(&names, None);
        assert!(p.global.is_empty());
        assert_eq!(p.question_specific, vec!["a", "b"]);
    }

    #[test]
    fn header_is_independent_of_result_order() {
        let rubric = Rubric {
            llm_traits: vec![
                LlmRubricTrait::score("clarity", "How clear?", 1, 5),
                LlmRubricTrait::boolean("accuracy", "Is it accurate?"),
            ],
            ..Default::default()
        };
        let a = result("q1", json!({"llm_trait_scores": {"clarity": 4}}));
        let b = result("q2", json!({"llm_trait_scores": {"accuracy": true, "novel": 2}}));
        let opts = ExportOptions::default().with_fields(["question_id"]);

        let forward = build_csv(&[a.clone(), b.clone()], Some(&rubric), &opts).unwrap();
        let backward = build_csv(&[b, a], Some(&rubric), &opts).unwrap();

        let header_fwd = forward.lines().next().unwrap();
        let header_bwd = backward.lines().next().unwrap();
        assert_eq!(header_fwd, header_bwd);
        assert_eq!(
            header_fwd,
            "question_id,rubric_accuracy,rubric_clarity,question_specific_rubrics"
        );
    }

    #[test]
    fn no_trait_columns_without_scores() {
        let r = result("q1", Value::Null);
        let opts = ExportOptions::default().with_fields(["question_id", "parsing_model"]);
        let csv = build_csv(&[r], None, &opts).unwrap();
        assert_eq!(csv, "question_id,parsing_model\nq1,p\n");
    }

    #[test]
    fn metric_scores_render_as_json_cells() {
        let rubric = Rubric {
            metric_traits: vec![crate::rubric::MetricRubricTrait {
                name: "coverage".to_string(),
                description: None,
                evaluation_mode: crate::rubric::MetricEvaluationMode::TpOnly,
                metrics: vec!["precision".to_string()],
                tp_instructions: vec!["mentions BRCA1".to_string()],
                tn_instructions: vec![],
                repeated_extraction: None,
                higher_is_better: true,
            }],
            ..Default::default()
        };
        let r = result(
            "q1",
            json!({"metric_trait_scores": {"coverage": {"precision": 0.5}}}),
        );
        let opts = ExportOptions::default().with_fields(["question_id"]);
        let csv = build_csv(&[r], Some(&rubric), &opts).unwrap();
        assert_eq!(
            csv,
            "question_id,rubric_coverage\nq1,\"{\"\"precision\"\":0.5}\"\n"
        );
    }

    #[test]
    fn full_registry_header_starts_with_row_index() {
        let r = result("q1", Value::Null);
        let csv = build_csv(&[r], None, &ExportOptions::default()).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("row_index,question_id,"));
        let columns = header.split(',').count();
        assert_eq!(columns, super::super::get_all_export_field_keys().len());
    }
}
