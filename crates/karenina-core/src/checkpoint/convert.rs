//! Bidirectional conversion between [`UnifiedCheckpoint`] and
//! [`JsonLdCheckpoint`].
//!
//! # Invariants
//!
//! `jsonld_to_v2(&v2_to_jsonld(&x)?)? == x` for every trait kind, provided
//! empty rubrics are represented as `None`. Malformed ratings are rejected
//! with every violation listed; a trait is never partially populated.

use serde_json::{Map, Number, Value};
use uuid::Uuid;

use super::error::CheckpointConversionError;
use super::jsonld::{
    feed_item, person, question, JsonLdCheckpoint, PropertyValue, Rating, RatingType,
    SoftwareSourceCode, TraitFamily, DATA_FEED_TYPE,
};
use super::v2::{generate_question_id, Author, CheckpointItem, DatasetMetadata, UnifiedCheckpoint};
use crate::obs;
use crate::result::json_type_name;
use crate::rubric::{
    CallableTrait, LlmRubricTrait, MetricEvaluationMode, MetricRubricTrait, RegexTrait, Rubric,
    TraitKind,
};

const ANSWER_TEMPLATE_NAME: &str = "Answer Template";

// ---------------------------------------------------------------------------
// Property access
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    fn take<T>(&mut self, r: Result<T, String>) -> Option<T> {
        match r {
            Ok(v) => Some(v),
            Err(e) => {
                self.0.push(e);
                None
            }
        }
    }

    fn finish(self, location: &str) -> Result<(), CheckpointConversionError> {
        CheckpointConversionError::check(self.0).map_err(|e| e.at(location))
    }
}

fn type_error(name: &str, expected: &str, found: &Value) -> String {
    format!(
        "property `{name}` must be {expected}, found {}",
        json_type_name(found)
    )
}

fn optional_bool(value: Option<&Value>, name: &str) -> Result<Option<bool>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(type_error(name, "a boolean", other)),
    }
}

fn optional_str(value: Option<&Value>, name: &str) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(name, "a string", other)),
    }
}

fn optional_u32(value: Option<&Value>, name: &str) -> Result<Option<u32>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| type_error(name, "a non-negative integer", v)),
    }
}

fn optional_i64(value: Option<&Value>, name: &str) -> Result<Option<i64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| type_error(name, "an integer", v)),
    }
}

fn optional_f64(value: Option<&Value>, name: &str) -> Result<Option<f64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| type_error(name, "a number", v)),
    }
}

fn optional_str_list(value: Option<&Value>, name: &str) -> Result<Option<Vec<String>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_error(name, "an array of strings", item))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(type_error(name, "an array of strings", other)),
    }
}

fn required<T>(r: Result<Option<T>, String>, name: &str) -> Result<T, String> {
    r?.ok_or_else(|| format!("missing required property `{name}`"))
}

fn bound(number: Option<&Number>, name: &str) -> Result<Option<i64>, String> {
    let Some(n) = number else {
        return Ok(None);
    };
    if let Some(i) = n.as_i64() {
        return Ok(Some(i));
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
        _ => Err(format!("`{name}` must be an integer, found {n}")),
    }
}

fn check_score_bounds(min: Option<i64>, max: Option<i64>) -> Result<(i64, i64), String> {
    match (min, max) {
        (Some(min), Some(max)) if min < max => Ok((min, max)),
        (Some(min), Some(max)) => Err(format!(
            "min_score ({min}) must be less than max_score ({max})"
        )),
        _ => Err("scored trait requires both min_score and max_score".to_string()),
    }
}

fn rating_location(name: &str) -> String {
    format!("rating \"{name}\"")
}

fn trait_location(name: &str) -> String {
    format!("trait \"{name}\"")
}

// ---------------------------------------------------------------------------
// v2 → JSON-LD
// ---------------------------------------------------------------------------

/// Boolean ratings always span 0..1; score bounds set on a boolean trait
/// travel as `min_score`/`max_score` properties.
fn with_boolean_bounds(rating: Rating, min: Option<i64>, max: Option<i64>) -> Rating {
    let mut rating = rating.with_bounds(0, 1);
    if let Some(min) = min {
        rating = rating.with_property("min_score", min);
    }
    if let Some(max) = max {
        rating = rating.with_property("max_score", max);
    }
    rating
}

/// Convert an LLM-judged trait into a `Rating`.
pub fn convert_llm_trait_to_rating(
    t: &LlmRubricTrait,
    global: bool,
) -> Result<Rating, CheckpointConversionError> {
    let rating_type = RatingType::new(TraitFamily::Llm, global);
    let mut rating = Rating::new(&t.name, t.description.as_deref(), rating_type);

    rating = match t.kind {
        TraitKind::Boolean => with_boolean_bounds(rating, t.min_score, t.max_score),
        TraitKind::Score => {
            let (min, max) = check_score_bounds(t.min_score, t.max_score)
                .map_err(|e| CheckpointConversionError::single(e).at(&trait_location(&t.name)))?;
            rating.with_bounds(min, max)
        }
    };

    rating = rating
        .with_property("kind", t.kind.as_str())
        .with_property("higher_is_better", t.higher_is_better);

    let flags = [
        ("deep_judgment_enabled", t.deep_judgment_enabled.map(Value::from)),
        (
            "deep_judgment_excerpt_enabled",
            t.deep_judgment_excerpt_enabled.map(Value::from),
        ),
        (
            "deep_judgment_max_excerpts",
            t.deep_judgment_max_excerpts.map(Value::from),
        ),
        (
            "deep_judgment_fuzzy_match_threshold",
            t.deep_judgment_fuzzy_match_threshold.map(Value::from),
        ),
        (
            "deep_judgment_excerpt_retry_attempts",
            t.deep_judgment_excerpt_retry_attempts.map(Value::from),
        ),
        (
            "deep_judgment_search_enabled",
            t.deep_judgment_search_enabled.map(Value::from),
        ),
    ];
    for (name, value) in flags {
        if let Some(value) = value {
            rating = rating.with_property(name, value);
        }
    }
    Ok(rating)
}

/// Convert a regex trait into a `Rating`.
pub fn convert_regex_trait_to_rating(
    t: &RegexTrait,
    global: bool,
) -> Result<Rating, CheckpointConversionError> {
    if t.pattern.is_empty() {
        return Err(
            CheckpointConversionError::single("pattern must not be empty")
                .at(&trait_location(&t.name)),
        );
    }
    let rating_type = RatingType::new(TraitFamily::Regex, global);
    Ok(Rating::new(&t.name, t.description.as_deref(), rating_type)
        .with_bounds(0, 1)
        .with_property("pattern", t.pattern.as_str())
        .with_property("case_sensitive", t.case_sensitive)
        .with_property("invert_result", t.invert_result)
        .with_property("higher_is_better", t.higher_is_better))
}

/// Convert a callable trait into a `Rating`.
pub fn convert_callable_trait_to_rating(
    t: &CallableTrait,
    global: bool,
) -> Result<Rating, CheckpointConversionError> {
    let location = trait_location(&t.name);
    if t.callable_code.is_empty() {
        return Err(CheckpointConversionError::single("callable_code must not be empty").at(&location));
    }
    let rating_type = RatingType::new(TraitFamily::Callable, global);
    let rating = Rating::new(&t.name, t.description.as_deref(), rating_type);
    let rating = match t.kind {
        TraitKind::Boolean => with_boolean_bounds(rating, t.min_score, t.max_score),
        TraitKind::Score => {
            let (min, max) = check_score_bounds(t.min_score, t.max_score)
                .map_err(|e| CheckpointConversionError::single(e).at(&location))?;
            rating.with_bounds(min, max)
        }
    };
    Ok(rating
        .with_property("kind", t.kind.as_str())
        .with_property("callable_code", t.callable_code.as_str())
        .with_property("invert_result", t.invert_result)
        .with_property("higher_is_better", t.higher_is_better))
}

/// Convert a metric trait into a `Rating`.
pub fn convert_metric_trait_to_rating(
    t: &MetricRubricTrait,
    global: bool,
) -> Result<Rating, CheckpointConversionError> {
    let mut v = Violations::default();
    if t.metrics.is_empty() {
        v.push("metrics must not be empty");
    }
    if t.tp_instructions.is_empty() {
        v.push("tp_instructions must not be empty");
    }
    v.finish(&trait_location(&t.name))?;

    let rating_type = RatingType::new(TraitFamily::Metric, global);
    let mut rating = Rating::new(&t.name, t.description.as_deref(), rating_type)
        .with_bounds(0, 1)
        .with_property("evaluation_mode", t.evaluation_mode.as_str())
        .with_property("metrics", t.metrics.clone())
        .with_property("tp_instructions", t.tp_instructions.clone());
    if !t.tn_instructions.is_empty() {
        rating = rating.with_property("tn_instructions", t.tn_instructions.clone());
    }
    if let Some(repeated) = t.repeated_extraction {
        rating = rating.with_property("repeated_extraction", repeated);
    }
    Ok(rating.with_property("higher_is_better", t.higher_is_better))
}

fn rubric_to_ratings(rubric: &Rubric, global: bool) -> Result<Vec<Rating>, CheckpointConversionError> {
    let converted = rubric
        .llm_traits
        .iter()
        .map(|t| convert_llm_trait_to_rating(t, global))
        .chain(
            rubric
                .regex_traits
                .iter()
                .map(|t| convert_regex_trait_to_rating(t, global)),
        )
        .chain(
            rubric
                .callable_traits
                .iter()
                .map(|t| convert_callable_trait_to_rating(t, global)),
        )
        .chain(
            rubric
                .metric_traits
                .iter()
                .map(|t| convert_metric_trait_to_rating(t, global)),
        );

    let mut ratings = Vec::new();
    let mut violations = Vec::new();
    for r in converted {
        match r {
            Ok(rating) => ratings.push(rating),
            Err(e) => violations.extend(e.violations),
        }
    }
    CheckpointConversionError::check(violations)?;
    Ok(ratings)
}

fn convert_item_to_feed_item(
    id: &str,
    item: &CheckpointItem,
) -> Result<super::jsonld::DataFeedItem, CheckpointConversionError> {
    let template = SoftwareSourceCode::python(ANSWER_TEMPLATE_NAME, &item.answer_template);
    let mut q = question(id, &item.question, &item.raw_answer, template);

    q.author = item
        .author
        .as_ref()
        .map(|a| person(&a.name, a.url.as_deref(), a.email.as_deref()));
    q.keywords = item.keywords.clone();
    if let Some(rubric) = &item.question_rubric {
        q.rating = rubric_to_ratings(rubric, false)?;
    }

    q.additional_property = vec![
        PropertyValue::new("finished", item.finished),
        PropertyValue::new("original_answer_template", item.original_answer_template.as_str()),
    ];
    if let Some(custom) = &item.custom_metadata {
        q.additional_property
            .push(PropertyValue::new("custom_metadata", Value::Object(custom.clone())));
    }
    if let Some(examples) = &item.few_shot_examples {
        q.additional_property
            .push(PropertyValue::new("few_shot_examples", Value::Array(examples.clone())));
    }

    let mut feed_item = feed_item(None, q);
    feed_item.date_created = item.date_created.clone();
    feed_item.date_modified = Some(item.last_modified.clone());
    Ok(feed_item)
}

/// Convert the native checkpoint into the JSON-LD interchange document.
pub fn v2_to_jsonld(cp: &UnifiedCheckpoint) -> Result<JsonLdCheckpoint, CheckpointConversionError> {
    let mut doc = JsonLdCheckpoint::empty();
    doc.id = Some(format!("urn:uuid:{}", Uuid::new_v4()));
    if let Some(meta) = &cp.dataset_metadata {
        doc.name = meta.name.clone();
        doc.description = meta.description.clone();
        doc.version = meta.version.clone();
        doc.creator = meta.creator.clone();
        doc.date_created = meta.date_created.clone();
        doc.date_modified = meta.date_modified.clone();
    }

    let mut violations = Vec::new();
    if let Some(rubric) = &cp.global_rubric {
        match rubric_to_ratings(rubric, true) {
            Ok(ratings) => doc.rating = ratings,
            Err(e) => violations.extend(e.at("global rubric").violations),
        }
    }

    for (id, item) in &cp.checkpoint {
        match convert_item_to_feed_item(id, item) {
            Ok(feed_item) => doc.data_feed_element.push(feed_item),
            Err(e) => violations.extend(e.at(&format!("question {id}")).violations),
        }
    }
    CheckpointConversionError::check(violations)?;

    obs::emit_checkpoint_converted("v2_to_jsonld", doc.data_feed_element.len(), doc.rating.len());
    Ok(doc)
}

// ---------------------------------------------------------------------------
// JSON-LD → v2
// ---------------------------------------------------------------------------

fn bounds_of(rating: &Rating, v: &mut Violations) -> (Option<i64>, Option<i64>) {
    let worst = v
        .take(bound(rating.worst_rating.as_ref(), "worstRating"))
        .flatten();
    let best = v
        .take(bound(rating.best_rating.as_ref(), "bestRating"))
        .flatten();
    (worst, best)
}

fn kind_of(rating: &Rating, v: &mut Violations) -> Option<TraitKind> {
    let raw = v.take(optional_str(rating.property("kind"), "kind")).flatten()?;
    let kind = TraitKind::parse(&raw);
    if kind.is_none() {
        v.push(format!("property `kind` must be \"boolean\" or \"score\", found \"{raw}\""));
    }
    kind
}

fn score_bounds(
    rating: &Rating,
    kind: Option<TraitKind>,
    worst: Option<i64>,
    best: Option<i64>,
    v: &mut Violations,
) -> (Option<i64>, Option<i64>) {
    match kind {
        Some(TraitKind::Score) => match check_score_bounds(worst, best) {
            Ok((min, max)) => (Some(min), Some(max)),
            Err(e) => {
                v.push(e.replace("min_score", "worstRating").replace("max_score", "bestRating"));
                (None, None)
            }
        },
        Some(TraitKind::Boolean) => {
            let min = v
                .take(optional_i64(rating.property("min_score"), "min_score"))
                .flatten();
            let max = v
                .take(optional_i64(rating.property("max_score"), "max_score"))
                .flatten();
            (min, max)
        }
        None => (None, None),
    }
}

fn higher_is_better(rating: &Rating, v: &mut Violations) -> bool {
    v.take(optional_bool(rating.property("higher_is_better"), "higher_is_better"))
        .flatten()
        .unwrap_or(true)
}

/// Extract an LLM-judged trait from a `Rating`.
///
/// `kind` is read from the `kind` property; ratings that predate it are
/// treated as boolean when their bounds are exactly 0..1 and as scored
/// otherwise.
pub fn convert_rating_to_llm_trait(rating: &Rating) -> Result<LlmRubricTrait, CheckpointConversionError> {
    let mut v = Violations::default();
    let (worst, best) = bounds_of(rating, &mut v);
    let kind = if rating.property("kind").is_some() {
        kind_of(rating, &mut v)
    } else if matches!((worst, best), (Some(0), Some(1)) | (None, None)) {
        Some(TraitKind::Boolean)
    } else {
        Some(TraitKind::Score)
    };
    let (min_score, max_score) = score_bounds(rating, kind, worst, best, &mut v);

    let p = |name: &str| rating.property(name);
    let higher_is_better = higher_is_better(rating, &mut v);
    let deep_judgment_enabled = v
        .take(optional_bool(p("deep_judgment_enabled"), "deep_judgment_enabled"))
        .flatten();
    let deep_judgment_excerpt_enabled = v
        .take(optional_bool(
            p("deep_judgment_excerpt_enabled"),
            "deep_judgment_excerpt_enabled",
        ))
        .flatten();
    let deep_judgment_max_excerpts = v
        .take(optional_u32(
            p("deep_judgment_max_excerpts"),
            "deep_judgment_max_excerpts",
        ))
        .flatten();
    let deep_judgment_fuzzy_match_threshold = v
        .take(optional_f64(
            p("deep_judgment_fuzzy_match_threshold"),
            "deep_judgment_fuzzy_match_threshold",
        ))
        .flatten();
    let deep_judgment_excerpt_retry_attempts = v
        .take(optional_u32(
            p("deep_judgment_excerpt_retry_attempts"),
            "deep_judgment_excerpt_retry_attempts",
        ))
        .flatten();
    let deep_judgment_search_enabled = v
        .take(optional_bool(
            p("deep_judgment_search_enabled"),
            "deep_judgment_search_enabled",
        ))
        .flatten();

    v.finish(&rating_location(&rating.name))?;
    Ok(LlmRubricTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        kind: kind.unwrap_or(TraitKind::Boolean),
        min_score,
        max_score,
        higher_is_better,
        deep_judgment_enabled,
        deep_judgment_excerpt_enabled,
        deep_judgment_max_excerpts,
        deep_judgment_fuzzy_match_threshold,
        deep_judgment_excerpt_retry_attempts,
        deep_judgment_search_enabled,
    })
}

/// Extract a regex trait from a `Rating`; `pattern` is required.
pub fn convert_rating_to_regex_trait(rating: &Rating) -> Result<RegexTrait, CheckpointConversionError> {
    let mut v = Violations::default();
    let pattern = v.take(required(optional_str(rating.property("pattern"), "pattern"), "pattern"));
    if pattern.as_deref() == Some("") {
        v.push("property `pattern` must not be empty");
    }
    let case_sensitive = v
        .take(optional_bool(rating.property("case_sensitive"), "case_sensitive"))
        .flatten()
        .unwrap_or(true);
    let invert_result = v
        .take(optional_bool(rating.property("invert_result"), "invert_result"))
        .flatten()
        .unwrap_or(false);
    let higher_is_better = higher_is_better(rating, &mut v);

    v.finish(&rating_location(&rating.name))?;
    Ok(RegexTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        pattern: pattern.unwrap_or_default(),
        case_sensitive,
        invert_result,
        higher_is_better,
    })
}

/// Extract a callable trait from a `Rating`; `callable_code` and `kind` are required.
pub fn convert_rating_to_callable_trait(
    rating: &Rating,
) -> Result<CallableTrait, CheckpointConversionError> {
    let mut v = Violations::default();
    let callable_code = v.take(required(
        optional_str(rating.property("callable_code"), "callable_code"),
        "callable_code",
    ));
    let kind = if rating.property("kind").is_some() {
        kind_of(rating, &mut v)
    } else {
        v.push("missing required property `kind`");
        None
    };
    let (worst, best) = bounds_of(rating, &mut v);
    let (min_score, max_score) = score_bounds(rating, kind, worst, best, &mut v);
    let invert_result = v
        .take(optional_bool(rating.property("invert_result"), "invert_result"))
        .flatten()
        .unwrap_or(false);
    let higher_is_better = higher_is_better(rating, &mut v);

    v.finish(&rating_location(&rating.name))?;
    Ok(CallableTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        kind: kind.unwrap_or(TraitKind::Boolean),
        callable_code: callable_code.unwrap_or_default(),
        min_score,
        max_score,
        invert_result,
        higher_is_better,
    })
}

/// Extract a metric trait from a `Rating`.
///
/// Requires `evaluation_mode` and non-empty `metrics` and `tp_instructions`.
pub fn convert_rating_to_metric_trait(
    rating: &Rating,
) -> Result<MetricRubricTrait, CheckpointConversionError> {
    let mut v = Violations::default();
    let mode = v
        .take(required(
            optional_str(rating.property("evaluation_mode"), "evaluation_mode"),
            "evaluation_mode",
        ))
        .and_then(|raw| {
            let mode = MetricEvaluationMode::parse(&raw);
            if mode.is_none() {
                v.push(format!(
                    "property `evaluation_mode` must be \"tp_only\" or \"full_matrix\", found \"{raw}\""
                ));
            }
            mode
        });

    let mut non_empty_list = |name: &str| {
        let list = v.take(required(optional_str_list(rating.property(name), name), name));
        if list.as_ref().is_some_and(Vec::is_empty) {
            v.push(format!("property `{name}` must not be empty"));
        }
        list.unwrap_or_default()
    };
    let metrics = non_empty_list("metrics");
    let tp_instructions = non_empty_list("tp_instructions");

    let tn_instructions = v
        .take(optional_str_list(rating.property("tn_instructions"), "tn_instructions"))
        .flatten()
        .unwrap_or_default();
    let repeated_extraction = v
        .take(optional_bool(
            rating.property("repeated_extraction"),
            "repeated_extraction",
        ))
        .flatten();
    let higher_is_better = higher_is_better(rating, &mut v);

    v.finish(&rating_location(&rating.name))?;
    Ok(MetricRubricTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        evaluation_mode: mode.unwrap_or(MetricEvaluationMode::TpOnly),
        metrics,
        tp_instructions,
        tn_instructions,
        repeated_extraction,
        higher_is_better,
    })
}

fn add_rating(
    rubric: &mut Rubric,
    rating: &Rating,
    family: TraitFamily,
) -> Result<(), CheckpointConversionError> {
    match family {
        TraitFamily::Llm => rubric.llm_traits.push(convert_rating_to_llm_trait(rating)?),
        TraitFamily::Regex => rubric.regex_traits.push(convert_rating_to_regex_trait(rating)?),
        TraitFamily::Callable => rubric
            .callable_traits
            .push(convert_rating_to_callable_trait(rating)?),
        TraitFamily::Metric => rubric
            .metric_traits
            .push(convert_rating_to_metric_trait(rating)?),
    }
    Ok(())
}

fn non_empty(rubric: Rubric) -> Option<Rubric> {
    (!rubric.is_empty()).then_some(rubric)
}

fn property_object(
    value: Option<&Value>,
    name: &str,
) -> Result<Option<Map<String, Value>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj.clone())),
        Some(other) => Err(type_error(name, "an object", other)),
    }
}

fn property_array(value: Option<&Value>, name: &str) -> Result<Option<Vec<Value>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.clone())),
        Some(other) => Err(type_error(name, "an array", other)),
    }
}

/// Convert a JSON-LD interchange document into the native checkpoint.
///
/// Ratings are routed by their `additionalType` scope. Global ratings found
/// on a question (older exports) join the global rubric once per name.
pub fn jsonld_to_v2(doc: &JsonLdCheckpoint) -> Result<UnifiedCheckpoint, CheckpointConversionError> {
    let mut violations = Vec::new();
    if doc.type_ != DATA_FEED_TYPE {
        violations.push(format!(
            "root @type must be \"{DATA_FEED_TYPE}\", found \"{}\"",
            doc.type_
        ));
    }

    let mut global = Rubric::default();
    for rating in &doc.rating {
        match rating.rating_type() {
            Some(t) if t.is_global() => {
                if let Err(e) = add_rating(&mut global, rating, t.family()) {
                    violations.extend(e.violations);
                }
            }
            Some(t) => violations.push(format!(
                "rating \"{}\": {t} is not allowed at feed level",
                rating.name
            )),
            None => violations.push(format!(
                "rating \"{}\": invalid additionalType \"{}\"",
                rating.name, rating.additional_type
            )),
        }
    }

    let mut cp = UnifiedCheckpoint::default();
    for (idx, feed_item) in doc.data_feed_element.iter().enumerate() {
        let q = &feed_item.item;
        let id = q
            .id
            .clone()
            .or_else(|| feed_item.id.clone())
            .unwrap_or_else(|| generate_question_id(&q.text));
        let location = format!("dataFeedElement[{idx}] ({id})");
        let mut v = Violations::default();

        let mut question_rubric = Rubric::default();
        for rating in &q.rating {
            match rating.rating_type() {
                Some(t) if t.is_global() => {
                    if global.contains_trait(&rating.name) {
                        continue;
                    }
                    if let Err(e) = add_rating(&mut global, rating, t.family()) {
                        v.0.extend(e.violations);
                    }
                }
                Some(t) => {
                    if let Err(e) = add_rating(&mut question_rubric, rating, t.family()) {
                        v.0.extend(e.violations);
                    }
                }
                None => v.push(format!(
                    "rating \"{}\": invalid additionalType \"{}\"",
                    rating.name, rating.additional_type
                )),
            }
        }

        let finished = v
            .take(optional_bool(q.property("finished"), "finished"))
            .flatten()
            .unwrap_or(false);
        let original_answer_template = v
            .take(optional_str(
                q.property("original_answer_template"),
                "original_answer_template",
            ))
            .flatten()
            .unwrap_or_else(|| q.has_part.text.clone());
        let custom_metadata = v
            .take(property_object(q.property("custom_metadata"), "custom_metadata"))
            .flatten();
        let few_shot_examples = v
            .take(property_array(q.property("few_shot_examples"), "few_shot_examples"))
            .flatten();

        if cp.checkpoint.contains_key(&id) {
            v.push("duplicate question id");
        }
        if let Err(e) = v.finish(&location) {
            violations.extend(e.violations);
            continue;
        }

        cp.checkpoint.insert(
            id,
            CheckpointItem {
                question: q.text.clone(),
                raw_answer: q.accepted_answer.text.clone(),
                original_answer_template,
                answer_template: q.has_part.text.clone(),
                last_modified: feed_item
                    .date_modified
                    .clone()
                    .or_else(|| doc.date_modified.clone())
                    .unwrap_or_default(),
                finished,
                question_rubric: non_empty(question_rubric),
                date_created: feed_item.date_created.clone(),
                author: q.author.as_ref().map(|p| Author {
                    name: p.name.clone(),
                    url: p.url.clone(),
                    email: p.email.clone(),
                }),
                keywords: q.keywords.clone(),
                custom_metadata,
                few_shot_examples,
            },
        );
    }
    CheckpointConversionError::check(violations)?;

    let metadata = DatasetMetadata {
        name: doc.name.clone(),
        description: doc.description.clone(),
        version: doc.version.clone(),
        creator: doc.creator.clone(),
        date_created: doc.date_created.clone(),
        date_modified: doc.date_modified.clone(),
    };
    cp.dataset_metadata = (!metadata.is_empty()).then_some(metadata);
    cp.global_rubric = non_empty(global);

    obs::emit_checkpoint_converted(
        "jsonld_to_v2",
        cp.checkpoint.len(),
        cp.global_rubric.as_ref().map_or(0, |r| r.trait_names().len()),
    );
    Ok(cp)
}
