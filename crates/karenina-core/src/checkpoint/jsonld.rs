//! Schema.org JSON-LD interchange shape.
//!
//! Nesting: `DataFeed` → `DataFeedItem` → `Question` → `Rating`. Each rubric
//! trait becomes one `Rating` whose `additionalType` encodes scope and trait
//! kind and whose `additionalProperty` list carries trait parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub const SCHEMA_ORG_VOCAB: &str = "http://schema.org/";
pub const DATA_FEED_TYPE: &str = "DataFeed";
pub const DATA_FEED_ITEM_TYPE: &str = "DataFeedItem";
pub const QUESTION_TYPE: &str = "Question";
pub const ANSWER_TYPE: &str = "Answer";
pub const SOURCE_CODE_TYPE: &str = "SoftwareSourceCode";
pub const RATING_TYPE: &str = "Rating";
pub const PROPERTY_VALUE_TYPE: &str = "PropertyValue";
pub const PERSON_TYPE: &str = "Person";

fn default_context() -> Value {
    serde_json::json!({ "@vocab": SCHEMA_ORG_VOCAB })
}

/// Trait family encoded in a rating's `additionalType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitFamily {
    Llm,
    Regex,
    Callable,
    Metric,
}

/// Valid `Rating.additionalType` values: scope × trait family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RatingType {
    GlobalRubricTrait,
    QuestionSpecificRubricTrait,
    GlobalRegexTrait,
    QuestionSpecificRegexTrait,
    GlobalCallableTrait,
    QuestionSpecificCallableTrait,
    GlobalMetricRubricTrait,
    QuestionSpecificMetricRubricTrait,
}

impl RatingType {
    pub const ALL: [RatingType; 8] = [
        Self::GlobalRubricTrait,
        Self::QuestionSpecificRubricTrait,
        Self::GlobalRegexTrait,
        Self::QuestionSpecificRegexTrait,
        Self::GlobalCallableTrait,
        Self::QuestionSpecificCallableTrait,
        Self::GlobalMetricRubricTrait,
        Self::QuestionSpecificMetricRubricTrait,
    ];

    pub fn new(family: TraitFamily, global: bool) -> Self {
        match (family, global) {
            (TraitFamily::Llm, true) => Self::GlobalRubricTrait,
            (TraitFamily::Llm, false) => Self::QuestionSpecificRubricTrait,
            (TraitFamily::Regex, true) => Self::GlobalRegexTrait,
            (TraitFamily::Regex, false) => Self::QuestionSpecificRegexTrait,
            (TraitFamily::Callable, true) => Self::GlobalCallableTrait,
            (TraitFamily::Callable, false) => Self::QuestionSpecificCallableTrait,
            (TraitFamily::Metric, true) => Self::GlobalMetricRubricTrait,
            (TraitFamily::Metric, false) => Self::QuestionSpecificMetricRubricTrait,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlobalRubricTrait => "GlobalRubricTrait",
            Self::QuestionSpecificRubricTrait => "QuestionSpecificRubricTrait",
            Self::GlobalRegexTrait => "GlobalRegexTrait",
            Self::QuestionSpecificRegexTrait => "QuestionSpecificRegexTrait",
            Self::GlobalCallableTrait => "GlobalCallableTrait",
            Self::QuestionSpecificCallableTrait => "QuestionSpecificCallableTrait",
            Self::GlobalMetricRubricTrait => "GlobalMetricRubricTrait",
            Self::QuestionSpecificMetricRubricTrait => "QuestionSpecificMetricRubricTrait",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::GlobalRubricTrait
                | Self::GlobalRegexTrait
                | Self::GlobalCallableTrait
                | Self::GlobalMetricRubricTrait
        )
    }

    pub fn family(&self) -> TraitFamily {
        match self {
            Self::GlobalRubricTrait | Self::QuestionSpecificRubricTrait => TraitFamily::Llm,
            Self::GlobalRegexTrait | Self::QuestionSpecificRegexTrait => TraitFamily::Regex,
            Self::GlobalCallableTrait | Self::QuestionSpecificCallableTrait => {
                TraitFamily::Callable
            }
            Self::GlobalMetricRubricTrait | Self::QuestionSpecificMetricRubricTrait => {
                TraitFamily::Metric
            }
        }
    }
}

impl std::fmt::Display for RatingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named trait parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyValue {
    #[serde(rename = "@type", default = "property_value_type")]
    pub type_: String,
    pub name: String,
    pub value: Value,
}

fn property_value_type() -> String {
    PROPERTY_VALUE_TYPE.to_string()
}

impl PropertyValue {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            type_: property_value_type(),
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// One rubric trait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_rating: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_rating: Option<Number>,
    pub additional_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_property: Vec<PropertyValue>,
}

impl Rating {
    pub fn new(name: &str, description: Option<&str>, rating_type: RatingType) -> Self {
        Self {
            type_: RATING_TYPE.to_string(),
            id: None,
            name: name.to_string(),
            description: description.map(str::to_string),
            best_rating: None,
            worst_rating: None,
            additional_type: rating_type.as_str().to_string(),
            additional_property: Vec::new(),
        }
    }

    pub fn with_bounds(mut self, worst: i64, best: i64) -> Self {
        self.worst_rating = Some(Number::from(worst));
        self.best_rating = Some(Number::from(best));
        self
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.additional_property.push(PropertyValue::new(name, value));
        self
    }

    pub fn rating_type(&self) -> Option<RatingType> {
        RatingType::parse(&self.additional_type)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.additional_property
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    #[serde(rename = "@type")]
    pub type_: String,
    pub text: String,
}

impl Answer {
    pub fn new(text: &str) -> Self {
        Self {
            type_: ANSWER_TYPE.to_string(),
            text: text.to_string(),
        }
    }
}

/// The answer template source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareSourceCode {
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub programming_language: Option<String>,
}

impl SoftwareSourceCode {
    pub fn python(name: &str, text: &str) -> Self {
        Self {
            type_: SOURCE_CODE_TYPE.to_string(),
            name: Some(name.to_string()),
            text: text.to_string(),
            programming_language: Some("Python".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    #[serde(rename = "@type")]
    pub type_: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    pub accepted_answer: Answer,
    pub has_part: SoftwareSourceCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rating: Vec<Rating>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_property: Vec<PropertyValue>,
}

impl Question {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.additional_property
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataFeedItem {
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    pub item: Question,
}

/// Root JSON-LD checkpoint document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JsonLdCheckpoint {
    #[serde(rename = "@context", default = "default_context")]
    pub context: Value,
    #[serde(rename = "@type")]
    pub type_: String,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rating: Vec<Rating>,
    pub data_feed_element: Vec<DataFeedItem>,
}

impl JsonLdCheckpoint {
    pub fn empty() -> Self {
        Self {
            context: default_context(),
            type_: DATA_FEED_TYPE.to_string(),
            id: None,
            name: None,
            description: None,
            version: None,
            creator: None,
            date_created: None,
            date_modified: None,
            rating: Vec::new(),
            data_feed_element: Vec::new(),
        }
    }
}

pub(crate) fn person(name: &str, url: Option<&str>, email: Option<&str>) -> Person {
    Person {
        type_: PERSON_TYPE.to_string(),
        name: name.to_string(),
        url: url.map(str::to_string),
        email: email.map(str::to_string),
    }
}

pub(crate) fn feed_item(id: Option<String>, question: Question) -> DataFeedItem {
    DataFeedItem {
        type_: DATA_FEED_ITEM_TYPE.to_string(),
        id,
        date_created: None,
        date_modified: None,
        item: question,
    }
}

pub(crate) fn question(id: &str, text: &str, answer: &str, template: SoftwareSourceCode) -> Question {
    Question {
        type_: QUESTION_TYPE.to_string(),
        id: Some(id.to_string()),
        text: text.to_string(),
        accepted_answer: Answer::new(answer),
        has_part: template,
        author: None,
        keywords: Vec::new(),
        rating: Vec::new(),
        additional_property: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rating_type_strings_roundtrip() {
        for t in RatingType::ALL {
            assert_eq!(RatingType::parse(t.as_str()), Some(t));
        }
        assert_eq!(RatingType::parse("GlobalLLMTrait"), None);
    }

    #[test]
    fn rating_type_scope_and_family() {
        let t = RatingType::new(TraitFamily::Metric, false);
        assert_eq!(t, RatingType::QuestionSpecificMetricRubricTrait);
        assert!(!t.is_global());
        assert_eq!(t.family(), TraitFamily::Metric);
        assert!(RatingType::GlobalCallableTrait.is_global());
    }

    #[test]
    fn rating_serializes_camel_case() {
        let rating = Rating::new("clarity", Some("How clear?"), RatingType::GlobalRubricTrait)
            .with_bounds(1, 5)
            .with_property("higher_is_better", true);
        let v = serde_json::to_value(&rating).unwrap();
        assert_eq!(v["@type"], json!("Rating"));
        assert_eq!(v["bestRating"], json!(5));
        assert_eq!(v["worstRating"], json!(1));
        assert_eq!(v["additionalType"], json!("GlobalRubricTrait"));
        assert_eq!(v["additionalProperty"][0]["@type"], json!("PropertyValue"));
        assert_eq!(rating.property("higher_is_better"), Some(&json!(true)));
    }

    #[test]
    fn feed_context_defaults_when_absent() {
        let feed: JsonLdCheckpoint = serde_json::from_value(json!({
            "@type": "DataFeed",
            "dataFeedElement": []
        }))
        .unwrap();
        assert_eq!(feed.context["@vocab"], json!(SCHEMA_ORG_VOCAB));
    }
}
