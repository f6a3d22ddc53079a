//! Native "v2 unified" checkpoint shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::rubric::Rubric;

pub const UNIFIED_CHECKPOINT_VERSION: &str = "2.0";

fn default_version() -> String {
    UNIFIED_CHECKPOINT_VERSION.to_string()
}

/// Descriptive metadata about the benchmark as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatasetMetadata {
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
}

impl DatasetMetadata {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Question author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One benchmark question with its answer template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointItem {
    pub question: String,
    pub raw_answer: String,
    pub original_answer_template: String,
    pub answer_template: String,
    pub last_modified: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_rubric: Option<Rubric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub few_shot_examples: Option<Vec<Value>>,
}

/// Application-native benchmark definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnifiedCheckpoint {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_metadata: Option<DatasetMetadata>,
    #[serde(default)]
    pub global_rubric: Option<Rubric>,
    /// Questions keyed by question id.
    pub checkpoint: BTreeMap<String, CheckpointItem>,
}

impl Default for UnifiedCheckpoint {
    fn default() -> Self {
        Self {
            version: default_version(),
            dataset_metadata: None,
            global_rubric: None,
            checkpoint: BTreeMap::new(),
        }
    }
}

impl UnifiedCheckpoint {
    /// Insert a question under its generated id and return the id.
    pub fn add_question(&mut self, item: CheckpointItem) -> String {
        let id = generate_question_id(&item.question);
        self.checkpoint.insert(id.clone(), item);
        id
    }

    pub fn finished_count(&self) -> usize {
        self.checkpoint.values().filter(|q| q.finished).count()
    }
}

const SLUG_MAX_LEN: usize = 50;

/// Deterministic question id derived from the question text.
///
/// Format: `urn:uuid:question-<slug>-<first 8 hex chars of sha256(text)>`.
pub fn generate_question_id(question_text: &str) -> String {
    let digest = hex::encode(Sha256::digest(question_text.as_bytes()));

    let mut slug = String::new();
    for word in question_text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_ascii_lowercase();
        if slug.len() + word.len() + 1 > SLUG_MAX_LEN {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }

    if slug.is_empty() {
        format!("urn:uuid:question-{}", &digest[..8])
    } else {
        format!("urn:uuid:question-{}-{}", slug, &digest[..8])
    }
}
