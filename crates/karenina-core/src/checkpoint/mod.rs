//! Benchmark checkpoints in the native v2 shape and the Schema.org JSON-LD
//! interchange shape, with lossless conversion between them.

pub mod convert;
pub mod error;
pub mod jsonld;
pub mod v2;
pub mod validate;

use std::path::Path;

use serde_json::Value;

pub use convert::{
    convert_callable_trait_to_rating, convert_llm_trait_to_rating,
    convert_metric_trait_to_rating, convert_rating_to_callable_trait,
    convert_rating_to_llm_trait, convert_rating_to_metric_trait, convert_rating_to_regex_trait,
    convert_regex_trait_to_rating, jsonld_to_v2, v2_to_jsonld,
};
pub use error::CheckpointConversionError;
pub use jsonld::{
    Answer, DataFeedItem, JsonLdCheckpoint, Person, PropertyValue, Question, Rating, RatingType,
    SoftwareSourceCode, TraitFamily,
};
pub use v2::{
    generate_question_id, Author, CheckpointItem, DatasetMetadata, UnifiedCheckpoint,
    UNIFIED_CHECKPOINT_VERSION,
};
pub use validate::{parse_jsonld_checkpoint, validate_jsonld_checkpoint};

use crate::error::Result;

/// On-disk checkpoint flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    Unified,
    JsonLd,
}

impl CheckpointFormat {
    /// JSON-LD documents carry `@context` or `@type`; everything else is
    /// treated as the native shape.
    pub fn detect(doc: &Value) -> Self {
        match doc.as_object() {
            Some(obj) if obj.contains_key("@context") || obj.contains_key("@type") => Self::JsonLd,
            _ => Self::Unified,
        }
    }
}

/// Load a checkpoint in either format, converting JSON-LD on the fly.
pub fn read_checkpoint_file(path: &Path) -> Result<UnifiedCheckpoint> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    match CheckpointFormat::detect(&value) {
        CheckpointFormat::JsonLd => {
            validate_jsonld_checkpoint(&value)?;
            let doc: JsonLdCheckpoint = serde_json::from_value(value)?;
            Ok(jsonld_to_v2(&doc)?)
        }
        CheckpointFormat::Unified => Ok(serde_json::from_value(value)?),
    }
}

/// Write a v2 checkpoint as pretty JSON.
pub fn write_unified_checkpoint(path: &Path, cp: &UnifiedCheckpoint) -> Result<()> {
    let json = serde_json::to_string_pretty(cp)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Convert and write a checkpoint as JSON-LD.
pub fn write_jsonld_checkpoint(path: &Path, cp: &UnifiedCheckpoint) -> Result<()> {
    let doc = v2_to_jsonld(cp)?;
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(path, json)?;
    Ok(())
}
