//! Conversion and validation errors for checkpoint interchange.

use thiserror::Error;

fn render(violations: &[String]) -> String {
    match violations {
        [single] => single.clone(),
        many => many
            .iter()
            .map(|v| format!("- {v}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// A checkpoint could not be converted or failed validation.
///
/// Carries every violation found, rendered as one multi-line message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("checkpoint conversion failed:\n{}", render(.violations))]
pub struct CheckpointConversionError {
    pub violations: Vec<String>,
}

impl CheckpointConversionError {
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            violations: vec![message.into()],
        }
    }

    pub fn from_violations(violations: Vec<String>) -> Self {
        Self { violations }
    }

    /// `Ok(())` when no violations were collected.
    pub fn check(violations: Vec<String>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { violations })
        }
    }

    /// Prefix every violation with a location, e.g. `rating "clarity"`.
    pub fn at(mut self, location: &str) -> Self {
        for v in &mut self.violations {
            *v = format!("{location}: {v}");
        }
        self
    }
}
