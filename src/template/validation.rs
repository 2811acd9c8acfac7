//! Required-placeholder validation.
//!
//! Errors are collected rather than returned on the first miss so a caller sees every
//! missing field in one response.

use std::fmt;

use super::Replacements;
use crate::error::PipelineError;

/// One failed check with an optional hint on how to fix it.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn missing_placeholder(placeholder: &str) -> Self {
        Self::new(placeholder, "replacement value is missing")
            .with_suggestion("populate it from the submission before rendering")
    }

    pub fn blank_value(placeholder: &str) -> Self {
        Self::new(placeholder, "replacement value must not be blank")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn message(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        format!(
            "validation failed with {} error(s): {}",
            self.errors.len(),
            parts.join("; ")
        )
    }

    pub fn into_result(self) -> Result<(), PipelineError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self.message()))
        }
    }
}

/// Check that every `required` placeholder is present and every `non_blank` one has text.
pub fn ensure_required_placeholders(
    replacements: &Replacements,
    required: &[&str],
    non_blank: &[&str],
) -> Result<(), PipelineError> {
    let mut errors = ValidationErrors::new();

    for placeholder in required {
        if !replacements.contains_key(*placeholder) {
            errors.add(ValidationError::missing_placeholder(placeholder));
        }
    }

    for placeholder in non_blank {
        if let Some(value) = replacements.get(*placeholder) {
            if value.trim().is_empty() {
                errors.add(ValidationError::blank_value(placeholder));
            }
        }
    }

    errors.into_result()
}
