//! Step-1 form validation. Checks run synchronously before any request is
//! issued and report per-field, so a front end can render them inline.

use std::fmt;

use crate::draft::BasicInfoForm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Field rules mirror the dashboard's step-1 schema: title and description
/// required, at least one subject, and a positive penalty fee only while the
/// penalty switch is on. `amount` is non-negative by construction (`u64`).
pub fn validate_basic_info(form: &BasicInfoForm) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if form.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title is required"));
    }
    if form.description.trim().is_empty() {
        errors.push(FieldError::new("description", "description is required"));
    }
    if form.subject_count < 1 {
        errors.push(FieldError::new(
            "subject_count",
            "at least one subject is required",
        ));
    }
    if form.has_penalty {
        match form.penalty_fee {
            None => errors.push(FieldError::new("penalty_fee", "penalty fee is required")),
            Some(0) => errors.push(FieldError::new(
                "penalty_fee",
                "penalty fee must be greater than zero",
            )),
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}
