//! TOML program draft consumed by `create-program`.
//!
//! ```toml
//! title = "Algebra, term one"
//! description = "Coached two-month program"
//! amount = 250000
//! has_penalty = true
//! penalty_fee = 50000
//!
//! [[subjects]]
//! title = "Limits"
//! description = "Introduction to limits"
//! video = "videos/limits.mp4"
//!
//! [[subjects.exam]]
//! question = "What is the limit of 1/x as x grows?"
//! points = 5
//! options = [
//!   { text = "0", correct = true },
//!   { text = "1" },
//!   { text = "infinity" },
//!   { text = "undefined" },
//! ]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use authoring::BasicInfoForm;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProgramDraftFile {
    pub title: String,
    pub description: String,
    pub amount: u64,
    #[serde(default)]
    pub has_penalty: bool,
    #[serde(default)]
    pub penalty_fee: Option<u64>,
    #[serde(default)]
    pub subjects: Vec<SubjectEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectEntry {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video: Option<PathBuf>,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub exam: Vec<QuestionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionEntry {
    pub question: String,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OptionEntry {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl ProgramDraftFile {
    /// The subject count is taken from the file, so step-1 validation rejects
    /// a draft with no subjects.
    pub fn basic_info(&self) -> BasicInfoForm {
        BasicInfoForm {
            title: self.title.clone(),
            description: self.description.clone(),
            amount: self.amount,
            subject_count: self.subjects.len(),
            has_penalty: self.has_penalty,
            penalty_fee: self.penalty_fee,
        }
    }
}

pub fn load(path: &Path) -> Result<ProgramDraftFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read draft file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid draft file '{}'", path.display()))
}
