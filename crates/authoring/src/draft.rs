//! In-memory drafts for the program creation wizard. Everything here is
//! transient UI-session state; nothing is persisted or shared outside the
//! owning [`crate::ProgramWizard`].

use std::path::PathBuf;

use shared::protocol::UploadedFile;

/// Number of blank options a freshly added exam question starts with. The
/// count is not enforced afterwards.
pub const NEW_QUESTION_OPTION_COUNT: usize = 4;

/// Step-1 form as the operator edits it. `penalty_fee` keeps whatever was
/// typed even while `has_penalty` is off; the assembler decides what ships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicInfoForm {
    pub title: String,
    pub description: String,
    pub amount: u64,
    pub subject_count: usize,
    pub has_penalty: bool,
    pub penalty_fee: Option<u64>,
}

impl Default for BasicInfoForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            amount: 0,
            subject_count: 1,
            has_penalty: false,
            penalty_fee: None,
        }
    }
}

/// Step-1 data after a valid submission. Immutable once authoring starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgramDraft {
    pub title: String,
    pub description: String,
    pub amount: u64,
    pub subject_count: usize,
    pub has_penalty: bool,
    pub penalty_fee: Option<u64>,
}

impl From<BasicInfoForm> for CourseProgramDraft {
    fn from(form: BasicInfoForm) -> Self {
        Self {
            title: form.title,
            description: form.description,
            amount: form.amount,
            subject_count: form.subject_count,
            has_penalty: form.has_penalty,
            penalty_fee: form.penalty_fee,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectDraft {
    pub title: String,
    pub description: String,
    pub order: u32,
    pub exam: Vec<ExamQuestionDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamQuestionDraft {
    pub question_title: String,
    pub options: Vec<ExamOptionDraft>,
    pub points: f64,
}

impl ExamQuestionDraft {
    pub fn blank() -> Self {
        Self {
            question_title: String::new(),
            options: vec![ExamOptionDraft::default(); NEW_QUESTION_OPTION_COUNT],
            points: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExamOptionDraft {
    pub text: String,
    pub is_correct: bool,
}

/// Per-subject upload lifecycle. One slot is the single source of truth for
/// "which file is staged, how far along is the transfer, what got stored".
#[derive(Debug, Clone, Default)]
pub struct UploadSlot {
    pub staged: Option<PathBuf>,
    pub progress_percent: u8,
    pub uploaded: Option<UploadedFile>,
}

/// Builds the subject list frozen by a step-1 submission: `count` blank
/// subjects with sequential `order` starting at 1 and empty exams.
pub fn materialize_subjects(count: usize) -> Vec<SubjectDraft> {
    (1..=count)
        .map(|order| SubjectDraft {
            order: order as u32,
            ..SubjectDraft::default()
        })
        .collect()
}
