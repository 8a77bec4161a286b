//! Course-program creation wizard engine.
//!
//! The wizard owns all transient authoring state: the step-1 basic-info form,
//! the frozen draft plus subject list once authoring starts, and one upload
//! slot per subject. Front ends call the transition methods and render the
//! [`WizardEvent`] stream; the two backend endpoints the wizard consumes are
//! reached through the injectable [`ProgramGateway`] trait.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use admin_api::AdminApi;
use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::ProgramId,
    protocol::{
        CourseObjectPayload, CreateProgramRequest, ExamOptionPayload, ExamQuestionPayload,
        ProgramPayload, UploadedFile,
    },
};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, warn};

pub mod draft;
pub mod validation;

pub use draft::{
    materialize_subjects, BasicInfoForm, CourseProgramDraft, ExamOptionDraft, ExamQuestionDraft,
    SubjectDraft, UploadSlot, NEW_QUESTION_OPTION_COUNT,
};
pub use validation::{validate_basic_info, FieldError, ValidationErrors};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("basic info is already frozen")]
    BasicInfoFrozen,
    #[error("subject authoring has not started")]
    AuthoringNotStarted,
    #[error("the wizard already completed")]
    AlreadyCompleted,
    #[error("subject index {index} is out of range ({count} subjects)")]
    SubjectIndexOutOfRange { index: usize, count: usize },
    #[error("question index {index} is out of range ({count} questions)")]
    QuestionIndexOutOfRange { index: usize, count: usize },
    #[error("option index {index} is out of range ({count} options)")]
    OptionIndexOutOfRange { index: usize, count: usize },
    #[error("no file selected for subject {subject}")]
    NoFileSelected { subject: usize },
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    BasicInfo,
    Authoring,
    Completed,
}

/// Everything a front end needs to render: progress, toasts, and terminal
/// outcomes. Mirrors the side channel the dashboard showed as toast/progress
/// UI, so consumers stay decoupled from wizard internals.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    StepAdvanced { subject_count: usize },
    UploadStarted { subject: usize, file_name: String },
    UploadProgress { subject: usize, percent: u8 },
    UploadCompleted { subject: usize, file: UploadedFile },
    UploadFailed { subject: usize, message: String },
    Warning(String),
    SubmissionCompleted { program_id: ProgramId },
    SubmissionFailed { message: String },
}

/// The two backend operations the wizard performs. Injected so tests can
/// substitute a scripted backend.
#[async_trait]
pub trait ProgramGateway: Send + Sync {
    async fn upload_video(&self, path: &Path, progress: watch::Sender<u8>)
        -> Result<UploadedFile>;
    async fn create_program(&self, request: &CreateProgramRequest) -> Result<ProgramPayload>;
}

#[async_trait]
impl ProgramGateway for AdminApi {
    async fn upload_video(
        &self,
        path: &Path,
        progress: watch::Sender<u8>,
    ) -> Result<UploadedFile> {
        self.upload_file(path, progress).await
    }

    async fn create_program(&self, request: &CreateProgramRequest) -> Result<ProgramPayload> {
        AdminApi::create_program(self, request).await
    }
}

enum WizardState {
    BasicInfo {
        form: BasicInfoForm,
    },
    Authoring {
        draft: CourseProgramDraft,
        subjects: Vec<SubjectDraft>,
        uploads: HashMap<usize, UploadSlot>,
    },
    Completed {
        program_id: ProgramId,
    },
}

pub struct ProgramWizard {
    gateway: Arc<dyn ProgramGateway>,
    state: Mutex<WizardState>,
    events: broadcast::Sender<WizardEvent>,
}

impl ProgramWizard {
    pub fn new(gateway: Arc<dyn ProgramGateway>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            state: Mutex::new(WizardState::BasicInfo {
                form: BasicInfoForm::default(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    pub async fn step(&self) -> WizardStep {
        match &*self.state.lock().await {
            WizardState::BasicInfo { .. } => WizardStep::BasicInfo,
            WizardState::Authoring { .. } => WizardStep::Authoring,
            WizardState::Completed { .. } => WizardStep::Completed,
        }
    }

    pub async fn created_program_id(&self) -> Option<ProgramId> {
        match &*self.state.lock().await {
            WizardState::Completed { program_id } => Some(program_id.clone()),
            _ => None,
        }
    }

    pub async fn basic_info(&self) -> Result<BasicInfoForm, WizardError> {
        match &*self.state.lock().await {
            WizardState::BasicInfo { form } => Ok(form.clone()),
            _ => Err(WizardError::BasicInfoFrozen),
        }
    }

    pub async fn set_basic_info(&self, form: BasicInfoForm) -> Result<(), WizardError> {
        match &mut *self.state.lock().await {
            WizardState::BasicInfo { form: current } => {
                *current = form;
                Ok(())
            }
            _ => Err(WizardError::BasicInfoFrozen),
        }
    }

    /// Validates the step-1 form, freezes it, and materializes the subject
    /// list. One-way: once authoring starts there is no path back to step 1.
    pub async fn submit_basic_info(&self) -> Result<usize, WizardError> {
        let mut guard = self.state.lock().await;
        let form = match &*guard {
            WizardState::BasicInfo { form } => form.clone(),
            _ => return Err(WizardError::BasicInfoFrozen),
        };
        validate_basic_info(&form)?;
        let subject_count = form.subject_count;
        *guard = WizardState::Authoring {
            draft: form.into(),
            subjects: materialize_subjects(subject_count),
            uploads: HashMap::new(),
        };
        drop(guard);
        info!(subject_count, "basic info frozen, subject authoring started");
        self.emit(WizardEvent::StepAdvanced { subject_count });
        Ok(subject_count)
    }

    pub async fn subjects(&self) -> Result<Vec<SubjectDraft>, WizardError> {
        match &*self.state.lock().await {
            WizardState::Authoring { subjects, .. } => Ok(subjects.clone()),
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    /// Snapshot of a subject's upload slot; a default (empty) slot if no file
    /// was ever selected for it.
    pub async fn upload_slot(&self, index: usize) -> Result<UploadSlot, WizardError> {
        match &*self.state.lock().await {
            WizardState::Authoring {
                subjects, uploads, ..
            } => {
                if index >= subjects.len() {
                    return Err(WizardError::SubjectIndexOutOfRange {
                        index,
                        count: subjects.len(),
                    });
                }
                Ok(uploads.get(&index).cloned().unwrap_or_default())
            }
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    pub async fn set_subject_title(
        &self,
        index: usize,
        title: impl Into<String>,
    ) -> Result<(), WizardError> {
        let title = title.into();
        self.with_subject(index, |subject| {
            subject.title = title;
            Ok(())
        })
        .await
    }

    pub async fn set_subject_description(
        &self,
        index: usize,
        description: impl Into<String>,
    ) -> Result<(), WizardError> {
        let description = description.into();
        self.with_subject(index, |subject| {
            subject.description = description;
            Ok(())
        })
        .await
    }

    pub async fn set_subject_order(&self, index: usize, order: u32) -> Result<(), WizardError> {
        self.with_subject(index, |subject| {
            subject.order = order;
            Ok(())
        })
        .await
    }

    /// Appends a blank multiple-choice question (four empty options) and
    /// returns its index.
    pub async fn add_question(&self, subject: usize) -> Result<usize, WizardError> {
        self.with_subject(subject, |subject| {
            subject.exam.push(ExamQuestionDraft::blank());
            Ok(subject.exam.len() - 1)
        })
        .await
    }

    pub async fn set_question_title(
        &self,
        subject: usize,
        question: usize,
        title: impl Into<String>,
    ) -> Result<(), WizardError> {
        let title = title.into();
        self.with_question(subject, question, |draft| {
            draft.question_title = title;
            Ok(())
        })
        .await
    }

    pub async fn set_question_points(
        &self,
        subject: usize,
        question: usize,
        points: f64,
    ) -> Result<(), WizardError> {
        self.with_question(subject, question, |draft| {
            draft.points = points;
            Ok(())
        })
        .await
    }

    pub async fn set_option_text(
        &self,
        subject: usize,
        question: usize,
        option: usize,
        text: impl Into<String>,
    ) -> Result<(), WizardError> {
        let text = text.into();
        self.with_option(subject, question, option, |draft| {
            draft.text = text;
            Ok(())
        })
        .await
    }

    /// No exclusivity: any number of options in a question may be flagged
    /// correct, matching what the backend accepts.
    pub async fn set_option_correct(
        &self,
        subject: usize,
        question: usize,
        option: usize,
        is_correct: bool,
    ) -> Result<(), WizardError> {
        self.with_option(subject, question, option, |draft| {
            draft.is_correct = is_correct;
            Ok(())
        })
        .await
    }

    /// Stages a file for the subject without starting a transfer. Re-selecting
    /// replaces the staged path; a previously stored upload is kept until a
    /// new transfer succeeds.
    pub async fn select_video(
        &self,
        subject: usize,
        path: impl Into<PathBuf>,
    ) -> Result<(), WizardError> {
        let path = path.into();
        let mut guard = self.state.lock().await;
        match &mut *guard {
            WizardState::Authoring {
                subjects, uploads, ..
            } => {
                if subject >= subjects.len() {
                    return Err(WizardError::SubjectIndexOutOfRange {
                        index: subject,
                        count: subjects.len(),
                    });
                }
                uploads.entry(subject).or_default().staged = Some(path);
                Ok(())
            }
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    /// Uploads the subject's staged file. Progress lands in the slot and on
    /// the event bus while the transfer is in flight. On success the stored
    /// reference replaces the staged path and progress resets to zero; on
    /// failure the staged path survives so the operator can retry.
    pub async fn upload_video(self: &Arc<Self>, subject: usize) -> Result<UploadedFile> {
        let staged = {
            let guard = self.state.lock().await;
            match &*guard {
                WizardState::Authoring {
                    subjects, uploads, ..
                } => {
                    if subject >= subjects.len() {
                        return Err(WizardError::SubjectIndexOutOfRange {
                            index: subject,
                            count: subjects.len(),
                        }
                        .into());
                    }
                    uploads.get(&subject).and_then(|slot| slot.staged.clone())
                }
                WizardState::Completed { .. } => return Err(WizardError::AlreadyCompleted.into()),
                WizardState::BasicInfo { .. } => {
                    return Err(WizardError::AuthoringNotStarted.into())
                }
            }
        };
        let Some(path) = staged else {
            self.emit(WizardEvent::Warning(format!(
                "select a file for subject {} first",
                subject + 1
            )));
            return Err(WizardError::NoFileSelected { subject }.into());
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.emit(WizardEvent::UploadStarted {
            subject,
            file_name,
        });

        let (progress_tx, mut progress_rx) = watch::channel(0u8);
        let forwarder = {
            let wizard = Arc::clone(self);
            tokio::spawn(async move {
                while progress_rx.changed().await.is_ok() {
                    let percent = *progress_rx.borrow();
                    wizard.record_progress(subject, percent).await;
                }
            })
        };

        let outcome = self.gateway.upload_video(&path, progress_tx).await;
        // The gateway drops its sender on return, which ends the forwarder;
        // wait for it so no stale percent lands after the reset below.
        let _ = forwarder.await;

        match outcome {
            Ok(file) => {
                {
                    let mut guard = self.state.lock().await;
                    if let WizardState::Authoring { uploads, .. } = &mut *guard {
                        let slot = uploads.entry(subject).or_default();
                        slot.uploaded = Some(file.clone());
                        slot.staged = None;
                        slot.progress_percent = 0;
                    }
                }
                info!(subject, file_id = %file.id, "subject video uploaded");
                self.emit(WizardEvent::UploadCompleted {
                    subject,
                    file: file.clone(),
                });
                Ok(file)
            }
            Err(error) => {
                {
                    let mut guard = self.state.lock().await;
                    if let WizardState::Authoring { uploads, .. } = &mut *guard {
                        uploads.entry(subject).or_default().progress_percent = 0;
                    }
                }
                warn!(subject, error = %error, "subject video upload failed");
                self.emit(WizardEvent::UploadFailed {
                    subject,
                    message: error.to_string(),
                });
                Err(error.context(format!("upload for subject {} failed", subject + 1)))
            }
        }
    }

    pub async fn subject_ready(&self, index: usize) -> Result<bool, WizardError> {
        match &*self.state.lock().await {
            WizardState::Authoring {
                subjects, uploads, ..
            } => {
                let subject = subjects.get(index).ok_or(WizardError::SubjectIndexOutOfRange {
                    index,
                    count: subjects.len(),
                })?;
                Ok(subject_is_ready(subject, uploads.get(&index)))
            }
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    pub async fn unready_subjects(&self) -> Result<Vec<usize>, WizardError> {
        match &*self.state.lock().await {
            WizardState::Authoring {
                subjects, uploads, ..
            } => Ok(unready_indices(subjects, uploads)),
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    /// Builds the creation payload from the frozen draft and the authored
    /// subjects, resolving each subject's video from its upload slot.
    pub async fn assemble(&self) -> Result<CreateProgramRequest, WizardError> {
        match &*self.state.lock().await {
            WizardState::Authoring {
                draft,
                subjects,
                uploads,
            } => Ok(assemble_request(draft, subjects, uploads)),
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    /// Sends the assembled program to the backend. A subject without a stored
    /// video does not block submission (only a warning is emitted); failure
    /// leaves the wizard intact for a retry, success is terminal.
    pub async fn submit(&self) -> Result<ProgramPayload> {
        let (request, unready) = {
            let guard = self.state.lock().await;
            match &*guard {
                WizardState::Authoring {
                    draft,
                    subjects,
                    uploads,
                } => (
                    assemble_request(draft, subjects, uploads),
                    unready_indices(subjects, uploads),
                ),
                WizardState::Completed { .. } => return Err(WizardError::AlreadyCompleted.into()),
                WizardState::BasicInfo { .. } => {
                    return Err(WizardError::AuthoringNotStarted.into())
                }
            }
        };
        if !unready.is_empty() {
            let listed = unready
                .iter()
                .map(|index| (index + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            self.emit(WizardEvent::Warning(format!(
                "submitting with incomplete subjects: {listed}"
            )));
        }

        match self.gateway.create_program(&request).await {
            Ok(program) => {
                *self.state.lock().await = WizardState::Completed {
                    program_id: program.id.clone(),
                };
                info!(program_id = %program.id, "course program created");
                self.emit(WizardEvent::SubmissionCompleted {
                    program_id: program.id.clone(),
                });
                Ok(program)
            }
            Err(error) => {
                warn!(error = %error, "course program submission failed");
                self.emit(WizardEvent::SubmissionFailed {
                    message: error.to_string(),
                });
                Err(error.context("course program submission failed"))
            }
        }
    }

    async fn record_progress(&self, subject: usize, percent: u8) {
        {
            let mut guard = self.state.lock().await;
            if let WizardState::Authoring { uploads, .. } = &mut *guard {
                if let Some(slot) = uploads.get_mut(&subject) {
                    slot.progress_percent = percent;
                }
            }
        }
        self.emit(WizardEvent::UploadProgress { subject, percent });
    }

    async fn with_subject<T>(
        &self,
        index: usize,
        apply: impl FnOnce(&mut SubjectDraft) -> Result<T, WizardError>,
    ) -> Result<T, WizardError> {
        let mut guard = self.state.lock().await;
        match &mut *guard {
            WizardState::Authoring { subjects, .. } => {
                let count = subjects.len();
                let subject = subjects
                    .get_mut(index)
                    .ok_or(WizardError::SubjectIndexOutOfRange { index, count })?;
                apply(subject)
            }
            WizardState::Completed { .. } => Err(WizardError::AlreadyCompleted),
            WizardState::BasicInfo { .. } => Err(WizardError::AuthoringNotStarted),
        }
    }

    async fn with_question<T>(
        &self,
        subject: usize,
        question: usize,
        apply: impl FnOnce(&mut ExamQuestionDraft) -> Result<T, WizardError>,
    ) -> Result<T, WizardError> {
        self.with_subject(subject, |draft| {
            let count = draft.exam.len();
            let entry = draft
                .exam
                .get_mut(question)
                .ok_or(WizardError::QuestionIndexOutOfRange {
                    index: question,
                    count,
                })?;
            apply(entry)
        })
        .await
    }

    async fn with_option<T>(
        &self,
        subject: usize,
        question: usize,
        option: usize,
        apply: impl FnOnce(&mut ExamOptionDraft) -> Result<T, WizardError>,
    ) -> Result<T, WizardError> {
        self.with_question(subject, question, |draft| {
            let count = draft.options.len();
            let entry = draft
                .options
                .get_mut(option)
                .ok_or(WizardError::OptionIndexOutOfRange {
                    index: option,
                    count,
                })?;
            apply(entry)
        })
        .await
    }

    fn emit(&self, event: WizardEvent) {
        let _ = self.events.send(event);
    }
}

/// Readiness is derived, never stored: title, description, and a stored video
/// reference make a subject submit-ready.
pub fn subject_is_ready(subject: &SubjectDraft, slot: Option<&UploadSlot>) -> bool {
    !subject.title.trim().is_empty()
        && !subject.description.trim().is_empty()
        && slot.is_some_and(|slot| slot.uploaded.is_some())
}

fn unready_indices(subjects: &[SubjectDraft], uploads: &HashMap<usize, UploadSlot>) -> Vec<usize> {
    subjects
        .iter()
        .enumerate()
        .filter_map(|(index, subject)| {
            (!subject_is_ready(subject, uploads.get(&index))).then_some(index)
        })
        .collect()
}

fn assemble_request(
    draft: &CourseProgramDraft,
    subjects: &[SubjectDraft],
    uploads: &HashMap<usize, UploadSlot>,
) -> CreateProgramRequest {
    let course_object = subjects
        .iter()
        .enumerate()
        .map(|(index, subject)| CourseObjectPayload {
            title: subject.title.clone(),
            description: subject.description.clone(),
            video_file: uploads
                .get(&index)
                .and_then(|slot| slot.uploaded.as_ref())
                .map(|file| file.id.clone()),
            order: subject.order,
            exam: subject
                .exam
                .iter()
                .map(|question| ExamQuestionPayload {
                    question_title: question.question_title.clone(),
                    options: question
                        .options
                        .iter()
                        .map(|option| ExamOptionPayload {
                            text: option.text.clone(),
                            is_correct: option.is_correct,
                        })
                        .collect(),
                    points: question.points,
                })
                .collect(),
        })
        .collect();

    CreateProgramRequest {
        title: draft.title.clone(),
        description: draft.description.clone(),
        amount: draft.amount,
        is_have_penalty: draft.has_penalty,
        // Toggling the penalty switch off drops a previously entered fee from
        // the payload, it does not clear the form field.
        penalty_fee: if draft.has_penalty {
            draft.penalty_fee
        } else {
            None
        },
        course_object,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
