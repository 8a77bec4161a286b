use super::*;
use anyhow::anyhow;
use shared::domain::FileId;

struct TestGateway {
    fail_upload: Option<String>,
    fail_create_once: Mutex<Option<String>>,
    progress_steps: Vec<u8>,
    upload_calls: Mutex<u32>,
    uploaded_paths: Mutex<Vec<PathBuf>>,
    created_requests: Mutex<Vec<CreateProgramRequest>>,
    file_counter: Mutex<u32>,
}

impl TestGateway {
    fn ok() -> Self {
        Self {
            fail_upload: None,
            fail_create_once: Mutex::new(None),
            progress_steps: vec![25, 50, 100],
            upload_calls: Mutex::new(0),
            uploaded_paths: Mutex::new(Vec::new()),
            created_requests: Mutex::new(Vec::new()),
            file_counter: Mutex::new(0),
        }
    }

    fn failing_upload(message: impl Into<String>) -> Self {
        Self {
            fail_upload: Some(message.into()),
            ..Self::ok()
        }
    }

    fn failing_create_once(message: impl Into<String>) -> Self {
        Self {
            fail_create_once: Mutex::new(Some(message.into())),
            ..Self::ok()
        }
    }
}

#[async_trait]
impl ProgramGateway for TestGateway {
    async fn upload_video(
        &self,
        path: &Path,
        progress: watch::Sender<u8>,
    ) -> Result<UploadedFile> {
        *self.upload_calls.lock().await += 1;
        self.uploaded_paths.lock().await.push(path.to_path_buf());
        for step in &self.progress_steps {
            let _ = progress.send(*step);
        }
        if let Some(message) = &self.fail_upload {
            return Err(anyhow!(message.clone()));
        }
        let mut counter = self.file_counter.lock().await;
        *counter += 1;
        Ok(UploadedFile {
            id: FileId::new(format!("F{counter}")),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    async fn create_program(&self, request: &CreateProgramRequest) -> Result<ProgramPayload> {
        self.created_requests.lock().await.push(request.clone());
        if let Some(message) = self.fail_create_once.lock().await.take() {
            return Err(anyhow!(message));
        }
        Ok(sample_program("prog-1", &request.title))
    }
}

fn sample_program(id: &str, title: &str) -> ProgramPayload {
    serde_json::from_value(serde_json::json!({
        "_id": id,
        "title": title,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    }))
    .expect("program payload")
}

fn valid_form(subject_count: usize) -> BasicInfoForm {
    BasicInfoForm {
        title: "Algebra program".into(),
        description: "Two-month coached program".into(),
        amount: 250_000,
        subject_count,
        has_penalty: false,
        penalty_fee: None,
    }
}

/// Wizard already advanced to subject authoring with `subject_count` subjects.
async fn authoring_wizard(
    gateway: Arc<TestGateway>,
    subject_count: usize,
) -> Arc<ProgramWizard> {
    let wizard = ProgramWizard::new(gateway);
    wizard
        .set_basic_info(valid_form(subject_count))
        .await
        .expect("set form");
    wizard.submit_basic_info().await.expect("submit step 1");
    wizard
}

fn drain_events(rx: &mut broadcast::Receiver<WizardEvent>) -> Vec<WizardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn submitting_basic_info_materializes_sequential_subjects() {
    let wizard = ProgramWizard::new(Arc::new(TestGateway::ok()));
    let mut rx = wizard.subscribe_events();

    wizard
        .set_basic_info(valid_form(3))
        .await
        .expect("set form");
    let count = wizard.submit_basic_info().await.expect("submit");
    assert_eq!(count, 3);
    assert_eq!(wizard.step().await, WizardStep::Authoring);

    let subjects = wizard.subjects().await.expect("subjects");
    assert_eq!(subjects.len(), 3);
    for (index, subject) in subjects.iter().enumerate() {
        assert_eq!(subject.order, index as u32 + 1);
        assert!(subject.title.is_empty());
        assert!(subject.exam.is_empty());
    }

    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .any(|event| matches!(event, WizardEvent::StepAdvanced { subject_count: 3 })));
}

#[tokio::test]
async fn basic_info_submission_is_one_way() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 2).await;

    let err = wizard.submit_basic_info().await.expect_err("must fail");
    assert!(matches!(err, WizardError::BasicInfoFrozen));
    let err = wizard
        .set_basic_info(valid_form(5))
        .await
        .expect_err("must fail");
    assert!(matches!(err, WizardError::BasicInfoFrozen));
}

#[tokio::test]
async fn invalid_basic_info_keeps_the_wizard_on_step_one() {
    let wizard = ProgramWizard::new(Arc::new(TestGateway::ok()));
    wizard
        .set_basic_info(BasicInfoForm {
            title: String::new(),
            has_penalty: true,
            penalty_fee: None,
            ..valid_form(2)
        })
        .await
        .expect("set form");

    let err = wizard.submit_basic_info().await.expect_err("must fail");
    let WizardError::Invalid(errors) = err else {
        panic!("unexpected error: {err}");
    };
    assert!(errors.field("title").is_some());
    assert!(errors.field("penalty_fee").is_some());
    assert_eq!(wizard.step().await, WizardStep::BasicInfo);
}

#[tokio::test]
async fn selecting_a_file_touches_only_that_subjects_slot() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 3).await;

    wizard
        .select_video(1, "/videos/chapter-two.mp4")
        .await
        .expect("select");

    assert!(wizard.upload_slot(0).await.expect("slot 0").staged.is_none());
    let staged = wizard.upload_slot(1).await.expect("slot 1").staged;
    assert_eq!(staged.as_deref(), Some(Path::new("/videos/chapter-two.mp4")));
    assert!(wizard.upload_slot(2).await.expect("slot 2").staged.is_none());
}

#[tokio::test]
async fn upload_without_staged_file_never_reaches_the_network() {
    let gateway = Arc::new(TestGateway::ok());
    let wizard = authoring_wizard(gateway.clone(), 2).await;
    let mut rx = wizard.subscribe_events();

    let err = wizard.upload_video(0).await.expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<WizardError>(),
        Some(WizardError::NoFileSelected { subject: 0 })
    ));
    assert_eq!(*gateway.upload_calls.lock().await, 0);

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::Warning(message) if message.contains("select a file")
    )));
}

#[tokio::test]
async fn successful_upload_stores_reference_and_resets_slot() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 2).await;
    let mut rx = wizard.subscribe_events();

    wizard
        .select_video(0, "/videos/intro.mp4")
        .await
        .expect("select");
    let uploaded = wizard.upload_video(0).await.expect("upload");
    assert_eq!(uploaded.id.as_str(), "F1");
    assert_eq!(uploaded.file_name, "intro.mp4");

    let slot = wizard.upload_slot(0).await.expect("slot");
    assert!(slot.staged.is_none());
    assert_eq!(slot.progress_percent, 0);
    assert_eq!(slot.uploaded.expect("stored reference").id.as_str(), "F1");

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::UploadProgress { subject: 0, percent: 100 }
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::UploadCompleted { subject: 0, .. }
    )));
}

#[tokio::test]
async fn failed_upload_keeps_staged_file_for_retry() {
    let wizard = authoring_wizard(Arc::new(TestGateway::failing_upload("disk detached")), 2).await;
    let mut rx = wizard.subscribe_events();

    wizard
        .select_video(0, "/videos/intro.mp4")
        .await
        .expect("select");
    let err = wizard.upload_video(0).await.expect_err("must fail");
    assert!(err.to_string().contains("upload for subject 1 failed"));

    let slot = wizard.upload_slot(0).await.expect("slot");
    assert_eq!(slot.staged.as_deref(), Some(Path::new("/videos/intro.mp4")));
    assert!(slot.uploaded.is_none());
    assert_eq!(slot.progress_percent, 0);

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::UploadFailed { subject: 0, message } if message.contains("disk detached")
    )));
}

#[tokio::test]
async fn uploads_for_different_subjects_are_independent() {
    let gateway = Arc::new(TestGateway::ok());
    let wizard = authoring_wizard(gateway.clone(), 3).await;

    wizard.select_video(0, "/videos/one.mp4").await.expect("select");
    wizard.select_video(2, "/videos/three.mp4").await.expect("select");

    let (first, third) = tokio::join!(wizard.upload_video(0), wizard.upload_video(2));
    let first = first.expect("upload 0");
    let third = third.expect("upload 2");
    assert_ne!(first.id, third.id);
    assert_eq!(*gateway.upload_calls.lock().await, 2);

    assert!(wizard.upload_slot(0).await.expect("slot 0").uploaded.is_some());
    let untouched = wizard.upload_slot(1).await.expect("slot 1");
    assert!(untouched.staged.is_none());
    assert!(untouched.uploaded.is_none());
    assert!(wizard.upload_slot(2).await.expect("slot 2").uploaded.is_some());
}

#[tokio::test]
async fn penalty_fee_is_dropped_when_switch_is_off() {
    let wizard = ProgramWizard::new(Arc::new(TestGateway::ok()));
    // Fee typed while the switch was on, then the switch toggled off.
    wizard
        .set_basic_info(BasicInfoForm {
            has_penalty: false,
            penalty_fee: Some(50_000),
            ..valid_form(1)
        })
        .await
        .expect("set form");
    wizard.submit_basic_info().await.expect("submit");

    let request = wizard.assemble().await.expect("assemble");
    assert!(!request.is_have_penalty);
    assert_eq!(request.penalty_fee, None);

    let value = serde_json::to_value(&request).expect("encode");
    assert!(value.get("penalty_fee").is_none());
}

#[tokio::test]
async fn penalty_fee_ships_while_switch_is_on() {
    let wizard = ProgramWizard::new(Arc::new(TestGateway::ok()));
    wizard
        .set_basic_info(BasicInfoForm {
            has_penalty: true,
            penalty_fee: Some(50_000),
            ..valid_form(1)
        })
        .await
        .expect("set form");
    wizard.submit_basic_info().await.expect("submit");

    let request = wizard.assemble().await.expect("assemble");
    assert_eq!(request.penalty_fee, Some(50_000));
}

#[tokio::test]
async fn assembles_video_refs_and_permits_missing_uploads() {
    let gateway = Arc::new(TestGateway::ok());
    let wizard = authoring_wizard(gateway.clone(), 2).await;

    wizard.set_subject_title(0, "Limits").await.expect("title");
    wizard
        .set_subject_description(0, "Introduction to limits")
        .await
        .expect("description");
    wizard.select_video(0, "/videos/limits.mp4").await.expect("select");
    wizard.upload_video(0).await.expect("upload");
    // Subject 1 is left completely blank.

    let mut rx = wizard.subscribe_events();
    wizard.submit().await.expect("submit");

    let created = gateway.created_requests.lock().await;
    let request = created.last().expect("one request");
    assert_eq!(request.course_object.len(), 2);
    assert_eq!(
        request.course_object[0].video_file.as_ref().map(FileId::as_str),
        Some("F1")
    );
    assert_eq!(request.course_object[1].video_file, None);

    let value = serde_json::to_value(request).expect("encode");
    assert!(value["course_object"][1]["video_file"].is_null());

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::Warning(message) if message.contains("incomplete subjects: 2")
    )));
}

#[tokio::test]
async fn multiple_correct_options_are_accepted() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 1).await;

    wizard.add_question(0).await.expect("question 0");
    let question = wizard.add_question(0).await.expect("question 1");
    assert_eq!(question, 1);

    wizard
        .set_option_correct(0, 1, 2, true)
        .await
        .expect("mark option 2");
    wizard
        .set_option_correct(0, 1, 0, true)
        .await
        .expect("mark option 0");

    let request = wizard.assemble().await.expect("assemble");
    let options = &request.course_object[0].exam[1].options;
    assert!(options[0].is_correct);
    assert!(options[2].is_correct);
    assert!(!options[1].is_correct);
}

#[tokio::test]
async fn readiness_is_derived_from_title_description_and_upload() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 2).await;

    assert!(!wizard.subject_ready(0).await.expect("ready"));
    wizard.set_subject_title(0, "Limits").await.expect("title");
    wizard
        .set_subject_description(0, "Introduction")
        .await
        .expect("description");
    assert!(!wizard.subject_ready(0).await.expect("ready"));

    wizard.select_video(0, "/videos/limits.mp4").await.expect("select");
    assert!(!wizard.subject_ready(0).await.expect("ready"));
    wizard.upload_video(0).await.expect("upload");
    assert!(wizard.subject_ready(0).await.expect("ready"));

    assert_eq!(wizard.unready_subjects().await.expect("unready"), vec![1]);
}

#[tokio::test]
async fn submission_failure_preserves_state_for_retry() {
    let gateway = Arc::new(TestGateway::failing_create_once("backend unavailable"));
    let wizard = authoring_wizard(gateway.clone(), 1).await;
    let mut rx = wizard.subscribe_events();

    let err = wizard.submit().await.expect_err("must fail");
    assert!(err.to_string().contains("submission failed"));
    assert_eq!(wizard.step().await, WizardStep::Authoring);
    assert!(wizard.assemble().await.is_ok());

    let program = wizard.submit().await.expect("retry succeeds");
    assert_eq!(program.id.as_str(), "prog-1");
    assert_eq!(wizard.step().await, WizardStep::Completed);
    assert_eq!(
        wizard.created_program_id().await.map(|id| id.0),
        Some("prog-1".to_string())
    );
    assert_eq!(gateway.created_requests.lock().await.len(), 2);

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        WizardEvent::SubmissionFailed { message } if message.contains("backend unavailable")
    )));
    assert!(events
        .iter()
        .any(|event| matches!(event, WizardEvent::SubmissionCompleted { .. })));
}

#[tokio::test]
async fn completed_wizard_rejects_further_edits() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 1).await;
    wizard.submit().await.expect("submit");

    let err = wizard.submit().await.expect_err("must fail");
    assert!(matches!(
        err.downcast_ref::<WizardError>(),
        Some(WizardError::AlreadyCompleted)
    ));
    let err = wizard
        .set_subject_title(0, "late edit")
        .await
        .expect_err("must fail");
    assert!(matches!(err, WizardError::AlreadyCompleted));
}

#[tokio::test]
async fn nested_addressing_is_bounds_checked() {
    let wizard = authoring_wizard(Arc::new(TestGateway::ok()), 2).await;

    let err = wizard
        .set_subject_title(5, "ghost")
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        WizardError::SubjectIndexOutOfRange { index: 5, count: 2 }
    ));

    let err = wizard
        .set_question_title(0, 0, "ghost")
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        WizardError::QuestionIndexOutOfRange { index: 0, count: 0 }
    ));

    wizard.add_question(0).await.expect("question");
    let err = wizard
        .set_option_text(0, 0, 9, "ghost")
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        WizardError::OptionIndexOutOfRange { index: 9, count: 4 }
    ));
}
