use std::{path::PathBuf, sync::Arc};

use admin_api::AdminApi;
use anyhow::{bail, Context, Result};
use authoring::{ProgramWizard, WizardEvent, NEW_QUESTION_OPTION_COUNT};
use clap::{Parser, Subcommand};
use shared::{
    domain::{AccessLevel, ProgramId},
    protocol::{ProgramListQuery, ProgramPayload},
};
use tracing::{info, warn};
use url::Url;

mod config;
mod draft_file;

use draft_file::ProgramDraftFile;

#[derive(Parser, Debug)]
#[command(name = "console", about = "Admin console for the coaching platform")]
struct Cli {
    /// Settings file; defaults to ./console.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request a one-time login code for the given mobile number.
    Login { mobile: String, password: String },
    /// Exchange the one-time code for a session token and cache it.
    Verify { mobile: String, code: String },
    /// List coach course programs.
    ListPrograms {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        access_level: Option<AccessLevel>,
    },
    /// Create a coach course program from a TOML draft, uploading each
    /// subject's video along the way.
    CreateProgram {
        #[arg(long)]
        draft: PathBuf,
    },
    /// Change a program's access level.
    SetAccess {
        id: String,
        access_level: AccessLevel,
    },
    /// Delete a program.
    DeleteProgram { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let settings = config::load_settings(cli.config.as_deref())?;
    let base_url = Url::parse(&settings.server_url)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    let api = match config::read_cached_token(&settings)? {
        Some(token) => AdminApi::with_token(base_url, token),
        None => AdminApi::new(base_url),
    };

    match cli.command {
        Command::Login { mobile, password } => {
            api.request_login_otp(&mobile, &password).await?;
            println!("one-time code sent to {mobile}");
        }
        Command::Verify { mobile, code } => {
            let token = api.validate_otp(&mobile, &code).await?;
            config::write_cached_token(&settings, &token)?;
            println!("session token cached");
        }
        Command::ListPrograms {
            page,
            limit,
            access_level,
        } => {
            let listed = api
                .list_programs(&ProgramListQuery {
                    page,
                    limit,
                    access_level,
                })
                .await?;
            println!(
                "{} of {} programs (page {})",
                listed.programs.len(),
                listed.total,
                listed.page
            );
            for program in listed.programs {
                let access = program
                    .access_level
                    .map(|level| level.to_string())
                    .unwrap_or_else(|| "-".into());
                let published = if program.is_published { "" } else { " (unpublished)" };
                println!("{}  {}  [{access}]{published}", program.id, program.title);
            }
        }
        Command::CreateProgram { draft } => {
            let file = draft_file::load(&draft)?;
            let program = run_create(Arc::new(api), file).await?;
            println!("created program {}", program.id);
        }
        Command::SetAccess { id, access_level } => {
            let program = api
                .update_access_level(&ProgramId::new(id), access_level)
                .await?;
            println!("{} is now {access_level}", program.id);
        }
        Command::DeleteProgram { id } => {
            api.delete_program(&ProgramId::new(id)).await?;
            println!("program deleted");
        }
    }

    Ok(())
}

/// Drives the wizard end to end: validate and freeze basic info, author every
/// subject from the draft file, upload staged videos, submit.
async fn run_create(api: Arc<AdminApi>, file: ProgramDraftFile) -> Result<ProgramPayload> {
    let wizard = ProgramWizard::new(api);

    let mut events = wizard.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                WizardEvent::UploadStarted { subject, file_name } => {
                    info!(subject = subject + 1, file = %file_name, "uploading");
                }
                WizardEvent::UploadProgress { subject, percent } => {
                    info!(subject = subject + 1, percent, "upload progress");
                }
                WizardEvent::UploadCompleted { subject, file } => {
                    info!(subject = subject + 1, file_id = %file.id, "upload complete");
                }
                WizardEvent::UploadFailed { subject, message } => {
                    warn!(subject = subject + 1, %message, "upload failed");
                }
                WizardEvent::Warning(message) => warn!(%message, "wizard warning"),
                _ => {}
            }
        }
    });

    wizard.set_basic_info(file.basic_info()).await?;
    wizard.submit_basic_info().await?;

    for (index, subject) in file.subjects.iter().enumerate() {
        wizard.set_subject_title(index, &subject.title).await?;
        wizard
            .set_subject_description(index, &subject.description)
            .await?;
        if let Some(order) = subject.order {
            wizard.set_subject_order(index, order).await?;
        }

        for entry in &subject.exam {
            if entry.options.len() > NEW_QUESTION_OPTION_COUNT {
                bail!(
                    "subject {} question '{}' has more than {NEW_QUESTION_OPTION_COUNT} options",
                    index + 1,
                    entry.question
                );
            }
            let question = wizard.add_question(index).await?;
            wizard
                .set_question_title(index, question, &entry.question)
                .await?;
            wizard
                .set_question_points(index, question, entry.points)
                .await?;
            for (option, choice) in entry.options.iter().enumerate() {
                wizard
                    .set_option_text(index, question, option, &choice.text)
                    .await?;
                wizard
                    .set_option_correct(index, question, option, choice.correct)
                    .await?;
            }
        }

        if let Some(video) = &subject.video {
            wizard.select_video(index, video.clone()).await?;
            wizard.upload_video(index).await?;
        }
    }

    let program = wizard.submit().await?;
    printer.abort();
    Ok(program)
}
