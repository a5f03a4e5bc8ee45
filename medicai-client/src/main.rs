use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use medicai_pipeline::upload::failure_notification;
use medicai_pipeline::{
    NormalizedPayload, Notification, PageOutcome, PageView, Pipeline, PipelineConfig,
    ResourceKind, SelectedFile, Theme, UploadProgress, Url, render_diagnoses, render_summary,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Terminal front end for the MedicAI document analysis backend.
#[derive(Parser, Debug)]
#[command(name = "medicai", version, about)]
struct Cli {
    /// Backend API base URL
    #[arg(long, global = true, env = "MEDICAI_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Where session id, cached results and theme are kept
    #[arg(long, global = true, env = "MEDICAI_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload medical documents and start a new session
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the diagnosis for the current session
    Diagnosis {
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Show the SOAP summary for the current session
    Summary {
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Show, set or toggle the saved theme
    Theme {
        theme: Option<Theme>,
        #[arg(long, conflicts_with = "theme")]
        toggle: bool,
    },
}

/// Prints rendered results on stdout and notifications on stderr.
struct TerminalView;

impl PageView for TerminalView {
    fn show_no_data(&mut self) {
        println!("No data available. Upload documents to start a session.");
    }

    fn show_loading(&mut self) {
        eprintln!("Loading...");
    }

    fn render(&mut self, payload: &NormalizedPayload) {
        match payload {
            NormalizedPayload::Diagnosis(entries) => println!("{}", render_diagnoses(entries)),
            NormalizedPayload::Summary(summary) => println!("{}", render_summary(summary)),
        }
    }

    fn notify(&mut self, notification: &Notification) {
        print_notification(notification);
    }
}

fn print_notification(notification: &Notification) {
    eprintln!("[{}] {}", notification.kind.icon(), notification.message);
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(url) = cli.api_base_url {
        config = config.with_base_url(url);
    }
    if let Some(path) = cli.storage_path {
        config = config.with_storage_path(path);
    }

    let pipeline = Pipeline::open(config)
        .await
        .context("failed to initialize pipeline")?;
    info!("Using API at {}", pipeline.api.base_url());

    match cli.command {
        Command::Upload { files } => upload(&pipeline, files).await,
        Command::Diagnosis { session_id } => {
            show_page(&pipeline, ResourceKind::Diagnosis, session_id).await
        }
        Command::Summary { session_id } => {
            show_page(&pipeline, ResourceKind::Summary, session_id).await
        }
        Command::Theme { theme, toggle } => update_theme(&pipeline, theme, toggle).await,
    }
}

async fn upload(pipeline: &Pipeline, paths: Vec<PathBuf>) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(SelectedFile::from_path(path).await?);
    }

    let uploader = pipeline.uploader();
    uploader.select(files);

    let abort = uploader.abort_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<UploadProgress>();
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            eprintln!("Uploading... {}%", progress.percent);
        }
    });

    let result = uploader.submit(Some(tx)).await;
    interrupt.abort();
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            print_notification(&outcome.notification);
            println!("Session: {}", outcome.session_id);
            for link in &outcome.result_links {
                println!("{}", link);
            }
            Ok(())
        }
        Err(e) => {
            print_notification(&failure_notification(&e));
            Err(e.into())
        }
    }
}

async fn show_page(
    pipeline: &Pipeline,
    kind: ResourceKind,
    session_id: Option<String>,
) -> Result<()> {
    let mut location = page_location(kind.page())?;
    if let Some(id) = session_id {
        location
            .query_pairs_mut()
            .append_pair(medicai_pipeline::session::SESSION_PARAM, &id);
    }

    let mut links: Vec<String> = pipeline
        .config
        .sibling_pages
        .iter()
        .filter(|page| page.as_str() != kind.page())
        .cloned()
        .collect();

    let page = pipeline.result_page(kind);
    match page.load(&location, &mut links, &mut TerminalView).await {
        PageOutcome::NoSession => Ok(()),
        PageOutcome::Rendered { .. } => {
            for link in &links {
                println!("{}", link);
            }
            Ok(())
        }
        PageOutcome::Failed { message, .. } => bail!(message),
    }
}

fn page_location(page: &str) -> Result<Url> {
    Url::parse(&format!("http://localhost/{}", page))
        .with_context(|| format!("invalid page location for {}", page))
}

async fn update_theme(pipeline: &Pipeline, theme: Option<Theme>, toggle: bool) -> Result<()> {
    let current = Theme::effective(pipeline.theme().await, false);
    let next = match (theme, toggle) {
        (Some(theme), _) => theme,
        (None, true) => current.toggled(),
        (None, false) => {
            println!("{}", current);
            return Ok(());
        }
    };
    pipeline.set_theme(next).await?;
    println!("{}", next);
    Ok(())
}
