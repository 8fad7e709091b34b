use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, Level};

use qcut_export::progress::{ProgressEvent, ProgressSink};
use qcut_export::timeline::{MediaIndex, Timeline};
use qcut_export::{CancelToken, Config, ExportRequest, ExportSettings, Outcome};

#[derive(Parser)]
#[command(
    name = "qcut-export",
    version,
    about = "Exports a QCut project timeline to an MP4 file",
    long_about = "Analyzes a project's timeline, picks the cheapest viable export strategy, and drives FFmpeg to produce the final MP4, falling back through progressively more expensive strategies on failure."
)]
struct Cli {
    /// Project file containing the timeline and media index (JSON).
    #[arg(short, long)]
    project: PathBuf,

    /// Output video file path. Overrides the project's own setting if given.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pipeline configuration file (TOML, optional).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize)]
struct ProjectFile {
    timeline: Timeline,
    media: MediaIndex,
    #[serde(default)]
    settings: Option<ExportSettings>,
}

struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn report(&self, event: ProgressEvent) {
        info!(percent = event.percent, "{}", event.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("qcut-export v{}", env!("CARGO_PKG_VERSION"));
    info!(project = ?cli.project, "loading project");

    let project_text = std::fs::read_to_string(&cli.project)
        .with_context(|| format!("failed to read project file {:?}", cli.project))?;
    let project: ProjectFile = serde_json::from_str(&project_text)
        .with_context(|| format!("failed to parse project file {:?}", cli.project))?;

    let config = match cli.config {
        Some(path) => {
            info!(?path, "loading pipeline configuration");
            Config::from_file(&path)?
        }
        None => Config::default(),
    };
    config.validate()?;

    let mut settings = project.settings.unwrap_or_default();
    if let Some(output) = cli.output {
        settings.output_path = output.display().to_string();
    }

    info!(strategy_hint = ?settings.quality, "starting export");

    let progress = LoggingProgressSink;
    let cancel = CancelToken::new();
    let no_fonts = |_: &str| -> Option<String> { None };

    let request = ExportRequest {
        timeline: &project.timeline,
        media: &project.media,
        settings: &settings,
        config: &config,
        frame_source: None,
        font_resolver: &no_fonts,
        progress: &progress,
        cancel: cancel.clone(),
    };

    let outcome = qcut_export::dispatch(request).await?;
    info!("{}", outcome.user_message());

    match outcome {
        Outcome::Success { .. } => Ok(()),
        Outcome::Cancelled => std::process::exit(130),
        Outcome::TimedOut { .. } | Outcome::Failed { .. } => std::process::exit(1),
    }
}
