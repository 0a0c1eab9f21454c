use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use clipreel_core::{
    load_reel_config, AssemblyError, ChannelDirectory, ClipCatalog, ClipPipeline, PipelineError,
    PipelineReport, ReelConfig, RunConfig, TwitchAuth, TwitchError,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] clipreel_core::ConfigError),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("twitch error: {0}")]
    Twitch(TwitchError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

impl From<TwitchError> for AppError {
    fn from(error: TwitchError) -> Self {
        match error {
            TwitchError::Auth(reason) => AppError::Authentication(reason),
            other => AppError::Twitch(other),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Download recent clips from a channel and merge them into a highlight video",
    long_about = None
)]
pub struct Cli {
    /// Name of the channel to fetch clips from
    pub channel: String,
    /// Start of the clip window, in hours before now
    #[arg(short = 's', long = "start-hours-ago", default_value_t = 6.0)]
    pub start_hours_ago: f64,
    /// End of the clip window, in hours before now
    #[arg(short = 'e', long = "end-hours-ago", default_value_t = 0.0)]
    pub end_hours_ago: f64,
    /// Number of clips to fetch
    #[arg(short = 'n', long = "clips", default_value_t = 10)]
    pub clips: u32,
    /// Path to clipreel.toml; built-in defaults are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override for paths.downloads_dir
    #[arg(long)]
    pub downloads_dir: Option<PathBuf>,
    /// Override for assembly.ffmpeg
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,
    /// Output format of the final report
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Loads the config file (if any) and applies command-line overrides.
pub fn resolve_config(cli: &Cli) -> Result<ReelConfig> {
    let mut config = match &cli.config {
        Some(path) => load_reel_config(path)?,
        None => ReelConfig::default(),
    };
    if let Some(dir) = &cli.downloads_dir {
        config.paths.downloads_dir = dir.to_string_lossy().to_string();
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        config.assembly.ffmpeg = ffmpeg.to_string_lossy().to_string();
    }
    config.validate()?;
    Ok(config)
}

pub fn build_run_config(cli: &Cli, config: &ReelConfig, now: DateTime<Utc>) -> Result<RunConfig> {
    let run = RunConfig::new(
        cli.channel.clone(),
        Path::new(&config.paths.downloads_dir),
        now,
        cli.start_hours_ago,
        cli.end_hours_ago,
        cli.clips,
    )?;
    Ok(run)
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let run = build_run_config(&cli, &config, Utc::now())?;

    let client = reqwest::Client::builder()
        .user_agent(config.download.user_agent.clone())
        .build()?;
    let auth = TwitchAuth::new(client.clone(), config.twitch.clone());
    let secret = auth.secret_from_env()?;
    let token = auth.client_credentials(&secret).await?;

    let directory = ChannelDirectory::new(client.clone(), config.twitch.clone(), token.clone());
    let broadcaster_id = directory.broadcaster_id(&cli.channel).await?;

    let catalog = Arc::new(ClipCatalog::new(client.clone(), config.twitch.clone(), token));
    let pipeline = ClipPipeline::from_config(run, &config, catalog, client);
    info!(
        channel = %cli.channel,
        run_dir = %pipeline.run_config().run_dir.display(),
        "starting clip run"
    );

    match pipeline.run(&broadcaster_id).await {
        Ok(report) => {
            render(&RunSummary::from(&report), cli.format)?;
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                render(&RunSummary::from(report), cli.format)?;
            }
            match &err {
                PipelineError::Assembly {
                    source: AssemblyError::NothingToAssemble,
                    ..
                } => error!("no clip was downloaded, nothing to merge"),
                PipelineError::Assembly { source, .. } => {
                    error!(error = %source, "merge did not produce a highlight video")
                }
                other => error!(error = %other, "clip run aborted"),
            }
            Err(err.into())
        }
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub channel: String,
    pub clips_found: usize,
    pub downloaded: Vec<String>,
    pub failed: Vec<FailureLine>,
    pub playlist: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct FailureLine {
    pub clip_id: String,
    pub title: String,
    pub attempts: u32,
    pub reason: String,
}

impl From<&PipelineReport> for RunSummary {
    fn from(report: &PipelineReport) -> Self {
        Self {
            channel: report.channel.clone(),
            clips_found: report.clips_found,
            downloaded: report
                .downloaded
                .iter()
                .map(|clip| clip.record.local_path.display().to_string())
                .collect(),
            failed: report
                .failed
                .iter()
                .map(|clip| FailureLine {
                    clip_id: clip.clip_id.clone(),
                    title: clip.title.clone(),
                    attempts: clip.attempts,
                    reason: clip.reason.clone(),
                })
                .collect(),
            playlist: report.playlist_path.clone(),
            highlights: report.highlights_path.clone(),
        }
    }
}

impl DisplayFallback for RunSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{}: {} clip(s) found, {} downloaded, {} failed",
            self.channel,
            self.clips_found,
            self.downloaded.len(),
            self.failed.len()
        )];
        for failure in &self.failed {
            lines.push(format!(
                "  ! {} ({}) after {} attempt(s): {}",
                failure.clip_id, failure.title, failure.attempts, failure.reason
            ));
        }
        match &self.highlights {
            Some(path) => {
                lines.push("Reencode complete.".to_string());
                lines.push(path.display().to_string());
            }
            None => lines.push("No highlight video produced.".to_string()),
        }
        lines.push("Download clips playlist".to_string());
        lines.push(self.playlist.display().to_string());
        lines.join("\n")
    }
}
