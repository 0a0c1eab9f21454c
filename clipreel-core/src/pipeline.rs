use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

use crate::assembly::{AssemblyError, AssemblyJob, VideoAssembler};
use crate::clip::{clip_path, ClipDescriptor, DownloadRecord, ResolvedDownload};
use crate::config::ReelConfig;
use crate::download::{
    ClipFailure, HttpFetcher, MediaFetcher, RetryOutcome, RetryPolicy, RetryingDownloader,
};
use crate::playlist::{PlaylistBuilder, PLAYLIST_FILE_NAME};
use crate::resolver::{MediaResolver, UrlResolver};
use crate::twitch::{ClipSource, ClipWindow, TwitchError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid run window: {0}")]
    InvalidWindow(String),
    #[error("clip catalog unavailable: {0}")]
    Catalog(#[from] TwitchError),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("highlight assembly failed: {source}")]
    Assembly {
        source: AssemblyError,
        report: Box<PipelineReport>,
    },
}

impl PipelineError {
    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            PipelineError::Assembly { report, .. } => Some(report),
            _ => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Identity and output locations of one run, fixed from a single wall-clock instant.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub channel: String,
    pub started_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub max_clips: u32,
    pub run_dir: PathBuf,
    pub playlist_path: PathBuf,
    pub highlights_path: PathBuf,
}

impl RunConfig {
    pub fn new(
        channel: impl Into<String>,
        downloads_dir: &Path,
        now: DateTime<Utc>,
        start_hours_ago: f64,
        end_hours_ago: f64,
        max_clips: u32,
    ) -> PipelineResult<Self> {
        let window_start = hours_before(now, start_hours_ago)?;
        let window_end = hours_before(now, end_hours_ago)?;
        if window_start > window_end {
            return Err(PipelineError::InvalidWindow(format!(
                "start ({start_hours_ago}h ago) is after end ({end_hours_ago}h ago)"
            )));
        }
        let run_dir = downloads_dir.join(window_start.format("%Y-%m-%d").to_string());
        let playlist_path = run_dir.join(PLAYLIST_FILE_NAME);
        let highlights_path =
            run_dir.join(format!("_highlights_{}.mp4", now.timestamp_millis()));
        Ok(Self {
            channel: channel.into(),
            started_at: now,
            window_start,
            window_end,
            max_clips,
            run_dir,
            playlist_path,
            highlights_path,
        })
    }

    pub fn window(&self) -> PipelineResult<ClipWindow> {
        ClipWindow::new(self.window_start, self.window_end)
            .map_err(|err| PipelineError::InvalidWindow(err.to_string()))
    }
}

fn hours_before(now: DateTime<Utc>, value: f64) -> PipelineResult<DateTime<Utc>> {
    let unusable =
        || PipelineError::InvalidWindow(format!("{value} is not a usable number of hours"));
    if !value.is_finite() || value < 0.0 {
        return Err(unusable());
    }
    let millis = (value * 3_600_000.0).round();
    if millis >= i64::MAX as f64 {
        return Err(unusable());
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(unusable)
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedClip {
    #[serde(flatten)]
    pub record: DownloadRecord,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedClip {
    pub clip_id: String,
    pub title: String,
    pub sequence_index: usize,
    pub attempts: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub channel: String,
    pub broadcaster_id: String,
    pub clips_found: usize,
    pub downloaded: Vec<DownloadedClip>,
    pub failed: Vec<FailedClip>,
    pub playlist_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights_path: Option<PathBuf>,
}

impl PipelineReport {
    pub fn records(&self) -> Vec<DownloadRecord> {
        self.downloaded
            .iter()
            .map(|clip| clip.record.clone())
            .collect()
    }
}

type ClipResult = Result<RetryOutcome<DownloadRecord>, ClipFailure>;

/// Catalog, then sequential resolution with concurrent downloads, then one
/// playlist and one merge once every download has settled.
pub struct ClipPipeline {
    run: RunConfig,
    catalog: Arc<dyn ClipSource>,
    resolver: Arc<dyn MediaResolver>,
    downloader: Arc<RetryingDownloader>,
    playlist: PlaylistBuilder,
    assembler: VideoAssembler,
}

impl std::fmt::Debug for ClipPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipPipeline")
            .field("run", &self.run)
            .field("downloader", &self.downloader)
            .field("playlist", &self.playlist)
            .field("assembler", &self.assembler)
            .finish()
    }
}

impl ClipPipeline {
    pub fn new(
        run: RunConfig,
        catalog: Arc<dyn ClipSource>,
        resolver: Arc<dyn MediaResolver>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        let downloader = RetryingDownloader::new(
            Arc::clone(&resolver),
            fetcher,
            RetryPolicy::default(),
        );
        Self {
            run,
            catalog,
            resolver,
            downloader: Arc::new(downloader),
            playlist: PlaylistBuilder::default(),
            assembler: VideoAssembler::new("ffmpeg"),
        }
    }

    /// Wires the HTTP resolver, fetcher, retry policy and ffmpeg binary from `config`.
    pub fn from_config(
        run: RunConfig,
        config: &ReelConfig,
        catalog: Arc<dyn ClipSource>,
        client: Client,
    ) -> Self {
        let resolver = Arc::new(UrlResolver::new(client.clone(), config.resolver.clone()));
        let fetcher = Arc::new(HttpFetcher::new(client));
        Self::new(run, catalog, resolver, fetcher)
            .with_retry_policy(RetryPolicy::new(&config.download))
            .with_playlist_builder(PlaylistBuilder::new(config.assembly.playlist_entry_seconds))
            .with_assembler(VideoAssembler::new(&config.assembly.ffmpeg))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.downloader = Arc::new(self.downloader.as_ref().clone().with_policy(policy));
        self
    }

    pub fn with_playlist_builder(mut self, playlist: PlaylistBuilder) -> Self {
        self.playlist = playlist;
        self
    }

    pub fn with_assembler(mut self, assembler: VideoAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    pub async fn run(&self, broadcaster_id: &str) -> PipelineResult<PipelineReport> {
        let window = self.run.window()?;
        let clips = self
            .catalog
            .fetch(broadcaster_id, window, self.run.max_clips)
            .await?;
        info!(channel = %self.run.channel, count = clips.len(), "catalog returned clips");

        fs::create_dir_all(&self.run.run_dir)
            .await
            .map_err(|source| PipelineError::Io {
                path: self.run.run_dir.clone(),
                source,
            })?;

        let policy = self.downloader.policy();
        info!(
            run_dir = %self.run.run_dir.display(),
            max_attempts = policy.max_attempts,
            min_backoff = ?policy.min_backoff,
            "downloading clips"
        );
        let outcomes = self.download_all(&clips).await;

        let mut downloaded = Vec::new();
        let mut failed = Vec::new();
        for (clip, outcome) in clips.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => downloaded.push(DownloadedClip {
                    record: outcome.result,
                    attempts: outcome.attempts,
                }),
                Err(failure) => failed.push(FailedClip {
                    clip_id: clip.id.clone(),
                    title: clip.title.clone(),
                    sequence_index: clip.window_position,
                    attempts: failure.attempts(),
                    reason: failure.to_string(),
                }),
            }
        }
        info!(
            downloaded = downloaded.len(),
            failed = failed.len(),
            "download phase settled"
        );

        let mut report = PipelineReport {
            channel: self.run.channel.clone(),
            broadcaster_id: broadcaster_id.to_string(),
            clips_found: clips.len(),
            downloaded,
            failed,
            playlist_path: self.run.playlist_path.clone(),
            highlights_path: None,
        };

        let records = report.records();
        self.playlist
            .build(&records)
            .write_to(&self.run.playlist_path)
            .await
            .map_err(|source| PipelineError::Io {
                path: self.run.playlist_path.clone(),
                source,
            })?;

        let assembled = match AssemblyJob::from_records(&records, self.run.highlights_path.clone())
        {
            Ok(job) => self.assembler.assemble(job).await,
            Err(err) => Err(err),
        };
        match assembled {
            Ok(path) => {
                report.highlights_path = Some(path);
                Ok(report)
            }
            Err(source) => {
                error!(error = %source, "highlight video not produced");
                Err(PipelineError::Assembly {
                    source,
                    report: Box::new(report),
                })
            }
        }
    }

    /// Resolves clips one after another and downloads them concurrently.
    /// Returns one outcome per clip, in catalog order, after every task has finished.
    async fn download_all(&self, clips: &[ClipDescriptor]) -> Vec<ClipResult> {
        let mut slots: Vec<Option<ClipResult>> = clips.iter().map(|_| None).collect();
        let mut pending = Vec::new();
        for (slot, clip) in clips.iter().enumerate() {
            let media_url = match self.resolver.resolve(&clip.source_url).await {
                Ok(url) => url,
                Err(source) => {
                    warn!(clip_id = %clip.id, url = %clip.source_url, error = %source, "clip resolution failed");
                    slots[slot] = Some(Err(ClipFailure::Resolution {
                        clip_id: clip.id.clone(),
                        source,
                    }));
                    continue;
                }
            };
            let resolved = ResolvedDownload {
                clip_id: clip.id.clone(),
                media_url,
            };
            let destination = clip_path(&self.run.run_dir, clip);
            let downloader = Arc::clone(&self.downloader);
            let task_clip = clip.clone();
            let handle = tokio::spawn(async move {
                downloader
                    .download(&task_clip, resolved, &destination)
                    .await
            });
            pending.push((slot, clip.id.clone(), handle));
        }

        let (keys, handles): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .map(|(slot, clip_id, handle)| ((slot, clip_id), handle))
            .unzip();
        for ((slot, clip_id), joined) in keys.into_iter().zip(join_all(handles).await) {
            slots[slot] = Some(match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(clip_id = %clip_id, error = %err, "download task did not complete");
                    Err(ClipFailure::Aborted {
                        clip_id,
                        reason: err.to_string(),
                    })
                }
            });
        }
        slots.into_iter().flatten().collect()
    }
}
