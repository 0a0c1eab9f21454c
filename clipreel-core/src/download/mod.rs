mod error;
mod fetcher;
mod policy;

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::clip::{ClipDescriptor, DownloadRecord, ResolvedDownload};
use crate::resolver::MediaResolver;

pub use error::{ClipFailure, DownloadError, DownloadResult};
pub use fetcher::{HttpFetcher, MediaFetcher};
pub use policy::{RetryOutcome, RetryPolicy};

/// Downloads one clip at a time with bounded retry. Retries go back through
/// the resolver first, since resolved media URLs expire.
#[derive(Clone)]
pub struct RetryingDownloader {
    resolver: Arc<dyn MediaResolver>,
    fetcher: Arc<dyn MediaFetcher>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingDownloader")
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryingDownloader {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        fetcher: Arc<dyn MediaFetcher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn download(
        &self,
        clip: &ClipDescriptor,
        resolved: ResolvedDownload,
        destination: &Path,
    ) -> Result<RetryOutcome<DownloadRecord>, ClipFailure> {
        if resolved.clip_id != clip.id {
            warn!(clip_id = %clip.id, resolved_for = %resolved.clip_id, "resolution belongs to another clip");
            return Err(ClipFailure::Aborted {
                clip_id: clip.id.clone(),
                reason: format!("media url was resolved for clip {}", resolved.clip_id),
            });
        }
        let max_attempts = self.policy.max_attempts.max(1);
        let mut media_url = Some(resolved.media_url);
        let mut attempt = 1u32;
        loop {
            match self
                .attempt(clip, media_url.take(), attempt, destination)
                .await
            {
                Ok(bytes) => {
                    info!(clip_id = %clip.id, path = %destination.display(), bytes, attempt, "clip downloaded");
                    return Ok(RetryOutcome {
                        result: DownloadRecord {
                            clip_id: clip.id.clone(),
                            local_path: destination.to_path_buf(),
                            sequence_index: clip.window_position,
                        },
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    discard_partial(destination).await;
                    if attempt >= max_attempts {
                        warn!(clip_id = %clip.id, url = %clip.source_url, attempt, error = %error, "download attempts exhausted");
                        return Err(ClipFailure::Download {
                            clip_id: clip.id.clone(),
                            attempts: attempt,
                            source: error,
                        });
                    }
                    let delay = self.policy.delay_for_retry(attempt);
                    warn!(clip_id = %clip.id, url = %clip.source_url, attempt, wait = ?delay, error = %error, "download attempt failed, retrying");
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        clip: &ClipDescriptor,
        media_url: Option<String>,
        attempt: u32,
        destination: &Path,
    ) -> DownloadResult<u64> {
        let media_url = match media_url {
            Some(url) => url,
            None => self.resolver.resolve(&clip.source_url).await?,
        };
        info!(clip_id = %clip.id, url = %media_url, attempt, "downloading clip");
        self.fetcher.fetch_to_file(&media_url, destination).await
    }
}

/// A failed attempt may leave a truncated file behind; it must not be mistaken for a clip.
async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to remove partial download")
        }
    }
}
