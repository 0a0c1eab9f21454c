use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::clip::ClipDescriptor;
use crate::config::TwitchSection;

use super::auth::AccessToken;
use super::error::{TwitchError, TwitchResult};
use super::{decode_response, with_helix_headers, HelixPage};

/// Upper bound the clips endpoint accepts for `first`.
pub const MAX_CLIPS_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ClipWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> TwitchResult<Self> {
        if start > end {
            return Err(TwitchError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }
}

/// Anything that can list a channel's clips in a stable order.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn fetch(
        &self,
        broadcaster_id: &str,
        window: ClipWindow,
        max_count: u32,
    ) -> TwitchResult<Vec<ClipDescriptor>>;
}

#[derive(Debug, Clone, Deserialize)]
struct ClipEntry {
    id: String,
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClipCatalog {
    client: Client,
    config: TwitchSection,
    token: AccessToken,
}

impl ClipCatalog {
    pub fn new(client: Client, config: TwitchSection, token: AccessToken) -> Self {
        Self {
            client,
            config,
            token,
        }
    }
}

#[async_trait]
impl ClipSource for ClipCatalog {
    async fn fetch(
        &self,
        broadcaster_id: &str,
        window: ClipWindow,
        max_count: u32,
    ) -> TwitchResult<Vec<ClipDescriptor>> {
        let endpoint = format!("{}/clips", self.config.api_base.trim_end_matches('/'));
        let first = max_count.clamp(1, MAX_CLIPS_PER_PAGE).to_string();
        let started_at = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let ended_at = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!(url = %endpoint, broadcaster_id, %started_at, %ended_at, first = %first, "fetching clips");
        let request = self.client.get(&endpoint).query(&[
            ("broadcaster_id", broadcaster_id),
            ("started_at", started_at.as_str()),
            ("ended_at", ended_at.as_str()),
            ("first", first.as_str()),
        ]);
        let response = with_helix_headers(request, &self.config.client_id, &self.token)
            .send()
            .await?;
        let page: HelixPage<ClipEntry> = decode_response(&endpoint, response).await?;
        let clips = into_descriptors(page.data, max_count);
        for clip in &clips {
            info!(
                position = clip.window_position,
                clip_id = %clip.id,
                video_id = clip.video_id.as_deref().unwrap_or("-"),
                title = %clip.title,
                url = %clip.source_url,
                "catalog clip"
            );
        }
        Ok(clips)
    }
}

fn into_descriptors(entries: Vec<ClipEntry>, max_count: u32) -> Vec<ClipDescriptor> {
    entries
        .into_iter()
        .take(max_count as usize)
        .enumerate()
        .map(|(window_position, entry)| ClipDescriptor {
            id: entry.id,
            title: entry.title,
            source_url: entry.url,
            video_id: entry.video_id.filter(|id| !id.is_empty()),
            window_position,
        })
        .collect()
}
