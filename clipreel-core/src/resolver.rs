use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ResolverSection;

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolver request for {clip_url} failed: {reason}")]
    Network { clip_url: String, reason: String },
    #[error("resolver returned {status} for {clip_url}")]
    Status { clip_url: String, status: u16 },
    #[error("resolver response for {clip_url} has no download url")]
    MissingUrl { clip_url: String },
    #[error("resolver returned unusable url {url:?} for {clip_url}")]
    InvalidUrl { clip_url: String, url: String },
}

/// Turns a clip page URL into a directly fetchable media URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> ResolveResult<String>;
}

#[derive(Debug, Serialize)]
struct GrabRequest<'a> {
    clip_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct GrabResponse {
    #[serde(default)]
    download_url: Option<String>,
}

/// Client for the third-party clip grabbing service. One request per call.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    client: Client,
    config: ResolverSection,
}

impl UrlResolver {
    pub fn new(client: Client, config: ResolverSection) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl MediaResolver for UrlResolver {
    async fn resolve(&self, source_url: &str) -> ResolveResult<String> {
        debug!(endpoint = %self.config.endpoint, clip_url = source_url, "resolving clip");
        let network = |err: reqwest::Error| ResolveError::Network {
            clip_url: source_url.to_string(),
            reason: err.to_string(),
        };
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&GrabRequest {
                clip_url: source_url,
            })
            .send()
            .await
            .map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                clip_url: source_url.to_string(),
                status: status.as_u16(),
            });
        }
        let body: GrabResponse = response.json().await.map_err(network)?;
        let raw = body
            .download_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ResolveError::MissingUrl {
                clip_url: source_url.to_string(),
            })?;
        absolutize(&raw, &self.config.scheme).ok_or_else(|| ResolveError::InvalidUrl {
            clip_url: source_url.to_string(),
            url: raw,
        })
    }
}

/// Prefixes host-relative (`//host/path`) URLs with `scheme`; absolute URLs pass through.
pub fn absolutize(raw: &str, scheme: &str) -> Option<String> {
    let raw = raw.trim();
    let candidate = if raw.starts_with("//") {
        format!("{scheme}:{raw}")
    } else {
        raw.to_string()
    };
    let parsed = Url::parse(&candidate).ok()?;
    if parsed.host_str().is_none() && parsed.scheme() != "file" {
        return None;
    }
    Some(parsed.to_string())
}
