use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReelConfig {
    pub twitch: TwitchSection,
    pub resolver: ResolverSection,
    pub download: DownloadSection,
    pub assembly: AssemblySection,
    pub paths: PathsSection,
}

impl ReelConfig {
    /// Rejects values that would make a run meaningless before any request goes out.
    pub fn validate(&self) -> Result<()> {
        if self.twitch.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "twitch.client_id",
                reason: "must not be empty".into(),
            });
        }
        if self.download.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "download.max_attempts",
                reason: "must be greater than zero".into(),
            });
        }
        let factor = self.download.backoff_factor;
        if factor.is_nan() || factor < 1.0 {
            return Err(ConfigError::Invalid {
                field: "download.backoff_factor",
                reason: format!("{factor} is below 1.0"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitchSection {
    pub client_id: String,
    pub client_secret_env: String,
    pub auth_base: String,
    pub api_base: String,
}

impl Default for TwitchSection {
    fn default() -> Self {
        Self {
            client_id: "l8mt5v8ivse0rwy6gg8ykknhs1oszc".into(),
            client_secret_env: "TWITCH_SECRET".into(),
            auth_base: "https://id.twitch.tv".into(),
            api_base: "https://api.twitch.tv/helix".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    pub endpoint: String,
    pub scheme: String,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            endpoint: "https://clipr.xyz/api/grabclip".into(),
            scheme: "https".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub max_attempts: u32,
    pub min_backoff_seconds: u64,
    pub backoff_factor: f64,
    pub max_backoff_seconds: u64,
    pub jitter_seconds: u64,
    pub user_agent: String,
}

impl DownloadSection {
    pub fn min_backoff(&self) -> Duration {
        Duration::from_secs(self.min_backoff_seconds)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds.max(self.min_backoff_seconds))
    }
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff_seconds: 30,
            backoff_factor: 2.0,
            max_backoff_seconds: 300,
            jitter_seconds: 0,
            user_agent: "clipreel/0.1".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblySection {
    pub ffmpeg: String,
    pub playlist_entry_seconds: u32,
}

impl Default for AssemblySection {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".into(),
            playlist_entry_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub downloads_dir: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            downloads_dir: "downloads".into(),
        }
    }
}

pub fn load_reel_config<P: AsRef<Path>>(path: P) -> Result<ReelConfig> {
    let config: ReelConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
