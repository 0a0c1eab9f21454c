use thiserror::Error;

pub type TwitchResult<T> = Result<T, TwitchError>;

#[derive(Debug, Error)]
pub enum TwitchError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("platform api returned {status} for {endpoint}: {body}")]
    Upstream {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("no channel matches {0}")]
    ChannelNotFound(String),
    #[error("clip window starts after it ends ({start} > {end})")]
    InvalidWindow { start: String, end: String },
}

impl TwitchError {
    /// Credential problems abort a run before anything else is attempted.
    pub fn is_auth(&self) -> bool {
        matches!(self, TwitchError::Auth(_))
    }
}

impl From<reqwest::Error> for TwitchError {
    fn from(error: reqwest::Error) -> Self {
        TwitchError::Network(error.to_string())
    }
}
