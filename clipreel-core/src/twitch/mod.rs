mod auth;
mod channels;
mod clips;
mod error;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

pub use auth::{AccessToken, TwitchAuth};
pub use channels::ChannelDirectory;
pub use clips::{ClipCatalog, ClipSource, ClipWindow, MAX_CLIPS_PER_PAGE};
pub use error::{TwitchError, TwitchResult};

/// Helix responses wrap every payload in a `data` array.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct HelixPage<T> {
    pub data: Vec<T>,
}

pub(crate) fn with_helix_headers(
    request: RequestBuilder,
    client_id: &str,
    token: &AccessToken,
) -> RequestBuilder {
    request
        .header("Client-Id", client_id)
        .bearer_auth(token.secret())
}

/// Maps a non-success status to the error taxonomy and decodes the body otherwise.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> TwitchResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(endpoint, status, body));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| TwitchError::Decode {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })
}

pub(crate) fn status_error(endpoint: &str, status: StatusCode, body: String) -> TwitchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TwitchError::Auth(format!("{endpoint} returned {status}: {body}"))
        }
        _ => TwitchError::Upstream {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        },
    }
}
