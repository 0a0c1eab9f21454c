use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::TwitchSection;

use super::error::{TwitchError, TwitchResult};
use super::status_error;

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// App access tokens via the client-credentials grant.
#[derive(Debug, Clone)]
pub struct TwitchAuth {
    client: Client,
    config: TwitchSection,
}

impl TwitchAuth {
    pub fn new(client: Client, config: TwitchSection) -> Self {
        Self { client, config }
    }

    /// Reads the client secret from the configured environment variable.
    pub fn secret_from_env(&self) -> TwitchResult<String> {
        let name = &self.config.client_secret_env;
        match std::env::var(name) {
            Ok(secret) if !secret.trim().is_empty() => Ok(secret),
            _ => Err(TwitchError::Auth(format!(
                "environment variable {name} must hold the client secret"
            ))),
        }
    }

    pub async fn client_credentials(&self, client_secret: &str) -> TwitchResult<AccessToken> {
        if client_secret.trim().is_empty() {
            return Err(TwitchError::Auth("client secret is empty".into()));
        }
        let endpoint = format!(
            "{}/oauth2/token",
            self.config.auth_base.trim_end_matches('/')
        );
        debug!(url = %endpoint, "requesting app access token");
        let response = self
            .client
            .post(&endpoint)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(TwitchError::Auth(format!("token request rejected: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&endpoint, status, body));
        }
        let token: TokenResponse = response.json().await.map_err(|err| TwitchError::Decode {
            endpoint: endpoint.clone(),
            reason: err.to_string(),
        })?;
        parse_token(token, &endpoint)
    }
}

fn parse_token(token: TokenResponse, endpoint: &str) -> TwitchResult<AccessToken> {
    if token.access_token.is_empty() {
        return Err(TwitchError::Decode {
            endpoint: endpoint.to_string(),
            reason: "empty access_token".into(),
        });
    }
    info!(expires_in = ?token.expires_in, "obtained app access token");
    Ok(AccessToken::new(token.access_token))
}
