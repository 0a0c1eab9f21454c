use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::TwitchSection;

use super::auth::AccessToken;
use super::error::{TwitchError, TwitchResult};
use super::{decode_response, with_helix_headers, HelixPage};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChannelEntry {
    pub id: String,
    #[serde(default)]
    pub broadcaster_login: String,
    #[serde(default)]
    pub display_name: String,
}

/// Channel search used to turn a channel name into a broadcaster id.
#[derive(Debug, Clone)]
pub struct ChannelDirectory {
    client: Client,
    config: TwitchSection,
    token: AccessToken,
}

impl ChannelDirectory {
    pub fn new(client: Client, config: TwitchSection, token: AccessToken) -> Self {
        Self {
            client,
            config,
            token,
        }
    }

    pub async fn broadcaster_id(&self, name: &str) -> TwitchResult<String> {
        let endpoint = format!(
            "{}/search/channels",
            self.config.api_base.trim_end_matches('/')
        );
        debug!(url = %endpoint, query = name, "searching channel");
        let request = self
            .client
            .get(&endpoint)
            .query(&[("first", "1"), ("query", name)]);
        let response = with_helix_headers(request, &self.config.client_id, &self.token)
            .send()
            .await?;
        let page: HelixPage<ChannelEntry> = decode_response(&endpoint, response).await?;
        let entry = pick_channel(name, &page.data)?;
        info!(channel = name, broadcaster_id = %entry.id, display_name = %entry.display_name, "resolved channel");
        Ok(entry.id.clone())
    }
}

pub(crate) fn pick_channel<'a>(
    name: &str,
    entries: &'a [ChannelEntry],
) -> TwitchResult<&'a ChannelEntry> {
    entries
        .iter()
        .find(|entry| entry.broadcaster_login.eq_ignore_ascii_case(name))
        .or_else(|| entries.first())
        .ok_or_else(|| TwitchError::ChannelNotFound(name.to_string()))
}
