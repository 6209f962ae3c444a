// Discord REST sink: bot-token auth, one POST per message.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::{ChatSink, DeliveryError};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// The bot account behind the configured token.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BotUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct DiscordSink {
    client: reqwest::Client,
    api_base: String,
}

impl DiscordSink {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        Self::with_api_base(token, timeout, DEFAULT_API_BASE)
    }

    pub fn with_api_base(token: &str, timeout: Duration, api_base: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .context("bot token contains characters not allowed in a header")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("DiscordBot (tidewatch, ", env!("CARGO_PKG_VERSION"), ")"))
            .default_headers(headers)
            .build()
            .context("failed to create chat HTTP client")?;

        Ok(Self { client, api_base: api_base.trim_end_matches('/').to_string() })
    }

    pub fn messages_url(&self, channel_id: u64) -> String {
        format!("{}/channels/{channel_id}/messages", self.api_base)
    }

    /// Resolve the bot identity; doubles as a token check at startup.
    pub async fn whoami(&self) -> Result<BotUser, DeliveryError> {
        let response = self
            .client
            .get(format!("{}/users/@me", self.api_base))
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;
        let response = reject_unsuccessful(response).await?;
        response
            .json::<BotUser>()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))
    }
}

impl ChatSink for DiscordSink {
    async fn send(&self, channel_id: u64, text: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.messages_url(channel_id))
            .json(&CreateMessage { content: text })
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;
        reject_unsuccessful(response).await?;
        Ok(())
    }
}

async fn reject_unsuccessful(
    response: reqwest::Response,
) -> Result<reqwest::Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Rejected { status: status.as_u16(), body })
}
