//! LINE Messaging API push client.
//!
//! Sends the run report as a single text message to one user.
//!
//! API docs: https://developers.line.biz/en/reference/messaging-api/
//! Auth: `Authorization: Bearer {channel access token}`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::NotifierPort;

const PUSH_ENDPOINT: &str = "https://api.line.me/v2/bot/message/push";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Pushes text messages to a single LINE user.
pub struct LineNotifier {
    http: Client,
    channel_token: String,
    to_user_id: String,
}

impl LineNotifier {
    pub fn new(channel_token: String, to_user_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            channel_token,
            to_user_id,
        })
    }
}

#[async_trait]
impl NotifierPort for LineNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = json!({
            "to": self.to_user_id,
            "messages": [ { "type": "text", "text": text } ],
        });

        debug!(chars = text.len(), "LINE push");
        let resp = self
            .http
            .post(PUSH_ENDPOINT)
            .bearer_auth(&self.channel_token)
            .json(&payload)
            .send()
            .await
            .context("LINE push request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("LINE push failed: {status} body={body}");
        }
        Ok(())
    }
}
