use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{
    ApiResponse, InlineKeyboardButton, InlineKeyboardMarkup, LinkPreviewOptions,
    ReplyParameters, SendMessageRequest, SetMyCommandsRequest, SetWebhookRequest,
};
use super::{BotCommand, Transport};
use crate::models::Reply;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bot API limit for a single message text.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Minimal Bot API client over reqwest.
pub struct TelegramClient {
    http: reqwest::Client,
    /// `<api_base>/bot<token>`; never logged
    method_base: String,
    webhook_secret: Option<String>,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            method_base: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            webhook_secret: None,
        })
    }

    /// Ask the provider to sign every webhook delivery with `secret`.
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.method_base, method);
        // without_url() keeps the token out of error messages and logs
        let resp = self
            .http
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| anyhow!("{} request failed: {}", method, e.without_url()))?;

        let status = resp.status();
        let body: ApiResponse<R> = resp.json().await.map_err(|e| {
            anyhow!(
                "{} returned an unreadable body (HTTP {}): {}",
                method,
                status,
                e.without_url()
            )
        })?;

        if !body.ok {
            bail!(
                "{} failed with code {}: {}",
                method,
                body.error_code.unwrap_or(status.as_u16() as i64),
                body.description.as_deref().unwrap_or("no description")
            );
        }

        body.result
            .with_context(|| format!("{} returned no result", method))
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn register_webhook(&self, url: &str) -> Result<()> {
        let accepted: bool = self
            .call(
                "setWebhook",
                &SetWebhookRequest {
                    url,
                    allowed_updates: &["message"],
                    drop_pending_updates: false,
                    secret_token: self.webhook_secret.as_deref(),
                },
            )
            .await?;
        if !accepted {
            bail!("setWebhook was not accepted");
        }
        info!("Webhook registered at {}", url);
        Ok(())
    }

    async fn unregister_webhook(&self) -> Result<()> {
        let _: bool = self
            .call("deleteWebhook", &serde_json::json!({}))
            .await?;
        info!("Webhook removed");
        Ok(())
    }

    async fn publish_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let _: bool = self
            .call("setMyCommands", &SetMyCommandsRequest { commands })
            .await?;
        debug!("Published {} bot commands", commands.len());
        Ok(())
    }

    async fn send_reply(&self, reply: &Reply) -> Result<()> {
        let text: String = reply.text.chars().take(MAX_MESSAGE_CHARS).collect();
        let reply_markup = (!reply.buttons.is_empty()).then(|| InlineKeyboardMarkup {
            inline_keyboard: reply
                .buttons
                .iter()
                .map(|b| {
                    vec![InlineKeyboardButton {
                        text: b.label.clone(),
                        url: b.url.clone(),
                    }]
                })
                .collect(),
        });

        let request = SendMessageRequest {
            chat_id: reply.chat_id,
            text: &text,
            reply_parameters: reply.reply_to_message_id.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
            reply_markup,
            link_preview_options: LinkPreviewOptions { is_disabled: true },
        };

        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        debug!("Sent reply to chat {}", reply.chat_id);
        Ok(())
    }
}
