//! Outbound side of the bot: the `Transport` seam and its Bot API client.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::Reply;

mod client;
pub mod types;

pub use client::TelegramClient;

/// Entry of the command menu shown by chat clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

/// Everything the runtime needs from the messaging provider.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Point the provider's push delivery at `url`. Safe to repeat.
    async fn register_webhook(&self, url: &str) -> Result<()>;

    async fn unregister_webhook(&self) -> Result<()>;

    async fn publish_commands(&self, commands: &[BotCommand]) -> Result<()>;

    async fn send_reply(&self, reply: &Reply) -> Result<()>;
}
