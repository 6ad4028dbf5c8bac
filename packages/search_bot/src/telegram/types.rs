// Subset of the Bot API wire format. Unknown fields are ignored by serde.

use serde::{Deserialize, Serialize};

use crate::models::{InboundUpdate, QuotedMessage};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    /// Text content, falling back to a media caption.
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
}

impl Update {
    /// Extract the bot command carried by this update, if any.
    ///
    /// Edits, channel posts, service messages, plain text and messages
    /// without an author yield `None`.
    pub fn into_inbound(self) -> Option<InboundUpdate> {
        let message = self.message?;
        let sender = message.from.as_ref()?;
        if sender.is_bot {
            return None;
        }
        let (command, raw_args) = InboundUpdate::parse_command(message.text.as_deref()?)?;

        Some(InboundUpdate {
            chat_id: message.chat.id,
            sender_id: sender.id,
            message_id: message.message_id,
            command,
            args: raw_args.split_whitespace().map(str::to_string).collect(),
            raw_args,
            reply_to: message.reply_to_message.as_ref().map(|quoted| QuotedMessage {
                message_id: quoted.message_id,
                text: quoted.content().map(str::to_string),
            }),
        })
    }
}

// === Outbound ===

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
    pub link_preview_options: LinkPreviewOptions,
}

#[derive(Debug, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
    pub allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkPreviewOptions {
    pub is_disabled: bool,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SetWebhookRequest<'a> {
    pub url: &'a str,
    pub allowed_updates: &'a [&'a str],
    pub drop_pending_updates: bool,
    /// Echoed back by the provider in `X-Telegram-Bot-Api-Secret-Token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct SetMyCommandsRequest<'a> {
    pub commands: &'a [super::BotCommand],
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}
