use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Pointer to a single chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }

    /// Public deep link to the message.
    ///
    /// Only supergroups and channels (ids prefixed with `-100`) have
    /// addressable messages; private chats and basic groups return `None`.
    pub fn link(&self) -> Option<String> {
        let internal = self.chat_id.to_string();
        let internal = internal.strip_prefix("-100")?;
        if internal.is_empty() {
            return None;
        }
        Some(format!("https://t.me/c/{}/{}", internal, self.message_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: i64,
    pub owner_id: i64,
    pub body: String,
    pub created_at: i64,
    /// Message the body was taken from, if any
    pub source: Option<MessageRef>,
}

/// Insertion input for [`crate::repository::ContentRepository::insert_record`].
#[derive(Debug, Clone)]
pub struct NewContentRecord {
    pub owner_id: i64,
    pub body: String,
    pub created_at: i64,
    pub source: Option<MessageRef>,
    /// Command message that asked for the insertion. Unique in storage, so
    /// redelivered updates collapse onto the first insert.
    pub origin: Option<MessageRef>,
}

impl NewContentRecord {
    pub fn new(owner_id: i64, body: impl Into<String>) -> Self {
        Self {
            owner_id,
            body: body.into(),
            created_at: Utc::now().timestamp(),
            source: None,
            origin: None,
        }
    }

    pub fn with_source(mut self, source: MessageRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_origin(mut self, origin: MessageRef) -> Self {
        self.origin = Some(origin);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: i64,
    /// False when an existing record with the same origin was returned
    pub created: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn total_pages_for(total: i64, per_page: i64) -> i64 {
        if total == 0 || per_page <= 0 {
            1
        } else {
            (total - 1) / per_page + 1
        }
    }
}

// === Updates and replies ===

/// The message a command replied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedMessage {
    pub message_id: i64,
    pub text: Option<String>,
}

/// One parsed bot command, detached from the transport's wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub chat_id: i64,
    pub sender_id: i64,
    pub message_id: i64,
    /// Lower-cased command token, without the leading `/` or `@botname`
    pub command: String,
    pub args: Vec<String>,
    /// Text after the command token with its inner spacing preserved
    pub raw_args: String,
    pub reply_to: Option<QuotedMessage>,
}

impl InboundUpdate {
    /// Parse a `/command@bot arg1 arg2` message text.
    ///
    /// Returns `None` when the text is not a command.
    pub fn parse_command(text: &str) -> Option<(String, String)> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (token, raw_args) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };
        let command = token.split('@').next().unwrap_or_default();
        if command.is_empty() {
            return None;
        }
        Some((command.to_lowercase(), raw_args.to_string()))
    }

    pub fn origin(&self) -> MessageRef {
        MessageRef::new(self.chat_id, self.message_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

/// Outgoing message produced by a command handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
    pub reply_to_message_id: Option<i64>,
    pub buttons: Vec<LinkButton>,
}

impl Reply {
    pub fn to(update: &InboundUpdate, text: impl Into<String>) -> Self {
        Self {
            chat_id: update.chat_id,
            text: text.into(),
            reply_to_message_id: Some(update.message_id),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<LinkButton>) -> Self {
        self.buttons = buttons;
        self
    }
}
