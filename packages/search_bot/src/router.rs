//! Command routing: maps a parsed update to exactly one handler.
//!
//! The router is the only place that decides whether a chat may talk to the
//! bot. Everything below it (search engine, repository) trusts the owner id it
//! is handed.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{BotError, BotResult};
use crate::metrics::ServerMetrics;
use crate::models::{InboundUpdate, LinkButton, MessageRef, NewContentRecord, Reply};
use crate::repository::ContentRepository;
use crate::search::{SearchEngine, SearchQuery, preview};
use crate::telegram::BotCommand;

const INTERNAL_ERROR_TEXT: &str = "Something went wrong on our side. Please try again later.";

/// Inline button labels are cut to this many characters.
const BUTTON_LABEL_CHARS: usize = 40;

/// The closed set of commands the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Help,
    Search,
    List,
    Delete,
    Save,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Help,
        Command::Search,
        Command::List,
        Command::Delete,
        Command::Save,
    ];

    /// Resolve a lower-cased command token. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "start" | "help" => Some(Command::Help),
            "search" | "buscar" => Some(Command::Search),
            "list" => Some(Command::List),
            "delete" => Some(Command::Delete),
            "save" => Some(Command::Save),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Search => "search",
            Command::List => "list",
            Command::Delete => "delete",
            Command::Save => "save",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Command::Help => "/help",
            Command::Search => "/search <keyword>",
            Command::List => "/list [page]",
            Command::Delete => "/delete <id>",
            Command::Save => "/save <text>, or reply /save to a message",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Help => "Show available commands",
            Command::Search => "Search your saved items by keyword",
            Command::List => "List your saved items",
            Command::Delete => "Delete one of your saved items",
            Command::Save => "Save text or the replied message",
        }
    }

    /// Command menu published to the provider at startup.
    pub fn menu() -> Vec<BotCommand> {
        Self::ALL
            .iter()
            .map(|c| BotCommand {
                command: c.name().to_string(),
                description: c.description().to_string(),
            })
            .collect()
    }
}

pub struct CommandRouter {
    repository: Arc<ContentRepository>,
    search: SearchEngine,
    authorized_chat_id: Option<i64>,
    metrics: Arc<ServerMetrics>,
}

impl CommandRouter {
    pub fn new(
        repository: Arc<ContentRepository>,
        search: SearchEngine,
        authorized_chat_id: Option<i64>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            repository,
            search,
            authorized_chat_id,
            metrics,
        }
    }

    /// Handle one update. `None` means the bot stays silent.
    pub async fn dispatch(&self, update: &InboundUpdate) -> Option<Reply> {
        if let Err(e) = self.authorize(update) {
            debug!("Dropping update: {}", e);
            return None;
        }

        let Some(command) = Command::parse(&update.command) else {
            debug!("Ignoring unknown command /{}", update.command);
            return None;
        };

        match self.handle(command, update).await {
            Ok(reply) => Some(reply),
            Err(BotError::MalformedInput(reason)) => {
                debug!("Bad /{} from {}: {}", command.name(), update.sender_id, reason);
                Some(Reply::to(update, format!("Usage: {}", command.usage())))
            }
            Err(e) => {
                self.metrics.handler_error();
                error!(
                    "/{} failed for chat {} (message {}): {}",
                    command.name(),
                    update.chat_id,
                    update.message_id,
                    e
                );
                Some(Reply::to(update, INTERNAL_ERROR_TEXT))
            }
        }
    }

    fn authorize(&self, update: &InboundUpdate) -> BotResult<()> {
        match self.authorized_chat_id {
            Some(allowed) if allowed != update.chat_id => Err(BotError::Unauthorized {
                chat_id: update.chat_id,
            }),
            _ => Ok(()),
        }
    }

    async fn handle(&self, command: Command, update: &InboundUpdate) -> BotResult<Reply> {
        match command {
            Command::Help => Ok(self.help(update)),
            Command::Search => self.search(update).await,
            Command::List => self.list(update).await,
            Command::Delete => self.delete(update).await,
            Command::Save => self.save(update).await,
        }
    }

    fn help(&self, update: &InboundUpdate) -> Reply {
        let mut text = String::from("I keep your saved texts and find them again.\n\n");
        for command in Command::ALL {
            text.push_str(&format!("{} - {}\n", command.usage(), command.description()));
        }
        Reply::to(update, text.trim_end())
    }

    async fn search(&self, update: &InboundUpdate) -> BotResult<Reply> {
        let query = SearchQuery::new(update.sender_id, &update.raw_args)?;
        let results = self.search.search(&query).await?;
        let hits = &results.hits;

        if hits.is_empty() {
            return Ok(Reply::to(
                update,
                format!("No results for \"{}\".", query.keyword()),
            ));
        }

        let mut text = format!("Results for \"{}\":\n", query.keyword());
        let mut buttons = Vec::new();
        for (i, hit) in hits.iter().enumerate() {
            text.push_str(&format!("\n{}. [#{}] {}", i + 1, hit.record_id, hit.preview));
            if let Some(url) = &hit.link {
                buttons.push(LinkButton {
                    label: format!("{}. {}", i + 1, preview(&hit.preview, BUTTON_LABEL_CHARS)),
                    url: url.clone(),
                });
            }
        }
        if results.truncated {
            text.push_str(&format!(
                "\n\nShowing the first {} matches. Refine the keyword to narrow down.",
                hits.len()
            ));
        }

        Ok(Reply::to(update, text).with_buttons(buttons))
    }

    async fn list(&self, update: &InboundUpdate) -> BotResult<Reply> {
        let page = match update.args.first() {
            None => 1,
            Some(arg) => arg
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| BotError::MalformedInput(format!("invalid page {:?}", arg)))?,
        };

        let per_page = self.search.max_results() as i64;
        let result = self
            .repository
            .list_page_by_owner(update.sender_id, page, per_page)
            .await?;

        if result.total == 0 {
            return Ok(Reply::to(update, "You have no saved items yet."));
        }
        if result.items.is_empty() {
            return Ok(Reply::to(
                update,
                format!(
                    "Page {} is empty. You have {} page(s).",
                    result.page, result.total_pages
                ),
            ));
        }

        let mut text = format!(
            "Your items (page {}/{}, {} total):\n",
            result.page, result.total_pages, result.total
        );
        for record in &result.items {
            text.push_str(&format!(
                "\n[#{}] {}",
                record.id,
                preview(&record.body, self.search.preview_chars())
            ));
        }
        Ok(Reply::to(update, text))
    }

    async fn delete(&self, update: &InboundUpdate) -> BotResult<Reply> {
        let id = update
            .args
            .first()
            .map(|a| a.trim_start_matches('#'))
            .and_then(|a| a.parse::<i64>().ok())
            .ok_or_else(|| BotError::MalformedInput("missing or invalid id".to_string()))?;

        // Someone else's id and a missing id look the same to the caller
        if self.repository.delete(update.sender_id, id).await? {
            info!("User {} deleted record {}", update.sender_id, id);
            Ok(Reply::to(update, format!("Deleted item #{}.", id)))
        } else {
            Ok(Reply::to(update, format!("Item #{} not found.", id)))
        }
    }

    async fn save(&self, update: &InboundUpdate) -> BotResult<Reply> {
        let quoted = update
            .reply_to
            .as_ref()
            .and_then(|q| q.text.as_deref().map(|text| (q.message_id, text)));

        let record = match quoted {
            Some((message_id, text)) if !text.trim().is_empty() => {
                NewContentRecord::new(update.sender_id, text.trim())
                    .with_source(MessageRef::new(update.chat_id, message_id))
            }
            _ if !update.raw_args.is_empty() => {
                NewContentRecord::new(update.sender_id, update.raw_args.as_str())
                    .with_source(update.origin())
            }
            _ => {
                return Err(BotError::MalformedInput("nothing to save".to_string()));
            }
        }
        .with_origin(update.origin());

        let outcome = self.repository.insert_record(&record).await?;
        if outcome.created {
            info!("User {} saved record {}", update.sender_id, outcome.id);
            Ok(Reply::to(update, format!("Saved as #{}.", outcome.id)))
        } else {
            Ok(Reply::to(update, format!("Already saved as #{}.", outcome.id)))
        }
    }
}
