use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [telegram]
//                    token = "123:abc"
//
//   env var:         SEARCH_BOT_TELEGRAM__TOKEN=123:abc   (double underscore = nesting)
//
//   hosting:         PORT=10000   (bare variable, maps to server.port)
//
// SEARCH_BOT_WEBHOOK__SECRET pins the delivery secret across restarts.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub telegram: TelegramFileConfig,
    #[serde(default)]
    pub webhook: WebhookFileConfig,
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
    #[serde(default)]
    pub search: SearchFileConfig,
    #[serde(default)]
    pub runtime: RuntimeFileConfig,
}

/// Bot API credentials (lives under `[telegram]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramFileConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramFileConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_api_base(),
        }
    }
}

/// Public address the provider pushes updates to.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WebhookFileConfig {
    #[serde(default)]
    pub public_url: Option<String>,
    /// Shared secret the provider sends with every delivery. A random one is
    /// generated at startup when unset.
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Chat allow-list. When unset, every chat may use the bot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatFileConfig {
    #[serde(default)]
    pub authorized_chat_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchFileConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for SearchFileConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeFileConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    #[serde(default = "default_lane_idle_secs")]
    pub lane_idle_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeFileConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            handler_timeout_secs: default_handler_timeout_secs(),
            lane_idle_secs: default_lane_idle_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_max_results() -> usize {
    10
}
fn default_preview_chars() -> usize {
    100
}
fn default_queue_capacity() -> usize {
    256
}
fn default_handler_timeout_secs() -> u64 {
    30
}
fn default_lane_idle_secs() -> u64 {
    300
}
fn default_shutdown_grace_secs() -> u64 {
    10
}

/// Build a figment that layers: defaults → config.toml → SEARCH_BOT_* env vars → PORT.
///
/// Env vars use double-underscore for nesting into sections:
///   `SEARCH_BOT_CHAT__AUTHORIZED_CHAT_ID=-100123`  →  `chat.authorized_chat_id`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("SEARCH_BOT_").split("__"))
        .merge(Env::raw().filter_map(|key| {
            key.as_str()
                .eq_ignore_ascii_case("port")
                .then(|| "server.port".into())
        }))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, validated once at startup)
// =============================================================================

/// Everything the server needs to run, validated.
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: String,
    pub api_base: String,
    pub webhook_url: String,
    /// Expected in `X-Telegram-Bot-Api-Secret-Token` on every delivery
    pub webhook_secret: String,
    pub host: String,
    pub port: u16,
    pub authorized_chat_id: Option<i64>,
    pub search: SearchConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Upper bound on hits returned per query
    pub max_results: usize,
    /// Preview length in characters
    pub preview_chars: usize,
}

impl SearchConfig {
    pub fn from_file(fc: &SearchFileConfig) -> Self {
        Self {
            max_results: fc.max_results.max(1),
            preview_chars: fc.preview_chars.max(1),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from_file(&SearchFileConfig::default())
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub queue_capacity: usize,
    pub handler_timeout: Duration,
    pub lane_idle: Duration,
    pub shutdown_grace: Duration,
}

impl RuntimeConfig {
    pub fn from_file(fc: &RuntimeFileConfig) -> Self {
        Self {
            queue_capacity: fc.queue_capacity.max(1),
            handler_timeout: Duration::from_secs(fc.handler_timeout_secs.max(1)),
            lane_idle: Duration::from_secs(fc.lane_idle_secs.max(1)),
            shutdown_grace: Duration::from_secs(fc.shutdown_grace_secs),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_file(&RuntimeFileConfig::default())
    }
}

impl BotConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let token = fc
            .telegram
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .context("telegram.token is not set (SEARCH_BOT_TELEGRAM__TOKEN)")?;
        let public_url = fc
            .webhook
            .public_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .context("webhook.public_url is not set (SEARCH_BOT_WEBHOOK__PUBLIC_URL)")?;

        Ok(Self {
            token,
            api_base: fc.telegram.api_base.trim_end_matches('/').to_string(),
            webhook_url: webhook_url(&public_url),
            webhook_secret: webhook_secret(fc.webhook.secret.as_deref())?,
            host: fc.server.host.clone(),
            port: fc.server.port,
            authorized_chat_id: fc.chat.authorized_chat_id,
            search: SearchConfig::from_file(&fc.search),
            runtime: RuntimeConfig::from_file(&fc.runtime),
        })
    }
}

/// Join the public base URL with the webhook route. A bare host gets `https://`.
pub fn webhook_url(public_url: &str) -> String {
    let base = public_url.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}/webhook", base)
    } else {
        format!("https://{}/webhook", base)
    }
}

/// Validate the configured delivery secret, or generate one.
///
/// The provider accepts 1 to 256 characters from `A-Z`, `a-z`, `0-9`, `_`
/// and `-`.
pub fn webhook_secret(configured: Option<&str>) -> Result<String> {
    let Some(secret) = configured.map(str::trim).filter(|s| !s.is_empty()) else {
        info!("webhook.secret is not set, generated one for this run");
        return Ok(Uuid::new_v4().simple().to_string());
    };
    let valid_chars = secret
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if secret.len() > 256 || !valid_chars {
        anyhow::bail!(
            "webhook.secret must be at most 256 characters of A-Z, a-z, 0-9, _ and -"
        );
    }
    Ok(secret.to_string())
}

// =============================================================================
// Directory layout (derived from --data-dir, not tunable via figment)
// =============================================================================

#[derive(Clone, Debug)]
pub struct DataDirs {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl DataDirs {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".search-bot"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let db_path = data_dir.join("content.db");

        info!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir, db_path })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}
