// Settings files for the scanner and the chat notifier.
//
// Scanner settings: `~/.tidewatch/settings.json`
// Notifier settings: `~/.tidewatch/discord_settings.json`
//
// Files ending in `.toml` are parsed as TOML, everything else as JSON.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tidewatch_common::notify::{
    fits_message_limit, format_batches, role_mention, scan_summary, status_url, DEFAULT_CHUNK_SIZE,
    MESSAGE_CHAR_LIMIT,
};
use tidewatch_common::Query;

use crate::security::restrict_to_owner;

/// Environment override for the state directory.
pub const HOME_ENV: &str = "TIDEWATCH_HOME";

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DISCORD_SETTINGS_FILE_NAME: &str = "discord_settings.json";

/// Root directory for tidewatch state: `$TIDEWATCH_HOME` or `~/.tidewatch/`.
pub fn global_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::home_dir().map(|h| h.join(".tidewatch"))
}

pub fn settings_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join(SETTINGS_FILE_NAME))
}

pub fn discord_settings_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join(DISCORD_SETTINGS_FILE_NAME))
}

// ── Scanner config ─────────────────────────────────────────────────

/// Everything one scan cycle needs. Built once at startup and passed by
/// reference; nothing here is mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ScannerConfig {
    /// Queries evaluated in order, once per cycle.
    pub queries: Vec<Query>,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub notify: NotifyConfig,
    pub schedule: ScheduleConfig,
}

impl ScannerConfig {
    /// Load from `~/.tidewatch/settings.json`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = settings_path().ok_or_else(missing_home)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_settings(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_settings(self, path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(index) = self.queries.iter().position(|q| q.filter_expression().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "query #{index} has neither a username nor a search_string"
            )));
        }
        if self.notify.chunk_size == 0 {
            return Err(ConfigError::Invalid("notify.chunk_size must be at least 1".into()));
        }
        if let Some(chars) = self.largest_message() {
            return Err(ConfigError::Invalid(format!(
                "notify.chunk_size {} can produce a {chars}-character message, over the \
                 {MESSAGE_CHAR_LIMIT}-character limit",
                self.notify.chunk_size
            )));
        }
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::Invalid("schedule.interval_secs must be at least 1".into()));
        }
        if self.search.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "search.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.cache.max_ids_per_query == Some(0) {
            return Err(ConfigError::Invalid(
                "cache.max_ids_per_query must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    /// Length of the longest first message a full chunk of the longest
    /// possible ids could render, if that is over the message limit.
    fn largest_message(&self) -> Option<usize> {
        let chunk = self.notify.chunk_size;
        let widest_id = u64::MAX.to_string();
        let header = role_mention(u64::MAX);

        let candidates: Vec<String> = if self.notify.include_summary {
            let ids = vec![widest_id; chunk];
            self.queries.iter().map(|query| scan_summary(query, &ids)).collect()
        } else {
            vec![vec![status_url(&widest_id); chunk].join("\n")]
        };

        candidates
            .iter()
            .filter_map(|body| format_batches(&[body], 1, Some(header.as_str())).ok()?.pop())
            .filter(|text| !fits_message_limit(text))
            .map(|text| text.chars().count())
            .max()
    }
}

/// Search endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Endpoint prefix; the percent-encoded filter is appended verbatim.
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://twitter.com/i/search/timeline?f=tweets&q=".into(),
            user_agent: concat!("tidewatch/", env!("CARGO_PKG_VERSION")).into(),
            request_timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Known-id retention per query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Most-recent ids kept per query. `None` keeps everything.
    pub max_ids_per_query: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_ids_per_query: Some(100) }
    }
}

/// Message formatting and delivery pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    /// Items per message.
    pub chunk_size: usize,
    /// Pause between messages so link previews render.
    pub inter_batch_delay_ms: u64,
    /// Post a per-query summary line instead of bare status URLs.
    pub include_summary: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, inter_batch_delay_ms: 1500, include_summary: false }
    }
}

impl NotifyConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

/// Fixed-interval timer driving the daemon loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ── Notifier config ────────────────────────────────────────────────

/// Chat destination for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscordSettings {
    /// Bot token. Empty means "look in the OS keychain".
    #[serde(default)]
    pub discord_bot_token: String,
    pub channel_id_to_ping: u64,
    /// Role mentioned on the first message of a reporting cycle.
    #[serde(default)]
    pub role_id_to_ping: Option<u64>,
}

impl DiscordSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let path = discord_settings_path().ok_or_else(missing_home)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        read_settings(path)
    }

    /// Token files are written owner-only.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_settings(self, path)
    }
}

// ── File helpers ───────────────────────────────────────────────────

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn read_settings<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    if is_toml(path) {
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn write_settings<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        restrict_to_owner(parent)
            .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))?;
    }
    let contents = if is_toml(path) {
        toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string()))?
    } else {
        serde_json::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string()))?
    };
    std::fs::write(path, contents).map_err(ConfigError::Io).and_then(|_| {
        restrict_to_owner(path)
            .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))
    })
}

fn missing_home() -> ConfigError {
    ConfigError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "could not determine home directory",
    ))
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Serialize(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::Invalid(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
