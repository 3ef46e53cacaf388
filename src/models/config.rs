//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Prefix for environment variables that override file values.
pub const ENV_PREFIX: &str = "CHAPTER_NOTIFIER__";

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Discord credentials and channels
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Release listing source and fetch behavior
    #[serde(default)]
    pub source: SourceConfig,

    /// Watched series
    #[serde(default)]
    pub watch: WatchConfig,

    /// Poll cadence
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Collected chapter database
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the commented default template unless the file already exists.
    ///
    /// Returns `true` when a new file was written.
    pub fn write_template(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, CONFIG_TEMPLATE)?;
        Ok(true)
    }

    /// Apply `CHAPTER_NOTIFIER__*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_from(std::env::vars());
    }

    /// Apply overrides from an explicit set of variables.
    ///
    /// Empty values and unparseable numbers are ignored.
    pub fn apply_env_from<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            match name {
                "DISCORD_TOKEN" => self.discord.token = value.to_string(),
                "DISCORD_CHANNEL_ID" => self.discord.channel_id = value.to_string(),
                "DISCORD_ERROR_CHANNEL_ID" => {
                    self.discord.error_channel_id = Some(value.to_string())
                }
                "DATABASE" => self.storage.database = value.to_string(),
                "LOG_LEVEL" => self.logging.level = value.to_string(),
                "SOURCE_URL" => self.source.url = value.to_string(),
                "WATCHED" => {
                    self.watch.subjects = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                "INTERVAL_MINUTES" => match value.parse::<u64>() {
                    Ok(minutes) if minutes > 0 => self.schedule.interval_minutes = minutes,
                    _ => log::warn!("Ignoring invalid {}{}={}", ENV_PREFIX, name, value),
                },
                _ => log::debug!("Unknown override {}{}", ENV_PREFIX, name),
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            return Err(AppError::config("discord.token is empty"));
        }
        if self.discord.channel_id.trim().is_empty() {
            return Err(AppError::config("discord.channel_id is empty"));
        }
        if self.storage.database.trim().is_empty() {
            return Err(AppError::config("storage.database is empty"));
        }
        if self.source.url.trim().is_empty() {
            return Err(AppError::config("source.url is empty"));
        }
        url::Url::parse(&self.source.url)?;
        if self.source.timeout_secs == 0 {
            return Err(AppError::config("source.timeout_secs must be > 0"));
        }
        if self.discord.timeout_secs == 0 {
            return Err(AppError::config("discord.timeout_secs must be > 0"));
        }
        if self.source.max_concurrent_notifications == 0 {
            return Err(AppError::config(
                "source.max_concurrent_notifications must be > 0",
            ));
        }
        self.schedule.interval()?;
        if self.watch.subjects.iter().all(|s| s.trim().is_empty()) {
            return Err(AppError::config("No watched subjects defined"));
        }
        Ok(())
    }

    /// Channel used for error and resolution reports.
    pub fn alert_channel_id(&self) -> &str {
        self.discord
            .error_channel_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(&self.discord.channel_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord: DiscordConfig::default(),
            source: SourceConfig::default(),
            watch: WatchConfig::default(),
            schedule: ScheduleConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Discord bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token
    #[serde(default)]
    pub token: String,

    /// Channel receiving release notifications
    #[serde(default)]
    pub channel_id: String,

    /// Channel receiving error/resolution reports (defaults to `channel_id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_channel_id: Option<String>,

    /// REST API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Timeout for one message post in seconds
    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: String::new(),
            error_channel_id: None,
            api_base: defaults::api_base(),
            timeout_secs: defaults::notify_timeout(),
        }
    }
}

/// Release listing source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Listing page, also the base for relative chapter links
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum notifications in flight during one cycle
    #[serde(default = "defaults::max_concurrent_notifications")]
    pub max_concurrent_notifications: usize,

    /// CSS selectors for candidate blocks
    #[serde(default)]
    pub selectors: ListingSelectors,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            max_concurrent_notifications: defaults::max_concurrent_notifications(),
            selectors: ListingSelectors::default(),
        }
    }
}

/// CSS selectors for scraping the release listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each candidate block
    #[serde(default = "defaults::card_selector")]
    pub card_selector: String,

    /// Selector for the element holding title text and link
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// HTML attribute on the title element holding the link
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Selector for the chapter sub-title
    #[serde(default = "defaults::detail_selector")]
    pub detail_selector: String,

    /// Selector for the element holding the release time
    #[serde(default = "defaults::time_selector")]
    pub time_selector: String,

    /// HTML attribute on the time element holding the release time
    #[serde(default = "defaults::time_attr")]
    pub time_attr: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card_selector: defaults::card_selector(),
            title_selector: defaults::title_selector(),
            link_attr: defaults::link_attr(),
            detail_selector: defaults::detail_selector(),
            time_selector: defaults::time_selector(),
            time_attr: defaults::time_attr(),
        }
    }
}

/// Watched series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Exact series names, case-sensitive
    #[serde(default = "defaults::subjects")]
    pub subjects: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            subjects: defaults::subjects(),
        }
    }
}

/// Poll cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between the start of two cycles
    #[serde(default = "defaults::interval_minutes")]
    pub interval_minutes: u64,
}

impl ScheduleConfig {
    /// Poll interval, rejecting zero and anything above [`MAX_INTERVAL_MINUTES`].
    pub fn interval(&self) -> Result<Duration> {
        match self.interval_minutes {
            0 => Err(AppError::config("schedule.interval_minutes must be > 0")),
            m if m > MAX_INTERVAL_MINUTES => Err(AppError::config(format!(
                "schedule.interval_minutes must be <= {MAX_INTERVAL_MINUTES}, got {m}"
            ))),
            m => Ok(Duration::from_secs(m * 60)),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::interval_minutes(),
        }
    }
}

/// Collected chapter database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file path
    #[serde(default = "defaults::database")]
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: defaults::database(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of "error", "warn", "info", "debug", "trace"
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    pub fn api_base() -> String {
        "https://discord.com/api/v10".into()
    }
    pub fn notify_timeout() -> u64 {
        30
    }

    pub fn source_url() -> String {
        "https://tcbscans.me".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; chapter-notifier/0.1)".into()
    }
    pub fn fetch_timeout() -> u64 {
        120
    }
    pub fn max_concurrent_notifications() -> usize {
        1
    }

    // Listing selectors
    pub fn card_selector() -> String {
        "div.bg-card".into()
    }
    pub fn title_selector() -> String {
        "a.text-white.text-lg.font-bold".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn detail_selector() -> String {
        "div.mb-3 > div".into()
    }
    pub fn time_selector() -> String {
        "time-ago".into()
    }
    pub fn time_attr() -> String {
        "datetime".into()
    }

    pub fn subjects() -> Vec<String> {
        vec!["One Piece".into(), "Jujutsu Kaisen".into()]
    }
    pub fn interval_minutes() -> u64 {
        15
    }
    pub fn database() -> String {
        "collected_chapters.db".into()
    }
    pub fn log_level() -> String {
        "info".into()
    }
}

const CONFIG_TEMPLATE: &str = r#"# chapter-notifier configuration
#
# Every value can be overridden with a CHAPTER_NOTIFIER__* environment
# variable, e.g. CHAPTER_NOTIFIER__DISCORD_TOKEN.

[discord]
# Bot token (required)
token = ""

# Channel receiving new chapter notifications (required)
channel_id = ""

# Channel receiving error and resolution reports
# Default: same as channel_id
#error_channel_id = ""

[source]
# Default: "https://tcbscans.me"
#url = "https://tcbscans.me"

# Request timeout in seconds
# Default: 120
#timeout_secs = 120

[watch]
# Exact series names, case-sensitive
subjects = ["One Piece", "Jujutsu Kaisen"]

[schedule]
# Minutes between checks
# Default: 15
interval_minutes = 15

[storage]
# SQLite file holding already notified chapters
database = "collected_chapters.db"

[logging]
# Options: "error", "warn", "info", "debug", "trace"
level = "info"
"#;
