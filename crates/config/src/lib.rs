//! Configuration loading, validation, and management for ChatRelay.
//!
//! Loads configuration from `~/.chatrelay/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use chatrelay_core::GenerationParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outbound limits below this leave no room for text after the truncation marker.
pub const MIN_MESSAGE_CHARS: usize = 32;

/// The root configuration structure.
///
/// Maps directly to `~/.chatrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Messaging platform settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Completion service settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Bot behavior (directive, input limit)
    #[serde(default)]
    pub bot: BotConfig,

    /// Conversation memory and cursor persistence
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Long-poll retry behavior
    #[serde(default)]
    pub poll: PollConfig,

    /// Webhook gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log level and destination
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram", &self.telegram)
            .field("completion", &self.completion)
            .field("bot", &self.bot)
            .field("memory", &self.memory)
            .field("poll", &self.poll)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll wait passed to getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Outbound messages longer than this are truncated
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    /// Disable link previews on replies
    #[serde(default = "default_true")]
    pub disable_web_page_preview: bool,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout_secs() -> u64 {
    25
}
fn default_max_message_chars() -> usize {
    3900
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            max_message_chars: default_max_message_chars(),
            webhook_secret: None,
            disable_web_page_preview: true,
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("max_message_chars", &self.max_message_chars)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("disable_web_page_preview", &self.disable_web_page_preview)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Whole-request timeout for one completion call
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    GenerationParams::default().model
}
fn default_temperature() -> f32 {
    GenerationParams::default().temperature
}
fn default_max_tokens() -> u32 {
    GenerationParams::default().max_tokens
}
fn default_top_p() -> f32 {
    GenerationParams::default().top_p
}
fn default_completion_timeout_secs() -> u64 {
    60
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    /// The fixed parameters attached to every completion request.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Directive sent as the first (system) message of every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Inputs longer than this (in characters) never reach the model
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a senior coding assistant. Help users debug code, analyze errors, suggest minimal fixes, and review code snippets.
Rules:
- Always give concise, actionable help.
- If asked about errors, suggest likely root causes and fixes.
- For code review, point out improvements, bugs, and style issues.
- For patch requests, provide a minimal, safe diff (unified format in ```diff).
- If info is missing, ask ONE clear follow-up question.
- Use code blocks for code/diff only.
- Never answer non-programming questions.";

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_max_input_chars() -> usize {
    16000
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// One `history_<chat>.json` file per conversation lives here
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    /// Where the last accepted update id is kept
    #[serde(default = "default_cursor_file")]
    pub cursor_file: PathBuf,

    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default = "default_max_history_chars")]
    pub max_history_chars: usize,
}

fn default_history_dir() -> PathBuf {
    AppConfig::config_dir().join("history")
}
fn default_cursor_file() -> PathBuf {
    AppConfig::config_dir().join("offset.dat")
}
fn default_max_turns() -> usize {
    24
}
fn default_max_history_chars() -> usize {
    6000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            cursor_file: default_cursor_file(),
            max_turns: default_max_turns(),
            max_history_chars: default_max_history_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// First delay after a failed fetch
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Upper bound for the doubling backoff
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,
}

fn default_retry_delay_secs() -> u64 {
    3
}
fn default_max_retry_delay_secs() -> u64 {
    30
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Route that receives pushed updates
    #[serde(default = "default_webhook_path")]
    pub path: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8443
}
fn default_webhook_path() -> String {
    "/webhook".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_webhook_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Verbose (debug-level) logging
    #[serde(default)]
    pub debug: bool,

    /// Log file; stderr when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.chatrelay/config.toml).
    ///
    /// Environment variables override file values:
    /// - `TELEGRAM_BOT_TOKEN`
    /// - `CHATRELAY_API_KEY`, then `OPENROUTER_API_KEY`
    /// - `CHATRELAY_MODEL`
    /// - `CHATRELAY_DEBUG`
    /// - `CHATRELAY_LOG_FILE`
    /// - `CHATRELAY_WEBHOOK_SECRET`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Credentials from the environment only fill gaps; everything else wins
    /// over the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.telegram.bot_token.is_none() {
            self.telegram.bot_token = lookup("TELEGRAM_BOT_TOKEN");
        }

        if self.completion.api_key.is_none() {
            self.completion.api_key =
                lookup("CHATRELAY_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if self.telegram.webhook_secret.is_none() {
            self.telegram.webhook_secret = lookup("CHATRELAY_WEBHOOK_SECRET");
        }

        if let Some(model) = lookup("CHATRELAY_MODEL") {
            self.completion.model = model;
        }

        if let Some(debug) = lookup("CHATRELAY_DEBUG") {
            self.logging.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(file) = lookup("CHATRELAY_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.completion;
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(c.top_p > 0.0 && c.top_p <= 1.0) {
            return Err(ConfigError::ValidationError(
                "completion.top_p must be in (0.0, 1.0]".into(),
            ));
        }
        if c.max_tokens == 0 || c.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "completion.max_tokens and completion.timeout_secs must be > 0".into(),
            ));
        }

        if self.bot.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "bot.max_input_chars must be > 0".into(),
            ));
        }

        if self.telegram.max_message_chars < MIN_MESSAGE_CHARS {
            return Err(ConfigError::ValidationError(format!(
                "telegram.max_message_chars must be at least {MIN_MESSAGE_CHARS}"
            )));
        }
        if self.telegram.poll_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "telegram.poll_timeout_secs must be > 0".into(),
            ));
        }

        if self.memory.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_turns must be > 0".into(),
            ));
        }

        let p = &self.poll;
        if p.retry_delay_secs == 0 || p.retry_delay_secs > p.max_retry_delay_secs {
            return Err(ConfigError::ValidationError(
                "poll.retry_delay_secs must be > 0 and <= poll.max_retry_delay_secs".into(),
            ));
        }

        if !self.gateway.path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "gateway.path must start with '/'".into(),
            ));
        }

        Ok(())
    }

    /// The bot token, or an error naming how to provide it.
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        self.telegram
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential("telegram.bot_token / TELEGRAM_BOT_TOKEN".into()))
    }

    /// The completion API key, or an error naming how to provide it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.completion
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential("completion.api_key / OPENROUTER_API_KEY".into()))
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            completion: CompletionConfig::default(),
            bot: BotConfig::default(),
            memory: MemoryConfig::default(),
            poll: PollConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing credential: set {0}")]
    MissingCredential(String),
}

impl From<ConfigError> for chatrelay_core::Error {
    fn from(err: ConfigError) -> Self {
        chatrelay_core::Error::Config {
            message: err.to_string(),
        }
    }
}
