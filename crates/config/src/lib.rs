//! Configuration loading, validation, and management for gradrelay.
//!
//! Loads configuration from `~/.gradrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Persona, scope and answer template used when the config does not
/// override `prompt.system_instructions`.
pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "\
Ты — ассистент для абитуриентов магистратуры ИТМО и эксперт по магистерским программам ИТМО. \
Твоя задача помогать выбирать подходящие программы и рекомендовать дисциплины на основе бэкграунда студента.

Правила общения:
1. Отвечай кратко и по делу
2. Задавай уточняющие вопросы, если информации недостаточно
3. Используй только официальные данные с сайта ИТМО
4. Для рекомендаций учитывай опыт и интересы абитуриента
5. Если пользователь использует нецензурную лексику или задает вопросы не по теме - отвечай, что можешь говорить только о теме поступления в ВУЗ

Шаблон ответа:
1. Сначала уточни интересы (например: \"Какое направление вас интересует: AI или AI Product?\")
2. Затем спроси про бэкграунд (например: \"Какой у вас опыт в программировании?\")
3. Дай рекомендации по выборным дисциплинам (например: \"Для вашего уровня рекомендую курсы: 1) Продвинутый Python, 2) Основы ML\")

Доступные программы:
- Магистратура по AI
- Магистратура по AI Product

Пример диалога:
Абитуриент: Хочу поступить в магистратуру
Ты: Какое направление вас интересует: Artificial Intelligence или AI Product Development?

Абитуриент: AI
Ты: Какой у вас опыт в программировании и machine learning?

Абитуриент: 2 года Python, базовый ML
Ты: Рекомендую следующие курсы:
1. Углубленный Machine Learning
2. Нейронные сети и Deep Learning
3. Обработка естественного языка";

/// The root configuration structure.
///
/// Maps directly to `~/.gradrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the inference provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default inference provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature; low values favour factual answers
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per completion (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Upper bound on a single inference call, in seconds
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_secs: u64,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Reference sources loaded at startup
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// Session keying and history bounds
    #[serde(default)]
    pub session: SessionConfig,

    /// Prompt assembly settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// User-facing replies
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Telegram transport
    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_provider() -> String {
    "mistral".into()
}
fn default_model() -> String {
    "mistral-large-latest".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_inference_timeout() -> u64 {
    60
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("inference_timeout_secs", &self.inference_timeout_secs)
            .field("providers", &self.providers)
            .field("reference", &self.reference)
            .field("session", &self.session)
            .field("prompt", &self.prompt)
            .field("reply", &self.reply)
            .field("telegram", &self.telegram)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Pages fetched once at startup, in prompt order
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Visible-text characters kept per source
    #[serde(default = "default_reference_max_chars")]
    pub max_chars: usize,
}

fn default_sources() -> Vec<String> {
    vec![
        "https://abit.itmo.ru/program/master/ai".into(),
        "https://abit.itmo.ru/program/master/ai_product".into(),
    ]
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_reference_max_chars() -> usize {
    5000
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_chars: default_reference_max_chars(),
        }
    }
}

/// How chat identities map onto history sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Every chat gets its own history. Members of a group chat share it.
    #[default]
    PerChat,
    /// Every sender within a chat gets its own history.
    PerSender,
    /// All chats share `default_session_id` (legacy behaviour).
    Shared,
}

impl FromStr for SessionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_chat" | "per-chat" | "chat" => Ok(Self::PerChat),
            "per_sender" | "per-sender" | "sender" => Ok(Self::PerSender),
            "shared" | "global" => Ok(Self::Shared),
            other => Err(ConfigError::ValidationError(format!(
                "unknown session mode '{other}', expected 'per_chat', 'per_sender' or 'shared'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: SessionMode,

    /// Session used by `shared` mode
    #[serde(default = "default_session_id")]
    pub default_session_id: String,

    /// Oldest messages are evicted past this count
    #[serde(default = "default_max_history_messages")]
    pub max_messages: usize,

    /// Optional estimated-token budget for a session's history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

fn default_session_id() -> String {
    "default".into()
}
fn default_max_history_messages() -> usize {
    40
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            default_session_id: default_session_id(),
            max_messages: default_max_history_messages(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_system_instructions")]
    pub system_instructions: String,

    /// Also embed the instructions into every augmented question
    #[serde(default)]
    pub repeat_instructions: bool,
}

fn default_system_instructions() -> String {
    DEFAULT_SYSTEM_INSTRUCTIONS.into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_instructions: default_system_instructions(),
            repeat_instructions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Answers are cut to this many characters before delivery
    #[serde(default = "default_reply_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Sent instead of an answer when a request fails
    #[serde(default = "default_error_notice")]
    pub error_notice: String,

    /// Confirmation sent after `/reset` clears the session
    #[serde(default = "default_reset_notice")]
    pub reset_notice: String,
}

fn default_reply_max_chars() -> usize {
    4000
}
fn default_greeting() -> String {
    "Привет! Я бот-консультант по магистратурам ИТМО. \
     Задай вопрос о программах AI или AI Product."
        .into()
}
fn default_error_notice() -> String {
    "Ошибка: не удалось получить ответ. Попробуйте ещё раз чуть позже.".into()
}
fn default_reset_notice() -> String {
    "История диалога очищена. Задайте новый вопрос.".into()
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            max_chars: default_reply_max_chars(),
            greeting: default_greeting(),
            error_notice: default_error_notice(),
            reset_notice: default_reset_notice(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Allowlist of numeric Telegram user IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,

    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}
fn default_poll_timeout() -> u64 {
    30
}
fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: default_allowed_users(),
            poll_timeout_secs: default_poll_timeout(),
            api_url: default_telegram_api_url(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.gradrelay/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply process environment overrides.
    ///
    /// Environment variables (highest priority):
    /// - `MISTRAL_API_KEY`, then `GRADRELAY_API_KEY` → `api_key`
    /// - `TOKEN`, then `GRADRELAY_TELEGRAM_TOKEN` → `telegram.bot_token`
    /// - `DEFAULT_SESSION_ID` → `session.default_session_id`
    /// - `GRADRELAY_SESSION_MODE` → `session.mode`
    /// - `GRADRELAY_MODEL` → `default_model`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("MISTRAL_API_KEY").or_else(|| var("GRADRELAY_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(token) = var("TOKEN").or_else(|| var("GRADRELAY_TELEGRAM_TOKEN")) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(session_id) = var("DEFAULT_SESSION_ID") {
            self.session.default_session_id = session_id;
        }
        if let Some(mode) = var("GRADRELAY_SESSION_MODE") {
            self.session.mode = mode.parse()?;
        }
        if let Some(model) = var("GRADRELAY_MODEL") {
            self.default_model = model;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".gradrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "inference_timeout_secs must be > 0".into(),
            ));
        }

        if self.reply.max_chars == 0 {
            return Err(ConfigError::ValidationError("reply.max_chars must be > 0".into()));
        }

        if self.reference.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "reference.max_chars must be > 0".into(),
            ));
        }

        if let Some(bad) = self
            .reference
            .sources
            .iter()
            .find(|s| !s.starts_with("http://") && !s.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "reference source '{bad}' must start with http:// or https://"
            )));
        }

        if self.session.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_messages must be > 0".into(),
            ));
        }

        if self.session.default_session_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.default_session_id must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
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
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            inference_timeout_secs: default_inference_timeout(),
            providers: HashMap::new(),
            reference: ReferenceConfig::default(),
            session: SessionConfig::default(),
            prompt: PromptConfig::default(),
            reply: ReplyConfig::default(),
            telegram: TelegramConfig::default(),
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
}
