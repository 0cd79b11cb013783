use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::engine::DEFAULT_MAX_CHOICE_ATTEMPTS;

pub const CONFIG_FILE_CANDIDATES: &[&str] = &["relay.toml", "config/relay.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub whatsapp: WhatsAppConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub store: SessionStoreKind,
    pub max_choice_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub chat_temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub time_zone: String,
    pub lookahead_days: u32,
    pub default_event_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub webhook_path: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStoreKind {
    Memory,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub session_store: Option<SessionStoreKind>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://relay.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            session: SessionConfig {
                store: SessionStoreKind::Memory,
                max_choice_attempts: DEFAULT_MAX_CHOICE_ATTEMPTS,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-3.5-turbo".to_string(),
                timeout_secs: 30,
                chat_temperature: 0.7,
                max_output_tokens: 150,
            },
            calendar: CalendarConfig {
                time_zone: "America/Mexico_City".to_string(),
                lookahead_days: 7,
                default_event_minutes: 60,
            },
            whatsapp: WhatsAppConfig { webhook_path: "/whatsapp".to_string() },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for SessionStoreKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported session store `{other}` (expected memory|sqlite)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// Chat-completions endpoint for the configured provider.
    pub fn completions_url(&self) -> String {
        let base = match (&self.base_url, self.provider) {
            (Some(base_url), _) => base_url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => "https://api.openai.com/v1".to_string(),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1".to_string(),
        };
        format!("{base}/chat/completions")
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("relay.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(store) = session.store {
                self.session.store = store;
            }
            if let Some(max_choice_attempts) = session.max_choice_attempts {
                self.session.max_choice_attempts = max_choice_attempts;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(chat_temperature) = llm.chat_temperature {
                self.llm.chat_temperature = chat_temperature;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(time_zone) = calendar.time_zone {
                self.calendar.time_zone = time_zone;
            }
            if let Some(lookahead_days) = calendar.lookahead_days {
                self.calendar.lookahead_days = lookahead_days;
            }
            if let Some(default_event_minutes) = calendar.default_event_minutes {
                self.calendar.default_event_minutes = default_event_minutes;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(webhook_path) = whatsapp.webhook_path {
                self.whatsapp.webhook_path = webhook_path;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RELAY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("RELAY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("RELAY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("RELAY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("RELAY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RELAY_SESSION_STORE") {
            self.session.store = value.parse()?;
        }
        if let Some(value) = read_env("RELAY_SESSION_MAX_CHOICE_ATTEMPTS") {
            self.session.max_choice_attempts =
                parse_u32("RELAY_SESSION_MAX_CHOICE_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("RELAY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("RELAY_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RELAY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("RELAY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("RELAY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("RELAY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RELAY_LLM_CHAT_TEMPERATURE") {
            self.llm.chat_temperature = parse_f32("RELAY_LLM_CHAT_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("RELAY_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("RELAY_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }

        if let Some(value) = read_env("RELAY_CALENDAR_TIME_ZONE") {
            self.calendar.time_zone = value;
        }
        if let Some(value) = read_env("RELAY_CALENDAR_LOOKAHEAD_DAYS") {
            self.calendar.lookahead_days = parse_u32("RELAY_CALENDAR_LOOKAHEAD_DAYS", &value)?;
        }
        if let Some(value) = read_env("RELAY_CALENDAR_DEFAULT_EVENT_MINUTES") {
            self.calendar.default_event_minutes =
                parse_u32("RELAY_CALENDAR_DEFAULT_EVENT_MINUTES", &value)?;
        }

        if let Some(value) = read_env("RELAY_WHATSAPP_WEBHOOK_PATH") {
            self.whatsapp.webhook_path = value;
        }

        if let Some(value) = read_env("RELAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RELAY_SERVER_PORT") {
            self.server.port = parse_u16("RELAY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("RELAY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("RELAY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("RELAY_LOGGING_LEVEL").or_else(|| read_env("RELAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("RELAY_LOGGING_FORMAT").or_else(|| read_env("RELAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(session_store) = overrides.session_store {
            self.session.store = session_store;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database, self.session.store)?;
        validate_session(&self.session)?;
        validate_llm(&self.llm)?;
        validate_calendar(&self.calendar)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig, store: SessionStoreKind) -> Result<(), ConfigError> {
    if store != SessionStoreKind::Sqlite {
        return Ok(());
    }

    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.max_choice_attempts == 0 {
        return Err(ConfigError::Validation(
            "session.max_choice_attempts must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.chat_temperature) {
        return Err(ConfigError::Validation(
            "llm.chat_temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.provider == LlmProvider::OpenAi {
        let missing =
            llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider (set RELAY_LLM_API_KEY)"
                    .to_string(),
            ));
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_calendar(calendar: &CalendarConfig) -> Result<(), ConfigError> {
    if calendar.time_zone.trim().is_empty() {
        return Err(ConfigError::Validation("calendar.time_zone must not be empty".to_string()));
    }
    if calendar.lookahead_days == 0 || calendar.lookahead_days > 366 {
        return Err(ConfigError::Validation(
            "calendar.lookahead_days must be in range 1..=366".to_string(),
        ));
    }
    if calendar.default_event_minutes == 0 {
        return Err(ConfigError::Validation(
            "calendar.default_event_minutes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    let path = whatsapp.webhook_path.trim();
    if !path.starts_with('/') || path.len() < 2 {
        return Err(ConfigError::Validation(
            "whatsapp.webhook_path must start with `/` and name a route".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    session: Option<SessionPatch>,
    llm: Option<LlmPatch>,
    calendar: Option<CalendarPatch>,
    whatsapp: Option<WhatsAppPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    store: Option<SessionStoreKind>,
    max_choice_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    chat_temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    time_zone: Option<String>,
    lookahead_days: Option<u32>,
    default_event_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    webhook_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat,
        SessionStoreKind,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOUCHED_VARS: &[&str] = &[
        "RELAY_LLM_API_KEY",
        "OPENAI_API_KEY",
        "RELAY_LLM_PROVIDER",
        "RELAY_LOG_LEVEL",
        "RELAY_LOG_FORMAT",
        "RELAY_SESSION_STORE",
        "RELAY_DATABASE_URL",
        "RELAY_SERVER_PORT",
        "TEST_RELAY_API_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in TOUCHED_VARS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_RELAY_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("relay.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_RELAY_API_KEY}"
model = "gpt-4o-mini"

[calendar]
time_zone = "America/Bogota"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(config.llm.model == "gpt-4o-mini", "model should come from the file")?;
            ensure(config.calendar.time_zone == "America/Bogota", "zone should come from file")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("RELAY_LLM_API_KEY", "sk-env");
        env::set_var("RELAY_SERVER_PORT", "7000");
        env::set_var("RELAY_SESSION_STORE", "sqlite");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("relay.toml");
            fs::write(
                &path,
                r#"
[server]
port = 6000

[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite::memory:".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 7000, "env port should win over file")?;
            ensure(config.database.url == "sqlite::memory:", "override database url should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.session.store == SessionStoreKind::Sqlite, "env store should apply")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("RELAY_LLM_PROVIDER", "ollama");
        env::set_var("RELAY_LOG_LEVEL", "warn");
        env::set_var("RELAY_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::Ollama, "ollama needs no api key")?;
            ensure(config.logging.level == "warn", "log level should be set from env var")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "json format from env")?;
            ensure(
                config.llm.completions_url() == "http://localhost:11434/v1/chat/completions",
                "ollama default endpoint",
            )?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected validation failure without an api key".to_string()),
            Err(error) => error,
        };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("llm.api_key")
        );
        ensure(has_message, "validation failure should mention llm.api_key")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_api_key: Some("sk-very-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("sk-very-secret"), "debug output should not contain the api key")?;
        ensure(
            config.llm.completions_url() == "https://api.openai.com/v1/chat/completions",
            "openai default endpoint",
        )
    }
}
