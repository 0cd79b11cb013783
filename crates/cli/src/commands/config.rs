use std::env;
use std::fs;
use std::path::Path;

use relay_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        field("database.url", &["RELAY_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["RELAY_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["RELAY_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field("session.store", &["RELAY_SESSION_STORE"], format!("{:?}", config.session.store)),
        field(
            "session.max_choice_attempts",
            &["RELAY_SESSION_MAX_CHOICE_ATTEMPTS"],
            config.session.max_choice_attempts.to_string(),
        ),
        field("llm.provider", &["RELAY_LLM_PROVIDER"], format!("{:?}", config.llm.provider)),
        field("llm.model", &["RELAY_LLM_MODEL"], config.llm.model.clone()),
        field(
            "llm.base_url",
            &["RELAY_LLM_BASE_URL"],
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("llm.api_key", &["RELAY_LLM_API_KEY", "OPENAI_API_KEY"], api_key),
        field("llm.timeout_secs", &["RELAY_LLM_TIMEOUT_SECS"], config.llm.timeout_secs.to_string()),
        field(
            "llm.chat_temperature",
            &["RELAY_LLM_CHAT_TEMPERATURE"],
            config.llm.chat_temperature.to_string(),
        ),
        field(
            "llm.max_output_tokens",
            &["RELAY_LLM_MAX_OUTPUT_TOKENS"],
            config.llm.max_output_tokens.to_string(),
        ),
        field("calendar.time_zone", &["RELAY_CALENDAR_TIME_ZONE"], config.calendar.time_zone.clone()),
        field(
            "calendar.lookahead_days",
            &["RELAY_CALENDAR_LOOKAHEAD_DAYS"],
            config.calendar.lookahead_days.to_string(),
        ),
        field(
            "calendar.default_event_minutes",
            &["RELAY_CALENDAR_DEFAULT_EVENT_MINUTES"],
            config.calendar.default_event_minutes.to_string(),
        ),
        field(
            "whatsapp.webhook_path",
            &["RELAY_WHATSAPP_WEBHOOK_PATH"],
            config.whatsapp.webhook_path.clone(),
        ),
        field(
            "server.bind_address",
            &["RELAY_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["RELAY_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["RELAY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "logging.level",
            &["RELAY_LOGGING_LEVEL", "RELAY_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["RELAY_LOGGING_FORMAT", "RELAY_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    Field { key, env_keys, value }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn api_keys_keep_only_their_prefix() {
        assert_eq!(redact_key("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_key("plainsecret"), "<redacted>");
        assert_eq!(redact_key("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_file_document() {
        let doc: Value = "[llm]\nmodel = \"gpt-4o-mini\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
