use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use opsdesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One displayed setting: dotted key, effective value, env vars that can override it.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn setting(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Setting {
    Setting { key, value: value.into(), env_keys }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in settings(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        setting("database.url", &config.database.url, &["OPSDESK_DATABASE_URL"]),
        setting(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["OPSDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        setting(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["OPSDESK_DATABASE_TIMEOUT_SECS"],
        ),
        setting("llm.provider", config.llm.provider.as_str(), &["OPSDESK_LLM_PROVIDER"]),
        setting("llm.model", &config.llm.model, &["OPSDESK_LLM_MODEL"]),
        setting("llm.base_url", &config.llm.base_url, &["OPSDESK_LLM_BASE_URL"]),
        setting("llm.api_key", api_key, &["OPSDESK_LLM_API_KEY", "GEMINI_API_KEY"]),
        setting(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["OPSDESK_LLM_TEMPERATURE"],
        ),
        setting("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["OPSDESK_LLM_TIMEOUT_SECS"]),
        setting("server.bind_address", &config.server.bind_address, &["OPSDESK_SERVER_BIND_ADDRESS"]),
        setting("server.port", config.server.port.to_string(), &["OPSDESK_SERVER_PORT"]),
        setting(
            "server.cors_origins",
            config.server.cors_origins.join(","),
            &["OPSDESK_SERVER_CORS_ORIGINS"],
        ),
        setting(
            "outreach.report_dir",
            config.outreach.report_dir.display().to_string(),
            &["OPSDESK_OUTREACH_REPORT_DIR"],
        ),
        setting(
            "outreach.decision_turn",
            config.outreach.decision_turn.to_string(),
            &["OPSDESK_OUTREACH_DECISION_TURN"],
        ),
        setting(
            "outreach.max_turns",
            config.outreach.max_turns.to_string(),
            &["OPSDESK_OUTREACH_MAX_TURNS"],
        ),
        setting(
            "whatsapp.enabled",
            config.whatsapp.enabled.to_string(),
            &["OPSDESK_WHATSAPP_ENABLED"],
        ),
        setting(
            "logging.level",
            &config.logging.level,
            &["OPSDESK_LOGGING_LEVEL", "OPSDESK_LOG_LEVEL"],
        ),
        setting(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["OPSDESK_LOGGING_FORMAT", "OPSDESK_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("opsdesk.toml"), PathBuf::from("config/opsdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
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

/// Keeps the last four characters so two keys can be told apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
