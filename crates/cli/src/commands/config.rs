use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reviva_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// (key path, env override) for every field the command reports.
const FIELDS: &[(&str, &str)] = &[
    ("database.url", "REVIVA_DATABASE_URL"),
    ("database.max_connections", "REVIVA_DATABASE_MAX_CONNECTIONS"),
    ("database.timeout_secs", "REVIVA_DATABASE_TIMEOUT_SECS"),
    ("server.bind_address", "REVIVA_SERVER_BIND_ADDRESS"),
    ("server.port", "REVIVA_SERVER_PORT"),
    ("server.graceful_shutdown_secs", "REVIVA_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ("pricing.currency", "REVIVA_PRICING_CURRENCY"),
    ("pricing.quote_ttl_hours", "REVIVA_PRICING_QUOTE_TTL_HOURS"),
    ("pricing.catalog_refresh_secs", "REVIVA_PRICING_CATALOG_REFRESH_SECS"),
    ("notifications.webhook_url", "REVIVA_NOTIFICATIONS_WEBHOOK_URL"),
    ("notifications.webhook_token", "REVIVA_NOTIFICATIONS_WEBHOOK_TOKEN"),
    ("notifications.timeout_secs", "REVIVA_NOTIFICATIONS_TIMEOUT_SECS"),
    ("logging.level", "REVIVA_LOGGING_LEVEL"),
    ("logging.format", "REVIVA_LOGGING_FORMAT"),
];

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, env_key) in FIELDS {
        let value = effective_value(&config, key_path);
        let source =
            field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "database.url" => config.database.url.clone(),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "server.bind_address" => config.server.bind_address.clone(),
        "server.port" => config.server.port.to_string(),
        "server.graceful_shutdown_secs" => config.server.graceful_shutdown_secs.to_string(),
        "pricing.currency" => config.pricing.currency.clone(),
        "pricing.quote_ttl_hours" => config.pricing.quote_ttl_hours.to_string(),
        "pricing.catalog_refresh_secs" => config.pricing.catalog_refresh_secs.to_string(),
        "notifications.webhook_url" => {
            config.notifications.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string())
        }
        "notifications.webhook_token" => match &config.notifications.webhook_token {
            Some(token) => redact_token(token.expose_secret()),
            None => "<unset>".to_string(),
        },
        "notifications.timeout_secs" => config.notifications.timeout_secs.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("reviva.toml"), PathBuf::from("config/reviva.toml")]
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
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 8 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}
