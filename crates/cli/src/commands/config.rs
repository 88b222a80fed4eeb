use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use boutiq_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key: &str, value: &str, env_key: &str| {
        lines.push(render_line(
            key,
            value,
            field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    };

    push("database.url", &config.database.url, "BOUTIQ_DATABASE_URL");
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "BOUTIQ_DATABASE_MAX_CONNECTIONS",
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "BOUTIQ_DATABASE_TIMEOUT_SECS",
    );

    push("whatsapp.api_base", &config.whatsapp.api_base, "BOUTIQ_WHATSAPP_API_BASE");
    push("whatsapp.verify_token", "<redacted>", "BOUTIQ_WHATSAPP_VERIFY_TOKEN");
    let app_secret = if config.whatsapp.app_secret.is_some() { "<redacted>" } else { "<unset>" };
    push("whatsapp.app_secret", app_secret, "BOUTIQ_WHATSAPP_APP_SECRET");

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    push("llm.api_key", llm_api_key, "BOUTIQ_LLM_API_KEY");
    push("llm.base_url", &config.llm.base_url, "BOUTIQ_LLM_BASE_URL");
    push("llm.model", &config.llm.model, "BOUTIQ_LLM_MODEL");
    push("llm.max_tokens", &config.llm.max_tokens.to_string(), "BOUTIQ_LLM_MAX_TOKENS");
    push("llm.timeout_secs", &config.llm.timeout_secs.to_string(), "BOUTIQ_LLM_TIMEOUT_SECS");

    push(
        "notifications.enabled",
        &config.notifications.enabled.to_string(),
        "BOUTIQ_NOTIFICATIONS_ENABLED",
    );

    push("server.bind_address", &config.server.bind_address, "BOUTIQ_SERVER_BIND_ADDRESS");
    push("server.port", &config.server.port.to_string(), "BOUTIQ_SERVER_PORT");

    push("logging.level", &config.logging.level, "BOUTIQ_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "BOUTIQ_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("boutiq.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/boutiq.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
