use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub notifications: NotificationsConfig,
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
pub struct WhatsAppConfig {
    pub api_base: String,
    pub verify_token: String,
    /// Shared secret for inbound signature verification. Absent means
    /// verification is bypassed (development mode).
    pub app_secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Operator notification channel: one process-wide WhatsApp credential
/// used to alert merchant owners about new orders.
#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub phone_number_id: Option<String>,
    pub token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub whatsapp_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
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
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://boutiq.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            whatsapp: WhatsAppConfig {
                api_base: "https://graph.facebook.com/v19.0".to_string(),
                verify_token: "boutiq_verify".to_string(),
                app_secret: None,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-5-sonnet-latest".to_string(),
                max_tokens: 1024,
                timeout_secs: 30,
            },
            notifications: NotificationsConfig {
                enabled: false,
                phone_number_id: None,
                token: None,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("boutiq.toml"));
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

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(api_base) = whatsapp.api_base {
                self.whatsapp.api_base = api_base;
            }
            if let Some(verify_token) = whatsapp.verify_token {
                self.whatsapp.verify_token = verify_token;
            }
            if let Some(app_secret_value) = whatsapp.app_secret {
                self.whatsapp.app_secret = Some(secret_value(app_secret_value));
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(phone_number_id) = notifications.phone_number_id {
                self.notifications.phone_number_id = Some(phone_number_id);
            }
            if let Some(token_value) = notifications.token {
                self.notifications.token = Some(secret_value(token_value));
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("BOUTIQ_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("BOUTIQ_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("BOUTIQ_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("BOUTIQ_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("BOUTIQ_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BOUTIQ_WHATSAPP_API_BASE") {
            self.whatsapp.api_base = value;
        }
        if let Some(value) = read_env("BOUTIQ_WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = value;
        }
        if let Some(value) = read_env("BOUTIQ_WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = Some(secret_value(value));
        }

        if let Some(value) = read_env("BOUTIQ_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BOUTIQ_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("BOUTIQ_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("BOUTIQ_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("BOUTIQ_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("BOUTIQ_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("BOUTIQ_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BOUTIQ_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_bool("BOUTIQ_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("BOUTIQ_NOTIFICATIONS_PHONE_NUMBER_ID") {
            self.notifications.phone_number_id = Some(value);
        }
        if let Some(value) = read_env("BOUTIQ_NOTIFICATIONS_TOKEN") {
            self.notifications.token = Some(secret_value(value));
        }

        if let Some(value) = read_env("BOUTIQ_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BOUTIQ_SERVER_PORT") {
            self.server.port = parse_u16("BOUTIQ_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("BOUTIQ_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("BOUTIQ_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(verify_token) = overrides.whatsapp_verify_token {
            self.whatsapp.verify_token = verify_token;
        }
        if let Some(app_secret) = overrides.whatsapp_app_secret {
            self.whatsapp.app_secret = Some(secret_value(app_secret));
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_llm(&self.llm)?;
        validate_notifications(&self.notifications)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("boutiq.toml"), PathBuf::from("config/boutiq.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
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

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    if !whatsapp.api_base.starts_with("http://") && !whatsapp.api_base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "whatsapp.api_base must start with http:// or https://".to_string(),
        ));
    }

    if whatsapp.verify_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "whatsapp.verify_token must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let missing_key = llm
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    if notifications.enabled {
        if notifications.phone_number_id.as_ref().map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(ConfigError::Validation(
                "notifications.enabled is true but notifications.phone_number_id is missing"
                    .to_string(),
            ));
        }
        let missing_token = notifications
            .token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_token {
            return Err(ConfigError::Validation(
                "notifications.enabled is true but notifications.token is missing".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    whatsapp: Option<WhatsAppPatch>,
    llm: Option<LlmPatch>,
    notifications: Option<NotificationsPatch>,
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
struct WhatsAppPatch {
    api_base: Option<String>,
    verify_token: Option<String>,
    app_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    enabled: Option<bool>,
    phone_number_id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
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
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const BOUTIQ_VARS: &[&str] = &[
        "BOUTIQ_DATABASE_URL",
        "BOUTIQ_DATABASE_MAX_CONNECTIONS",
        "BOUTIQ_DATABASE_TIMEOUT_SECS",
        "BOUTIQ_WHATSAPP_API_BASE",
        "BOUTIQ_WHATSAPP_VERIFY_TOKEN",
        "BOUTIQ_WHATSAPP_APP_SECRET",
        "BOUTIQ_LLM_API_KEY",
        "BOUTIQ_LLM_BASE_URL",
        "BOUTIQ_LLM_MODEL",
        "BOUTIQ_LLM_MAX_TOKENS",
        "BOUTIQ_LLM_TIMEOUT_SECS",
        "BOUTIQ_NOTIFICATIONS_ENABLED",
        "BOUTIQ_NOTIFICATIONS_PHONE_NUMBER_ID",
        "BOUTIQ_NOTIFICATIONS_TOKEN",
        "BOUTIQ_SERVER_BIND_ADDRESS",
        "BOUTIQ_SERVER_PORT",
        "BOUTIQ_LOGGING_LEVEL",
        "BOUTIQ_LOGGING_FORMAT",
    ];

    fn clear_vars() {
        for var in BOUTIQ_VARS {
            env::remove_var(var);
        }
    }

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            llm_api_key: Some("sk-test".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_load_with_api_key_override() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        let config = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("defaults should validate");

        assert_eq!(config.database.url, "sqlite://boutiq.db");
        assert_eq!(config.whatsapp.api_base, "https://graph.facebook.com/v19.0");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn missing_llm_api_key_fails_validation() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        let error = AppConfig::load(LoadOptions::default()).expect_err("should fail");
        assert!(matches!(error, ConfigError::Validation(message) if message.contains("llm.api_key")));
    }

    #[test]
    fn toml_patch_applies_section_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("boutiq.toml");
        fs::write(
            &path,
            r#"
[database]
url = "sqlite://custom.db"

[whatsapp]
verify_token = "from-file"
app_secret = "shh"

[llm]
api_key = "sk-file"
model = "claude-3-5-haiku-latest"

[logging]
level = "debug"
format = "json"
"#,
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("file-backed config should load");

        assert_eq!(config.database.url, "sqlite://custom.db");
        assert_eq!(config.whatsapp.verify_token, "from-file");
        assert_eq!(
            config.whatsapp.app_secret.as_ref().map(|s| s.expose_secret().to_string()),
            Some("shh".to_string())
        );
        assert_eq!(config.llm.model, "claude-3-5-haiku-latest");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_beat_file_and_overrides_beat_env() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("boutiq.toml");
        fs::write(&path, "[llm]\napi_key = \"sk-file\"\nmodel = \"from-file\"\n")
            .expect("write config");

        env::set_var("BOUTIQ_LLM_MODEL", "from-env");
        let config = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load");
        assert_eq!(config.llm.model, "from-env");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            overrides: ConfigOverrides {
                llm_model: Some("from-override".to_string()),
                ..ConfigOverrides::default()
            },
        })
        .expect("load with overrides");
        assert_eq!(config.llm.model, "from-override");

        clear_vars();
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        let error = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: valid_overrides(),
        })
        .expect_err("missing file should fail");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn enabled_notifications_require_credentials() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        env::set_var("BOUTIQ_NOTIFICATIONS_ENABLED", "true");
        let error = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect_err("notifications without credentials should fail");
        assert!(
            matches!(error, ConfigError::Validation(message) if message.contains("notifications"))
        );

        clear_vars();
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() {
        let _guard = env_lock().lock().expect("env lock");
        clear_vars();

        env::set_var("BOUTIQ_SERVER_PORT", "not-a-port");
        let error = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect_err("bad port should fail");
        assert!(matches!(error, ConfigError::InvalidEnvOverride { key, .. } if key == "BOUTIQ_SERVER_PORT"));

        clear_vars();
    }
}
