use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub providers: ProvidersConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8092,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub sqlite_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            sqlite_path: "~/.sms-dispatch/state.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub twilio: ProviderCredentials,
    pub vonage: ProviderCredentials,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            twilio: ProviderCredentials {
                priority: 1,
                ..ProviderCredentials::default()
            },
            vonage: ProviderCredentials {
                priority: 2,
                ..ProviderCredentials::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub phone_number: String,
    pub priority: i32,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub fail_open_on_org_lookup: bool,
    pub default_language: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fail_open_on_org_lookup: true,
            default_language: "en".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_config() -> Config {
    let config_path = resolve_config_path();

    let mut cfg = Config::default();

    if config_path.exists() {
        if let Ok(raw) = fs::read_to_string(&config_path) {
            match serde_json::from_str::<Config>(&raw) {
                Ok(file_cfg) => cfg = file_cfg,
                Err(err) => tracing::warn!(
                    path = %config_path.display(),
                    "ignoring unreadable config file: {err}"
                ),
            }
        }
    }

    apply_env_overrides(&mut cfg);
    cfg
}

pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(token) = env_non_empty("SMS_DISPATCH_TOKEN") {
        cfg.auth.token = Some(token);
    }

    if let Some(url) = env_non_empty("SMS_DISPATCH_DATABASE_URL") {
        cfg.database.url = Some(url);
    }

    if let Some(path) = env_non_empty("SMS_DISPATCH_SQLITE_PATH") {
        cfg.database.sqlite_path = path;
    }

    if let Some(flag) = env_non_empty("SMS_DISPATCH_FAIL_OPEN") {
        cfg.dispatch.fail_open_on_org_lookup =
            !matches!(flag.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off");
    }

    // Vendor credentials use the vendors' conventional variable names.
    if let Some(sid) = env_non_empty("TWILIO_ACCOUNT_SID") {
        cfg.providers.twilio.api_key = sid;
    }
    if let Some(token) = env_non_empty("TWILIO_AUTH_TOKEN") {
        cfg.providers.twilio.api_secret = token;
    }
    if let Some(number) = env_non_empty("TWILIO_PHONE_NUMBER") {
        cfg.providers.twilio.phone_number = number;
    }
    if let Some(key) = env_non_empty("VONAGE_API_KEY") {
        cfg.providers.vonage.api_key = key;
    }
    if let Some(secret) = env_non_empty("VONAGE_API_SECRET") {
        cfg.providers.vonage.api_secret = secret;
    }
    if let Some(number) = env_non_empty("VONAGE_PHONE_NUMBER") {
        cfg.providers.vonage.phone_number = number;
    }
}

pub fn resolve_config_path() -> PathBuf {
    env::var("SMS_DISPATCH_CONFIG")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| expand_tilde("~/.sms-dispatch/sms-dispatch.json"))
}

pub fn resolve_database_url(cfg: &Config) -> String {
    if let Some(url) = cfg.database.url.as_ref() {
        return url.to_string();
    }

    let path = expand_tilde(&cfg.database.sqlite_path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}
