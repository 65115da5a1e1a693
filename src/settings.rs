use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Twilio-compatible SMS gateway.
#[derive(Clone, Debug, Deserialize)]
pub struct Sms {
    #[serde(default = "default_sms_url")]
    pub url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// Firebase Cloud Messaging, HTTP v1 API.
#[derive(Clone, Debug, Deserialize)]
pub struct Push {
    #[serde(default = "default_push_url")]
    pub url: String,
    pub project_id: String,
    pub access_token: String,
    #[serde(default = "default_push_link")]
    pub link: String,
    /// Browser notification icon and badge URLs, omitted when unset.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default = "default_push_vibrate")]
    pub vibrate: Vec<u32>,
    #[serde(default = "default_push_action_title")]
    pub action_title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Reminders {
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,
    /// 0 disables the background sweep.
    #[serde(default)]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            channel_timeout_secs: default_channel_timeout_secs(),
            sweep_interval_secs: 0,
            currency_symbol: default_currency_symbol(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub reminders: Reminders,
    pub sms: Option<Sms>,
    pub push: Option<Push>,
}

impl Settings {
    /// Loads `path` and lets `APP_<SECTION>__<KEY>` variables override it.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;

        config.try_deserialize()
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_sms_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_push_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_push_link() -> String {
    "/bills.html".to_string()
}

fn default_push_vibrate() -> Vec<u32> {
    vec![100, 50, 100]
}

fn default_push_action_title() -> String {
    "View Bills".to_string()
}

fn default_channel_timeout_secs() -> u64 {
    10
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}
