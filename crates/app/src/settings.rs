//! Handles settings for the application. Configuration is written in
//! `settings.toml`.

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    /// The single allow-listed chat principal. Unset means no gate (useful
    /// for local experiments only).
    pub allowed_user_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Assistant {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Reporting/default currency code, e.g. "CNY".
    pub default_currency: Option<String>,
    /// IANA timezone used to resolve "today", e.g. "Asia/Shanghai".
    pub timezone: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub telegram: Telegram,
    pub assistant: Assistant,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .build()?;

        settings.try_deserialize()
    }
}
