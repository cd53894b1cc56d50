use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::lifecycle::LifecycleConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,
    /// Bot API base URL (default: https://api.telegram.org)
    #[serde(default = "default_telegram_url")]
    pub api_url: String,
    /// Timeout for regular API calls in seconds
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u32,
    /// Timeout for a single document upload in seconds
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u32,
    /// Long-poll window for getUpdates in seconds
    #[serde(default = "default_long_poll")]
    pub long_poll_secs: u32,
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout() -> u32 {
    30
}

fn default_upload_timeout() -> u32 {
    600
}

fn default_long_poll() -> u32 {
    30
}

/// Torrent index (scraped HTML listing) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    /// Category filter passed as `c`
    #[serde(default = "default_index_category")]
    pub category: String,
    /// Result filter passed as `f`
    #[serde(default = "default_index_filter")]
    pub filter: String,
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            category: default_index_category(),
            filter: default_index_filter(),
            timeout_secs: default_index_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_index_url() -> String {
    "https://nyaa.si/".to_string()
}

fn default_index_category() -> String {
    "1_2".to_string()
}

fn default_index_filter() -> String {
    "2".to_string()
}

fn default_index_timeout() -> u32 {
    20
}

fn default_user_agent() -> String {
    "animedlbot/1.0".to_string()
}

/// aria2 JSON-RPC configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub url: String,
    /// RPC secret (`--rpc-secret`), empty when unset
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            secret: String::new(),
            timeout_secs: default_agent_timeout(),
        }
    }
}

fn default_agent_url() -> String {
    "http://127.0.0.1:6800/jsonrpc".to_string()
}

fn default_agent_timeout() -> u32 {
    10
}

/// AniList catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub url: String,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u32,
    /// Maximum number of title buttons offered per search
    #[serde(default = "default_max_titles")]
    pub max_titles: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            timeout_secs: default_catalog_timeout(),
            max_titles: default_max_titles(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://graphql.anilist.co".to_string()
}

fn default_catalog_timeout() -> u32 {
    20
}

fn default_max_titles() -> usize {
    10
}

/// Health/metrics HTTP endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_http_enabled() -> bool {
    true
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    9090
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub telegram: SanitizedTelegramConfig,
    pub index: IndexConfig,
    pub agent: SanitizedAgentConfig,
    pub catalog: CatalogConfig,
    pub lifecycle: LifecycleConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub api_url: String,
    pub bot_token_configured: bool,
    pub timeout_secs: u32,
    pub upload_timeout_secs: u32,
    pub long_poll_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAgentConfig {
    pub url: String,
    pub secret_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            telegram: SanitizedTelegramConfig {
                api_url: config.telegram.api_url.clone(),
                bot_token_configured: !config.telegram.bot_token.is_empty(),
                timeout_secs: config.telegram.timeout_secs,
                upload_timeout_secs: config.telegram.upload_timeout_secs,
                long_poll_secs: config.telegram.long_poll_secs,
            },
            index: config.index.clone(),
            agent: SanitizedAgentConfig {
                url: config.agent.url.clone(),
                secret_configured: !config.agent.secret.is_empty(),
                timeout_secs: config.agent.timeout_secs,
            },
            catalog: config.catalog.clone(),
            lifecycle: config.lifecycle.clone(),
            http: config.http.clone(),
        }
    }
}
