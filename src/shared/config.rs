//! Application configuration. Environment-sourced via `config` + `dotenv`,
//! prefix `TNSE_`.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,

    pub database_url: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,

    pub redis_url: Option<String>,

    #[serde(default)]
    pub allowed_user_ids: Option<String>,

    pub llm_api_key: Option<String>,
    pub llm_api_url: Option<String>,
    pub llm_model: Option<String>,

    #[serde(default)]
    pub reaction_weights: Option<String>,

    #[serde(default)]
    pub content_window_hours: Option<f64>,
    #[serde(default)]
    pub collection_interval_secs: Option<u64>,
    #[serde(default)]
    pub manual_sync_cooldown_secs: Option<u64>,
    #[serde(default)]
    pub llm_daily_cost_cap_usd: Option<f64>,
    #[serde(default)]
    pub enrichment_rpm: Option<u32>,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Max concurrent channel collections per sweep.
    #[serde(default)]
    pub max_concurrent_channels: Option<usize>,
    /// Max messages fetched per channel per collection cycle.
    #[serde(default)]
    pub fetch_batch_size: Option<i32>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let c = config::Config::builder().add_source(config::Environment::with_prefix("TNSE"));
        let c = if let Ok(path) = std::env::var("TNSE_CONFIG") {
            c.add_source(config::File::with_name(&path))
        } else {
            c
        };
        c.build()?.try_deserialize()
    }

    /// Resolves the Postgres connection URL. The explicit `database_url`
    /// takes precedence over the discrete host/port/name/user/password
    /// fields, which are percent-decoded and assembled into a URL.
    pub fn resolved_database_url(&self) -> Option<String> {
        if let Some(url) = &self.database_url {
            return Some(url.clone());
        }
        let host = self.db_host.as_deref()?;
        let name = self.db_name.as_deref()?;
        let user = self.db_user.as_deref()?;
        let port = self.db_port.unwrap_or(5432);
        let password = self.db_password.as_deref().unwrap_or("");
        Some(format!(
            "postgres://{}:{}@{}:{}/{}",
            user,
            urlencoding_encode(password),
            host,
            port,
            name
        ))
    }

    pub fn allowed_user_ids(&self) -> Vec<i64> {
        self.allowed_user_ids
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|s| s.trim().parse::<i64>().ok())
            .collect()
    }

    pub fn reaction_weights(&self) -> BTreeMap<String, f64> {
        self.reaction_weights
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn content_window_hours_or_default(&self) -> f64 {
        self.content_window_hours.unwrap_or(24.0)
    }

    pub fn collection_interval_secs_or_default(&self) -> u64 {
        self.collection_interval_secs.unwrap_or(900)
    }

    pub fn manual_sync_cooldown_secs_or_default(&self) -> u64 {
        self.manual_sync_cooldown_secs.unwrap_or(300)
    }

    pub fn llm_daily_cost_cap_usd_or_default(&self) -> f64 {
        self.llm_daily_cost_cap_usd.unwrap_or(10.00)
    }

    pub fn enrichment_rpm_or_default(&self) -> u32 {
        self.enrichment_rpm.unwrap_or(10)
    }

    pub fn cache_ttl_secs_or_default(&self) -> u64 {
        self.cache_ttl_secs.unwrap_or(300)
    }

    pub fn max_concurrent_channels_or_default(&self) -> usize {
        self.max_concurrent_channels.unwrap_or(3)
    }

    pub fn fetch_batch_size_or_default(&self) -> i32 {
        self.fetch_batch_size.unwrap_or(100)
    }
}

/// Minimal percent-encoding for the password segment of a connection URL.
/// Only escapes the characters that would otherwise break URL parsing.
fn urlencoding_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
