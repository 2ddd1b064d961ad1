//! Environment-shaped runtime configuration.

use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;

/// Runtime configuration for the radar service.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub static_data_path: String,
    pub default_window: Duration,
    pub top_k: usize,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_temperature: f64,
    pub llm_max_tokens: u32,
    pub llm_max_items: usize,
    pub llm_base_url: Option<String>,
    pub llm_timeout: StdDuration,
    pub llm_cache_ttl: StdDuration,
}

impl Config {
    /// Sources configuration from environment variables (a `.env` file is
    /// honored when present). Malformed numeric values fail startup.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut cfg = Config {
            listen_addr: get_env("RADAR_LISTEN_ADDR", "0.0.0.0:8080"),
            static_data_path: get_env("RADAR_STATIC_DATA", "data/sample_news.json"),
            default_window: Duration::hours(24),
            top_k: 5,
            llm_api_key: get_env("RADAR_LLM_API_KEY", ""),
            llm_model: get_env("RADAR_LLM_MODEL", "gemini-2.5-flash"),
            llm_temperature: 0.2,
            llm_max_tokens: 1024,
            llm_max_items: 40,
            llm_base_url: std::env::var("RADAR_LLM_BASE_URL").ok(),
            llm_timeout: StdDuration::from_secs(30),
            llm_cache_ttl: StdDuration::from_secs(300),
        };

        if let Some(top_k) = parse_env::<usize>("RADAR_TOP_K")? {
            cfg.top_k = top_k;
        }
        if let Some(hours) = parse_env::<i64>("RADAR_DEFAULT_WINDOW_H")? {
            cfg.default_window = Duration::hours(hours);
        }
        if let Some(temp) = parse_env::<f64>("RADAR_LLM_TEMPERATURE")? {
            cfg.llm_temperature = temp;
        }
        if let Some(tokens) = parse_env::<u32>("RADAR_LLM_MAX_TOKENS")? {
            cfg.llm_max_tokens = tokens;
        }
        if let Some(max_items) = parse_env::<usize>("RADAR_LLM_MAX_ITEMS")? {
            cfg.llm_max_items = max_items;
        }
        if let Some(secs) = parse_env::<u64>("RADAR_LLM_TIMEOUT_SECS")? {
            cfg.llm_timeout = StdDuration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("RADAR_LLM_CACHE_TTL_SECS")? {
            cfg.llm_cache_ttl = StdDuration::from_secs(secs);
        }

        Ok(cfg)
    }

    /// The LLM clustering path is enabled by the presence of an API key.
    pub fn llm_enabled(&self) -> bool {
        !self.llm_api_key.is_empty()
    }
}

fn get_env(key: &str, fallback: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => fallback.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => {
            let parsed = value.parse::<T>().with_context(|| format!("parse {key}"))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}
