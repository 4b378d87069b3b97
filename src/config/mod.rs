use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    pub timeout: u64,
    pub user_agent: String,
    pub icons_dir: Option<String>,
    pub remote_icons_url: Option<String>,
    pub remote_icons: Option<Vec<String>>,
    #[serde(default = "default_max_cached_markers")]
    pub max_cached_markers: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_cached_markers() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub times: u32,
    pub initial_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            times: 3,
            initial_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: Some(5_000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            times: config.times,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            factor: config.factor,
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }
}
