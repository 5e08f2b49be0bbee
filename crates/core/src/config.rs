use crate::exposure::NettingPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub exchange: ExchangeConfig,
    pub exposure: ExposureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub api_url: String,
    /// Per-request HTTP timeout.
    pub timeout_ms: u64,
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    #[serde(default)]
    pub netting_policy: NettingPolicy,
    /// Upper bound on the live position fetch, including rate-limit waits.
    pub reconcile_timeout_ms: u64,
    /// Attempts at the atomic watermark raise before handing off to the sweeper.
    pub watermark_retry_attempts: u32,
    pub watermark_retry_backoff_ms: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            netting_policy: NettingPolicy::SignedNet,
            reconcile_timeout_ms: 3_000,
            watermark_retry_attempts: 3,
            watermark_retry_backoff_ms: 50,
            sweep_interval_secs: 15,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/fight_exposure".to_string(),
                max_connections: 10,
            },
            exchange: ExchangeConfig {
                api_url: "https://api.pacifica.fi".to_string(),
                timeout_ms: 2_500,
                requests_per_second: 20,
            },
            exposure: ExposureConfig::default(),
        }
    }
}
