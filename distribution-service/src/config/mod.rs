use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub analytics: AnalyticsConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AnalyticsConfig {
    /// Products at or below this stock count appear in the low-stock figure.
    pub low_stock_threshold: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("DISTRIBUTION_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("DISTRIBUTION_SERVICE_PORT")
            .unwrap_or_else(|_| "3010".to_string())
            .parse()?;

        let db_url = env::var("DISTRIBUTION_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DISTRIBUTION_DATABASE_URL must be set"))?;
        let max_connections = env::var("DISTRIBUTION_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("DISTRIBUTION_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let low_stock_threshold = env::var("DISTRIBUTION_LOW_STOCK_THRESHOLD")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            analytics: AnalyticsConfig {
                low_stock_threshold,
            },
            service_name: "distribution-service".to_string(),
        })
    }
}
