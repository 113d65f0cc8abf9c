use anyhow::{Context, Result};
use std::env;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub processor: ProcessorConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;

        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;

        let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(val) => val
                .parse()
                .context("Failed to parse DATABASE_MAX_CONNECTIONS")?,
            Err(_) => 10,
        };

        let secret_key = env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?;
        let api_base =
            env::var("STRIPE_API_BASE").unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let currency = env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string());

        let interval_secs = match env::var("RECONCILE_INTERVAL_SECS") {
            Ok(val) => val
                .parse()
                .context("Failed to parse RECONCILE_INTERVAL_SECS")?,
            Err(_) => 300,
        };

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url,
                max_connections,
            },
            processor: ProcessorConfig {
                secret_key,
                api_base,
                currency,
            },
            reconcile: ReconcileConfig { interval_secs },
        })
    }
}
