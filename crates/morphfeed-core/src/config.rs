//! Configuration module
//!
//! Configuration is read from the environment (a `.env` file is honoured via
//! dotenvy). Generation defaults match the invocation policy: 60s request
//! deadline, 3 retries, 250ms base backoff capped at 1s, 10% additive jitter.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const GENERATION_TIMEOUT_SECS: u64 = 60;
const GENERATION_MAX_RETRIES: u32 = 3;
const GENERATION_BASE_DELAY_MS: u64 = 250;
const GENERATION_CAP_DELAY_MS: u64 = 1000;
const GENERATION_JITTER_RATIO: f64 = 0.10;
const DB_MAX_CONNECTIONS: u32 = 5;
const LOCAL_STORAGE_PATH: &str = "./data/media";
const LOCAL_STORAGE_BASE_URL: &str = "http://localhost:4000/media";

/// Remote generation endpoint settings
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub endpoint_url: String,
    /// Bearer token; never log this value.
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub cap_delay_ms: u64,
    pub jitter_ratio: f64,
}

impl GenerationSettings {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            api_token: None,
            timeout_secs: GENERATION_TIMEOUT_SECS,
            max_retries: GENERATION_MAX_RETRIES,
            base_delay_ms: GENERATION_BASE_DELAY_MS,
            cap_delay_ms: GENERATION_CAP_DELAY_MS,
            jitter_ratio: GENERATION_JITTER_RATIO,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let endpoint = self.endpoint_url.trim();
        if endpoint.is_empty() {
            anyhow::bail!("GENERATION_ENDPOINT_URL must not be empty");
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            anyhow::bail!("GENERATION_ENDPOINT_URL must be an http(s) URL");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("GENERATION_TIMEOUT_SECS must be greater than zero");
        }
        if self.base_delay_ms > self.cap_delay_ms {
            anyhow::bail!("GENERATION_BASE_DELAY_MS must not exceed GENERATION_CAP_DELAY_MS");
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            anyhow::bail!("GENERATION_JITTER_RATIO must be within [0, 1]");
        }
        Ok(())
    }
}

/// Object storage settings
#[derive(Clone, Debug)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub local_path: Option<String>,
    pub local_base_url: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_path: Some(LOCAL_STORAGE_PATH.to_string()),
            local_base_url: Some(LOCAL_STORAGE_BASE_URL.to_string()),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub generation: GenerationSettings,
    pub storage: StorageSettings,
    /// When unset, callers fall back to in-memory persistence.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let endpoint_url = lookup("GENERATION_ENDPOINT_URL").ok_or_else(|| {
            anyhow::anyhow!("GENERATION_ENDPOINT_URL must be set to reach the generation service")
        })?;

        let generation = GenerationSettings {
            endpoint_url,
            api_token: lookup("GENERATION_API_TOKEN").filter(|t| !t.trim().is_empty()),
            timeout_secs: parse_or(&lookup, "GENERATION_TIMEOUT_SECS", GENERATION_TIMEOUT_SECS),
            max_retries: parse_or(&lookup, "GENERATION_MAX_RETRIES", GENERATION_MAX_RETRIES),
            base_delay_ms: parse_or(&lookup, "GENERATION_BASE_DELAY_MS", GENERATION_BASE_DELAY_MS),
            cap_delay_ms: parse_or(&lookup, "GENERATION_CAP_DELAY_MS", GENERATION_CAP_DELAY_MS),
            jitter_ratio: parse_or(&lookup, "GENERATION_JITTER_RATIO", GENERATION_JITTER_RATIO),
        };

        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let storage = StorageSettings {
            backend,
            local_path: lookup("LOCAL_STORAGE_PATH").or_else(|| Some(LOCAL_STORAGE_PATH.to_string())),
            local_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .or_else(|| Some(LOCAL_STORAGE_BASE_URL.to_string())),
        };

        let config = Config {
            environment,
            generation,
            storage,
            database_url: lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.generation.validate()?;
        if self.db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be greater than zero");
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
