use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::PgConnectOptions;

/// Format accepted for `TRAIN_AT`, interpreted as UTC.
pub const TRAIN_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Market data provider
    pub alpha_vantage_api_key: String,
    pub symbol: String,

    // Database
    pub postgres_host: String,
    pub postgres_port: u16,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_db: String,

    // HTTP API
    pub api_port: u16,

    // Model artifact
    pub model_path: PathBuf,

    // Schedule (UTC wall clock)
    pub ingest_hour: u32,
    pub ingest_minute: u32,
    pub train_at: DateTime<Utc>,

    // One-time seeding
    pub backfill_start: NaiveDate,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let ingest_hour = parsed_env("INGEST_HOUR", 0);
        let ingest_minute = parsed_env("INGEST_MINUTE", 0);
        if ingest_hour > 23 || ingest_minute > 59 {
            panic!("INGEST_HOUR/INGEST_MINUTE out of range: {ingest_hour}:{ingest_minute}");
        }

        let train_at = match optional_env("TRAIN_AT") {
            Some(raw) => NaiveDateTime::parse_from_str(&raw, TRAIN_AT_FORMAT)
                .unwrap_or_else(|e| {
                    panic!("TRAIN_AT must look like '2024-10-19 09:56:00', got '{raw}': {e}")
                })
                .and_utc(),
            None => Utc::now() + Duration::minutes(1),
        };

        let backfill_start = optional_env("BACKFILL_START")
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").unwrap_or_else(|e| {
                    panic!("BACKFILL_START must be YYYY-MM-DD, got '{raw}': {e}")
                })
            })
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid date"));

        Config {
            alpha_vantage_api_key: required_env("ALPHA_VANTAGE_API_KEY"),
            symbol: optional_env("SYMBOL").unwrap_or_else(|| "AAPL".to_string()),
            postgres_host: required_env("POSTGRES_HOST"),
            postgres_port: parsed_env("POSTGRES_PORT", 5432),
            postgres_user: required_env("POSTGRES_USER"),
            postgres_password: required_env("POSTGRES_PASSWORD"),
            postgres_db: required_env("POSTGRES_DB"),
            api_port: parsed_env("API_PORT", 8000),
            model_path: optional_env("MODEL_PATH")
                .unwrap_or_else(|| "data/linear_regression_model.json".to_string())
                .into(),
            ingest_hour,
            ingest_minute,
            train_at,
            backfill_start,
        }
    }

    /// Connection options for the price series database.
    pub fn database_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.postgres_host)
            .port(self.postgres_port)
            .username(&self.postgres_user)
            .password(&self.postgres_password)
            .database(&self.postgres_db)
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Environment variable '{key}' is not valid: '{raw}'")),
        None => default,
    }
}
