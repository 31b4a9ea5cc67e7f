//! Engine configuration loaded from the environment.

use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Runtime settings for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Offset used to derive "today" and the current period
    pub tz_offset_hours: i32,
    /// Number of periods in the trailing P&L view
    pub pnl_trailing_periods: usize,
    pub snapshot_ttl: Duration,
}

impl EngineConfig {
    /// Load configuration, reading a `.env` file first when present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env_or("DATABASE_URL", "postgres://localhost/crm"),
            db_max_connections: env_parse("CRM_DB_MAX_CONNECTIONS", 5),
            tz_offset_hours: env_parse("CRM_TZ_OFFSET_HOURS", 3),
            pnl_trailing_periods: env_parse("CRM_PNL_TRAILING_PERIODS", 6),
            snapshot_ttl: Duration::from_secs(env_parse("CRM_SNAPSHOT_TTL_SECS", 600)),
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.tz_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/crm".to_string(),
            db_max_connections: 5,
            tz_offset_hours: 3,
            pnl_trailing_periods: 6,
            snapshot_ttl: Duration::from_secs(600),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
