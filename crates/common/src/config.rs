use std::str::FromStr;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Port the API server binds on (default: 3000)
    pub api_port: u16,

    /// Push provider credentials and tuning
    pub push: PushConfig,

    /// Bounded in-flight token deactivation chunks per execution (default: 4)
    pub hygiene_max_in_flight_chunks: usize,

    /// Simultaneous trigger executions in the worker (default: 10)
    pub max_concurrent_executions: usize,

    /// Upper bound on a single trigger execution (default: 540)
    pub execution_timeout_secs: u64,

    /// Worker locations older than this are swept (default: 30)
    pub location_retention_days: i64,

    /// How often the retention sweep runs (default: 24)
    pub retention_sweep_interval_hours: u64,
}

/// Firebase Cloud Messaging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    pub project_id: String,
    /// Service account email used as the assertion issuer
    pub client_email: String,
    /// PEM-encoded service account private key
    pub private_key: String,
    /// FCM API base (default: https://fcm.googleapis.com)
    pub api_base: String,
    /// OAuth token endpoint (default: https://oauth2.googleapis.com/token)
    pub token_uri: String,
    /// Provider batches in flight at once (default: 4)
    pub max_in_flight_batches: usize,
    /// Individual sends in flight within one batch (default: 100)
    pub max_in_flight_sends: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS", 24)?,
            api_port: parse_var("API_PORT", 3000)?,
            push: PushConfig::from_env()?,
            hygiene_max_in_flight_chunks: parse_var("HYGIENE_MAX_IN_FLIGHT_CHUNKS", 4)?,
            max_concurrent_executions: parse_var("MAX_CONCURRENT_EXECUTIONS", 10)?,
            execution_timeout_secs: parse_var("EXECUTION_TIMEOUT_SECS", 540)?,
            location_retention_days: parse_var("LOCATION_RETENTION_DAYS", 30)?,
            retention_sweep_interval_hours: parse_var("RETENTION_SWEEP_INTERVAL_HOURS", 24)?,
        })
    }
}

impl PushConfig {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            project_id: std::env::var("FCM_PROJECT_ID")
                .map_err(|_| anyhow::anyhow!("FCM_PROJECT_ID environment variable is required"))?,
            client_email: std::env::var("FCM_CLIENT_EMAIL").map_err(|_| {
                anyhow::anyhow!("FCM_CLIENT_EMAIL environment variable is required")
            })?,
            // Keys pasted into .env files usually carry escaped newlines
            private_key: std::env::var("FCM_PRIVATE_KEY")
                .map_err(|_| anyhow::anyhow!("FCM_PRIVATE_KEY environment variable is required"))?
                .replace("\\n", "\n"),
            api_base: std::env::var("FCM_API_BASE")
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            token_uri: std::env::var("FCM_TOKEN_URI")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            max_in_flight_batches: parse_var("PUSH_MAX_IN_FLIGHT_BATCHES", 4)?,
            max_in_flight_sends: parse_var("PUSH_MAX_IN_FLIGHT_SENDS", 100)?,
        })
    }
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u64 = parse_var("BEACON_TEST_UNSET_VARIABLE", 540).unwrap();
        assert_eq!(value, 540);
    }
}
