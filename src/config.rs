use std::env;

/// Engine configuration, read from the environment by the embedding
/// application. Only the persistence adapter consumes it; the aggregation
/// code itself is pure.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    /// Upper bound on rows fetched per collection in one aggregation pass.
    pub fetch_limit: i64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            fetch_limit: env_parse_or("ENGINE_FETCH_LIMIT", 10_000),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_max_connections: 5,
            db_pool_min_connections: 1,
            db_pool_acquire_timeout_seconds: 5,
            db_pool_idle_timeout_seconds: 600,
            fetch_limit: 10_000,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}
