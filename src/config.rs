use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub session_remember_days: i64,
    /// Upper bound for the simulated gateway latency; zero disables the delay.
    pub payment_max_latency_ms: u64,
    pub payment_random_seed: Option<u64>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 3000);
        let session_ttl_hours = env_or("SESSION_TTL_HOURS", 24);
        let session_remember_days = env_or("SESSION_REMEMBER_DAYS", 7);
        let payment_max_latency_ms = env_or("PAYMENT_MAX_LATENCY_MS", 3000);
        let payment_random_seed = env::var("PAYMENT_RANDOM_SEED")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());
        Ok(Self {
            port,
            database_url,
            host,
            session_ttl_hours,
            session_remember_days,
            payment_max_latency_ms,
            payment_random_seed,
        })
    }

    /// Config for tests and tools that only need a database url.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            session_ttl_hours: 24,
            session_remember_days: 7,
            payment_max_latency_ms: 0,
            payment_random_seed: None,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
