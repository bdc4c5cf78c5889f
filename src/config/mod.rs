use std::env;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub reports_dir: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            db_path: get_env("DB_PATH", "/data/campus.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            jwt_secret: get_env("JWT_SECRET", ""),
            token_ttl_hours: get_env("TOKEN_TTL_HOURS", "24")
                .parse()
                .unwrap_or(24),
            reports_dir: get_env("REPORTS_DIR", "/data/reports"),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
