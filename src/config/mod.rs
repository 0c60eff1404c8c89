// src/config/mod.rs
// All values come from the environment (.env supported), with sane defaults.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct GanttConfig {
    // ── Database Configuration
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Logging Configuration
    pub log_level: String,
}

// Handles values with trailing comments and extra whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl GanttConfig {
    pub fn from_env() -> Self {
        // Load from .env file first if it exists
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            database_url: env_var_or("DATABASE_URL", "sqlite:./ganttd.db".to_string()),
            sqlite_max_connections: env_var_or("SQLITE_MAX_CONNECTIONS", 10),
            host: env_var_or("GANTTD_HOST", "0.0.0.0".to_string()),
            port: env_var_or("GANTTD_PORT", 3002),
            log_level: env_var_or("GANTTD_LOG_LEVEL", "info".to_string()),
        }
    }
}

pub static CONFIG: Lazy<GanttConfig> = Lazy::new(GanttConfig::from_env);
