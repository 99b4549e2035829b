use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS (the ticketing frontend).
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret used to verify admin bearer tokens. Tokens are issued elsewhere.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the showtime endpoints
    pub public_per_second: u32,
    /// Burst size for the showtime endpoints
    pub public_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Minutes a screen stays blocked after the movie ends.
    pub cleaning_buffer_minutes: i64,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/cinema.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
            },
            rate_limit: RateLimitConfig {
                public_per_second: env::var("RATE_LIMIT_PUBLIC_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                public_burst: env::var("RATE_LIMIT_PUBLIC_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
            scheduling: SchedulingConfig {
                cleaning_buffer_minutes: parse_cleaning_buffer(
                    &env::var("SHOWTIME_CLEANING_BUFFER_MINUTES")
                        .unwrap_or_else(|_| "15".to_string()),
                )?,
                default_page_size: env::var("SHOWTIME_DEFAULT_PAGE_SIZE")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                max_page_size: env::var("SHOWTIME_MAX_PAGE_SIZE")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .unwrap_or(100),
            },
        })
    }
}

/// Upper bound for the cleaning buffer: one day.
pub const MAX_CLEANING_BUFFER_MINUTES: i64 = 24 * 60;

fn parse_cleaning_buffer(raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|m| (0..=MAX_CLEANING_BUFFER_MINUTES).contains(m))
        .ok_or_else(|| ConfigError::InvalidValue("SHOWTIME_CLEANING_BUFFER_MINUTES".to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/cinema.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
            },
            rate_limit: RateLimitConfig {
                public_per_second: 10,
                public_burst: 50,
            },
            scheduling: SchedulingConfig {
                cleaning_buffer_minutes: 15,
                default_page_size: 10,
                max_page_size: 100,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_buffer_must_be_within_a_day() {
        assert_eq!(parse_cleaning_buffer("15").unwrap(), 15);
        assert_eq!(parse_cleaning_buffer(" 0 ").unwrap(), 0);
        assert_eq!(parse_cleaning_buffer("1440").unwrap(), 1440);

        for raw in ["-5", "1441", "9223372036854775807", "soon"] {
            assert!(matches!(
                parse_cleaning_buffer(raw),
                Err(ConfigError::InvalidValue(_))
            ));
        }
    }
}
