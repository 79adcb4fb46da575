use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub http_host: String,
    pub http_port: u16,
    pub jwt_secret: String,
    pub mongo: MongoConfig,
    pub redis_url: Option<String>,
    pub user_events_channel: String,
    pub user_directory: UserDirectoryConfig,
    pub history: HistoryConfig,
    pub cache_repair_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database_name: String,
}

#[derive(Debug, Clone)]
pub struct UserDirectoryConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retries: u32,
}

/// Bounds for each channel's replay buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryConfig {
    pub size: usize,
    pub ttl: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            size: 300,
            ttl: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("JWT_SECRET is not set, falling back to the development secret");
            "secret".to_string()
        });

        AppConfig {
            service_name: text("SERVICE_NAME", "comment-hub"),
            http_host: text("HTTP_HOST", "localhost"),
            http_port: parse_or(&lookup, "HTTP_PORT", 8000),
            jwt_secret,
            mongo: MongoConfig {
                uri: text("MONGODB_URI", "mongodb://localhost:27017"),
                database_name: text("MONGODB_DATABASE_NAME", "uniposts"),
            },
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            user_events_channel: text("USER_EVENTS_CHANNEL", "user.updated"),
            user_directory: UserDirectoryConfig {
                base_url: text("USER_DIRECTORY_URL", "http://localhost:8081"),
                timeout: Duration::from_millis(parse_or(
                    &lookup,
                    "USER_DIRECTORY_TIMEOUT_MS",
                    2000,
                )),
                retries: parse_or(&lookup, "USER_DIRECTORY_RETRIES", 3),
            },
            history: HistoryConfig {
                size: parse_or(&lookup, "HISTORY_SIZE", 300),
                ttl: Duration::from_secs(parse_or(&lookup, "HISTORY_TTL_SECS", 60)),
            },
            cache_repair_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CACHE_REPAIR_TIMEOUT_SECS",
                5,
            )),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{} has invalid value {:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
