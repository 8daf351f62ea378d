use std::env;

use chrono::Duration;

const DEFAULT_DATABASE: &str = "ExpenseTracker";
const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("You need to add {0} to the env")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub mongodb_uri: String,
    pub database: String,
    pub session_secret: String,
    pub session_max_age: Duration,
    pub bind_address: String,
    pub port: u16,
    pub allowed_origin: Option<String>,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();
        Config::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let session_max_age = match lookup("SESSION_MAX_AGE_SECS") {
            Some(value) => match value.parse::<i64>() {
                Ok(secs) if secs > 0 => match Duration::try_seconds(secs) {
                    Some(max_age) => max_age,
                    None => {
                        return Err(ConfigError::Invalid {
                            name: "SESSION_MAX_AGE_SECS",
                            value,
                        })
                    }
                },
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SESSION_MAX_AGE_SECS",
                        value,
                    })
                }
            },
            None => Duration::seconds(DEFAULT_SESSION_MAX_AGE_SECS),
        };
        let port = match lookup("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => 8080,
        };

        Ok(Config {
            mongodb_uri: required("MONGODB_URI")?,
            database: lookup("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            session_secret: required("SESSION_SECRET")?,
            session_max_age,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            allowed_origin: lookup("ALLOWED_ORIGIN").filter(|origin| !origin.is_empty()),
        })
    }
}
