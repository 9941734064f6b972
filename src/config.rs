use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Reverse-geocoding endpoint used when `GEOCODE_URL` is not set.
pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub cors_allow_origin: String,

    // Access tokens
    pub jwt_secret: String,
    pub jwt_access_token_ttl: Duration,
    pub blacklist_cleanup_interval: Duration,

    // Media uploads
    pub media_dir: PathBuf,
    pub max_post_upload_bytes: usize,
    pub max_profile_picture_bytes: usize,

    // Reverse geocoding
    pub google_maps_api_key: Option<String>,
    pub geocode_url: String,
    pub geocode_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/socialconnect.sqlite",
            )),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            cors_allow_origin: env_or_default("CORS_ALLOW_ORIGIN", "*"),

            // Access tokens
            jwt_secret: required_env("JWT_SECRET")?,
            jwt_access_token_ttl: Duration::from_secs(parse_env_u64(
                "JWT_ACCESS_TOKEN_EXPIRE_SECS",
                86_400,
            )?),
            blacklist_cleanup_interval: Duration::from_secs(parse_env_u64(
                "BLACKLIST_CLEANUP_INTERVAL_SECS",
                3600,
            )?),

            // Media uploads
            media_dir: PathBuf::from(env_or_default("MEDIA_DIR", "./data/media")),
            max_post_upload_bytes: parse_env_usize("MAX_POST_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            max_profile_picture_bytes: parse_env_usize(
                "MAX_PROFILE_PICTURE_BYTES",
                5 * 1024 * 1024,
            )?,

            // Reverse geocoding
            google_maps_api_key: optional_env("GOOGLE_MAPS_API_KEY"),
            geocode_url: env_or_default("GEOCODE_URL", DEFAULT_GEOCODE_URL),
            geocode_timeout: Duration::from_secs(parse_env_u64("GEOCODE_TIMEOUT_SECS", 10)?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                name: "JWT_SECRET".to_string(),
                message: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }
        if self.jwt_access_token_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "JWT_ACCESS_TOKEN_EXPIRE_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.blacklist_cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "BLACKLIST_CLEANUP_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_post_upload_bytes == 0 || self.max_profile_picture_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_POST_UPLOAD_BYTES".to_string(),
                message: "upload limits must be non-zero".to_string(),
            });
        }
        if !self.geocode_url.starts_with("http://") && !self.geocode_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                name: "GEOCODE_URL".to_string(),
                message: format!("must be an http(s) URL, got '{}'", self.geocode_url),
            });
        }
        Ok(())
    }

    /// Fixed configuration for tests. Never reads the environment.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./data/test.sqlite"),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            cors_allow_origin: "*".to_string(),
            jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
            jwt_access_token_ttl: Duration::from_secs(86_400),
            blacklist_cleanup_interval: Duration::from_secs(3600),
            media_dir: PathBuf::from("./data/media"),
            max_post_upload_bytes: 50 * 1024 * 1024,
            max_profile_picture_bytes: 5 * 1024 * 1024,
            google_maps_api_key: None,
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            geocode_timeout: Duration::from_secs(10),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        assert_eq!(parse_env_u64("SOCIALCONNECT_NONEXISTENT_VAR", 7).unwrap(), 7);
        assert_eq!(parse_env_u16("SOCIALCONNECT_NONEXISTENT_VAR", 80).unwrap(), 80);
        assert_eq!(
            env_or_default("SOCIALCONNECT_NONEXISTENT_VAR", "fallback"),
            "fallback"
        );
        assert!(optional_env("SOCIALCONNECT_NONEXISTENT_VAR").is_none());
    }

    #[test]
    fn test_testing_config_is_valid() {
        assert!(Config::for_testing().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = Config {
            jwt_secret: "too-short".to_string(),
            ..Config::for_testing()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref name, .. }) if name == "JWT_SECRET"
        ));
    }

    #[test]
    fn test_geocode_url_must_be_http() {
        let config = Config {
            geocode_url: "ftp://example.com".to_string(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
