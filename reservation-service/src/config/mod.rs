use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::utils::OAuthCredentials;
use std::env;
use std::time::Duration;

use crate::models::OperatingHours;

pub const DEFAULT_PROVIDER_URL: &str = "https://apps.usos.pw.edu.pl/services";

#[derive(Debug, Clone)]
pub struct ReservationConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// External origin of this service, e.g. `https://room39.example.edu`.
    pub public_url: String,
    pub oauth: OAuthConfig,
    pub session: SessionConfig,
    pub database: Option<DatabaseConfig>,
    pub rate_limit: RateLimitConfig,
    pub operating_hours: OperatingHours,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    pub provider_url: String,
}

impl OAuthConfig {
    pub fn credentials(&self) -> OAuthCredentials {
        OAuthCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl_minutes: u64,
    pub cookie_secure: bool,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub ip_limit: u32,
    pub ip_window_seconds: u64,
}

impl ReservationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database = match env::var("DATABASE_URL") {
            Ok(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "5", is_prod)?,
            }),
            Err(_) if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production but not set"
                )))
            }
            Err(_) => None,
        };

        let config = ReservationConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("reservation-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            public_url: get_env("PUBLIC_URL", Some("http://localhost:8080"), is_prod)?
                .trim_end_matches('/')
                .to_string(),
            oauth: OAuthConfig {
                consumer_key: get_env("OAUTH_CONSUMER_KEY", None, is_prod)?,
                consumer_secret: Secret::new(get_env("OAUTH_CONSUMER_SECRET", None, is_prod)?),
                provider_url: get_env("OAUTH_PROVIDER_URL", Some(DEFAULT_PROVIDER_URL), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
            },
            session: SessionConfig {
                ttl_minutes: parse_env("SESSION_TTL_MINUTES", "720", is_prod)?,
                cookie_secure: parse_env("SESSION_COOKIE_SECURE", "true", is_prod)?,
            },
            database,
            rate_limit: RateLimitConfig {
                ip_limit: parse_env("RATE_LIMIT_IP_LIMIT", "120", is_prod)?,
                ip_window_seconds: parse_env("RATE_LIMIT_IP_WINDOW_SECONDS", "60", is_prod)?,
            },
            operating_hours: OperatingHours {
                start_hour: parse_env("OPERATING_HOURS_START", "8", is_prod)?,
                end_hour: parse_env("OPERATING_HOURS_END", "20", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session.ttl_minutes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_MINUTES must be positive"
            )));
        }

        let hours = &self.operating_hours;
        if hours.start_hour >= hours.end_hour || hours.end_hour > 24 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Operating hours must satisfy OPERATING_HOURS_START < OPERATING_HOURS_END <= 24"
            )));
        }

        url::Url::parse(&self.public_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("PUBLIC_URL is not a valid URL: {}", e))
        })?;
        url::Url::parse(&self.oauth.provider_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "OAUTH_PROVIDER_URL is not a valid URL: {}",
                e
            ))
        })?;

        if self.environment == Environment::Prod && !self.session.cookie_secure {
            tracing::warn!("Session cookie is not marked Secure in production");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReservationConfig {
        ReservationConfig {
            common: core_config::Config { port: 8080 },
            environment: Environment::Dev,
            service_name: "reservation-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            public_url: "http://localhost:8080".to_string(),
            oauth: OAuthConfig {
                consumer_key: "key".to_string(),
                consumer_secret: Secret::new("secret".to_string()),
                provider_url: DEFAULT_PROVIDER_URL.to_string(),
            },
            session: SessionConfig {
                ttl_minutes: 60,
                cookie_secure: true,
            },
            database: None,
            rate_limit: RateLimitConfig {
                ip_limit: 10,
                ip_window_seconds: 60,
            },
            operating_hours: OperatingHours::default(),
        }
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn inverted_operating_hours_are_rejected() {
        let mut config = sample();
        config.operating_hours = OperatingHours {
            start_hour: 20,
            end_hour: 8,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn consumer_secret_is_redacted_in_debug_output() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("\"secret\""));
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
