use anyhow::{anyhow, Context, Result};
use std::env;

use crate::payments::providers::FibConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub fib: FibConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token cache backend. Without a URL the token lives in process memory.
#[derive(Debug, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let redis = RedisConfig {
            url: env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        };

        let fib = FibConfig::from_env().context("Invalid FIB configuration")?;

        let config = Config {
            server,
            database,
            redis,
            fib,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if !self.fib.callback_url.starts_with("http://")
            && !self.fib.callback_url.starts_with("https://")
        {
            return Err(anyhow!(
                "FIB_CALLBACK_URL must be an absolute http(s) URL, got {}",
                self.fib.callback_url
            ));
        }

        if self.fib.currency.trim().len() != 3 {
            return Err(anyhow!(
                "FIB_CURRENCY must be a 3-letter code, got {}",
                self.fib.currency
            ));
        }

        if self.fib.timeout_secs == 0 {
            return Err(anyhow!("FIB_TIMEOUT_SECS must be greater than 0"));
        }

        // Certificate checks may only be skipped outside production
        if self.fib.accept_invalid_certs && self.server.environment == "production" {
            return Err(anyhow!(
                "FIB_ACCEPT_INVALID_CERTS cannot be enabled in production"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                environment: "development".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/payments".to_string(),
                max_connections: 20,
            },
            redis: RedisConfig::default(),
            fib: FibConfig {
                client_id: "shop".to_string(),
                client_secret: "secret".to_string(),
                callback_url: "https://shop.example/api/webhooks/fib".to_string(),
                ..FibConfig::default()
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_privileged_port() {
        let mut config = valid_config();
        config.server.port = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_environment() {
        let mut config = valid_config();
        config.server.environment = "qa".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_relative_callback_url() {
        let mut config = valid_config();
        config.fib.callback_url = "/api/webhooks/fib".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_insecure_tls_only_outside_production() {
        let mut config = valid_config();
        config.fib.accept_invalid_certs = true;
        assert!(config.validate().is_ok());

        config.server.environment = "production".to_string();
        assert!(config.validate().is_err());
    }
}
