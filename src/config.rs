use config::ConfigError;
use serde::Deserialize;
use std::env;

use crate::api::middleware::AppError;
use crate::services::remote::with_password;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    pub mirror: MirrorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Connection descriptor, e.g. `sqlite:./remote.db` or `postgresql://user@host/db`
    pub url: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Rows copied per table when a request does not say, 0 = unlimited
    pub default_row_limit: u64,
    pub on_startup: bool,
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();
        Self::load(|key| env::var(key).ok())
    }

    /// Build the configuration from defaults overridden by `lookup` (environment-style keys)
    pub fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("remote.url", "sqlite:./remote.db")?
            .set_default("mirror.default_row_limit", 1000)?
            .set_default("mirror.on_startup", false)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?;

        if let Some(url) = lookup("REMOTE_URL") {
            builder = builder.set_override("remote.url", url)?;
        }

        if let Some(password) = lookup("REMOTE_PASSWORD") {
            builder = builder.set_override("remote.password", Some(password))?;
        }

        if let Some(limit) = lookup("MIRROR_ROW_LIMIT") {
            let limit = limit.trim().parse::<u64>().map_err(|e| {
                ConfigError::Message(format!(
                    "MIRROR_ROW_LIMIT must be a non-negative integer, got {:?}: {}",
                    limit, e
                ))
            })?;
            builder = builder.set_override("mirror.default_row_limit", limit)?;
        }

        if let Some(on_startup) = lookup("MIRROR_ON_STARTUP") {
            let enabled = matches!(
                on_startup.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
            builder = builder.set_override("mirror.on_startup", enabled)?;
        }

        if let Some(tables) = lookup("MIRROR_TABLES") {
            let names: Vec<String> = tables
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if !names.is_empty() {
                builder = builder.set_override("mirror.tables", names)?;
            }
        }

        if let Some(host) = lookup("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Some(port) = lookup("PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::Message(format!("PORT must be a port number, got {:?}: {}", port, e)))?;
            builder = builder.set_override("server.port", port)?;
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Remote descriptor with the configured password merged in
    pub fn remote_descriptor(&self) -> Result<String, AppError> {
        match self.remote.password.as_deref() {
            Some(password) if !password.is_empty() => with_password(&self.remote.url, password),
            _ => Ok(self.remote.url.clone()),
        }
    }
}
