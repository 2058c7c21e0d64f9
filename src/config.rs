use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::models::PasswordParams;
use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};
use crate::validation::permitted_value;

/// Environment variable that overrides `general.database_path`.
pub const DATABASE_URL_ENV: &str = "MARQUEE_DATABASE_URL";

/// Upper bound for both token lifetimes. Expiries must stay within four-digit
/// years for stored timestamps to compare correctly.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 0)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Deadline for a single storage call, in milliseconds (default: 3000).
    /// Calls that exceed it are abandoned and reported as timeouts.
    pub query_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/marquee.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 0,
            max_db_connections: 5,
            min_db_connections: 1,
            query_timeout_ms: 3000,
        }
    }
}

impl GeneralConfig {
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            cors_allowed_origins: vec![
                "http://localhost:4000".to_string(),
                "http://127.0.0.1:4000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Lifetime of account activation tokens (default: 72h)
    pub activation_token_ttl_hours: i64,

    /// Lifetime of bearer authentication tokens (default: 24h)
    pub authentication_token_ttl_hours: i64,

    /// Permission codes granted to every newly registered account.
    pub default_permissions: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let params = PasswordParams::DEFAULT;
        Self {
            argon2_memory_cost_kib: params.memory_cost_kib,
            argon2_time_cost: params.time_cost,
            argon2_parallelism: params.parallelism,
            activation_token_ttl_hours: 72,
            authentication_token_ttl_hours: 24,
            default_permissions: vec![MOVIES_READ.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            json_logs: false,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = Self::default();
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Self::load_from_path(path)?;
                break;
            }
        }

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.general.database_path = url;
        }

        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("marquee").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".marquee").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.query_timeout_ms == 0 {
            anyhow::bail!("general.query_timeout_ms must be > 0");
        }

        if self.general.max_db_connections == 0
            || self.general.min_db_connections > self.general.max_db_connections
        {
            anyhow::bail!("Database pool bounds are invalid");
        }

        for (name, hours) in [
            (
                "activation_token_ttl_hours",
                self.security.activation_token_ttl_hours,
            ),
            (
                "authentication_token_ttl_hours",
                self.security.authentication_token_ttl_hours,
            ),
        ] {
            if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
                anyhow::bail!(
                    "security.{name} must be between 1 and {MAX_TOKEN_TTL_HOURS} hours, got {hours}"
                );
            }
        }

        for code in &self.security.default_permissions {
            if !permitted_value(&code.as_str(), &[MOVIES_READ, MOVIES_WRITE]) {
                anyhow::bail!("Unknown permission code in security.default_permissions: {code}");
            }
        }

        self.password_params()
            .check()
            .context("security.argon2_* settings are invalid")?;

        Ok(())
    }

    #[must_use]
    pub fn password_params(&self) -> PasswordParams {
        PasswordParams::from(&self.security)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.query_timeout_ms, 3000);
        assert_eq!(config.security.activation_token_ttl_hours, 72);
        assert_eq!(config.security.authentication_token_ttl_hours, 24);
        assert_eq!(config.security.default_permissions, vec!["movies:read"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security]"));
        assert!(toml_str.contains("[observability]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"
            query_timeout_ms = 500

            [security]
            authentication_token_ttl_hours = 1
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.query_timeout(), Duration::from_millis(500));
        assert_eq!(config.security.authentication_token_ttl_hours, 1);

        assert_eq!(config.security.activation_token_ttl_hours, 72);
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.general.query_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.activation_token_ttl_hours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.authentication_token_ttl_hours = MAX_TOKEN_TTL_HOURS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.authentication_token_ttl_hours = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.activation_token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.security.argon2_time_cost = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.default_permissions = vec!["movies:delete".to_string()];
        assert!(config.validate().is_err());
    }
}
