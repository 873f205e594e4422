//! Service configuration
//!
//! Loaded from an optional YAML file, then overridden by environment
//! variables, then validated. Both replica roles read the same config; the
//! role decides which ports and state subdirectory are used.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub use_json: bool,
    pub rotation: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "./logs".to_string(),
            file: "ftwallet.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReplicationConfig {
    pub backup_host: String,
    /// Primary's own RPC port, for future failover ingress
    pub primary_rpc_port: u16,
    pub backup_rpc_port: u16,
    pub replicate_timeout_ms: u64,
    pub ping_timeout_ms: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            backup_host: "127.0.0.1".to_string(),
            primary_rpc_port: 50051,
            backup_rpc_port: 50052,
            replicate_timeout_ms: 5000,
            ping_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FailoverConfig {
    pub health_interval_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding per-role state (ledger WAL + snapshots)
    pub state_dir: String,
    /// Balance snapshot every this many committed operations
    pub snapshot_interval_ops: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: "./data".to_string(),
            snapshot_interval_ops: 1000,
        }
    }
}

impl AppConfig {
    /// Load config from `config/<env>.yaml`, falling back to defaults when
    /// the file does not exist.
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let mut config: Self = if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path))?;
            serde_yaml::from_str(&content).context("Failed to parse config yaml")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over YAML config:
    /// - HTTP_PORT: gateway port (u16)
    /// - PRIMARY_RPC_PORT / BACKUP_RPC_PORT: replication ports (u16)
    /// - BACKUP_HOST: backup host for the primary's client
    /// - HEALTH_INTERVAL_MS / REPLICATE_TIMEOUT_MS / PING_TIMEOUT_MS
    /// - STATE_DIR: directory for snapshot and ledger files
    /// - LOG_LEVEL: trace/debug/info/warn/error
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("HTTP_PORT")
            && let Ok(p) = port.parse::<u16>()
        {
            self.http.port = p;
        }
        if let Ok(port) = std::env::var("PRIMARY_RPC_PORT")
            && let Ok(p) = port.parse::<u16>()
        {
            self.replication.primary_rpc_port = p;
        }
        if let Ok(port) = std::env::var("BACKUP_RPC_PORT")
            && let Ok(p) = port.parse::<u16>()
        {
            self.replication.backup_rpc_port = p;
        }
        if let Ok(host) = std::env::var("BACKUP_HOST") {
            self.replication.backup_host = host;
        }
        if let Ok(ms) = std::env::var("HEALTH_INTERVAL_MS")
            && let Ok(v) = ms.parse::<u64>()
        {
            self.failover.health_interval_ms = v;
        }
        if let Ok(ms) = std::env::var("REPLICATE_TIMEOUT_MS")
            && let Ok(v) = ms.parse::<u64>()
        {
            self.replication.replicate_timeout_ms = v;
        }
        if let Ok(ms) = std::env::var("PING_TIMEOUT_MS")
            && let Ok(v) = ms.parse::<u64>()
        {
            self.replication.ping_timeout_ms = v;
        }
        if let Ok(dir) = std::env::var("STATE_DIR") {
            self.storage.state_dir = dir;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log.level = level;
        }
    }

    /// Validate configuration at startup
    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            anyhow::bail!("Invalid http.port: must be > 0");
        }
        if self.replication.primary_rpc_port == 0 || self.replication.backup_rpc_port == 0 {
            anyhow::bail!("Invalid replication ports: must be > 0");
        }
        if self.replication.primary_rpc_port == self.replication.backup_rpc_port {
            anyhow::bail!("Invalid replication ports: primary and backup must differ");
        }
        if self.failover.health_interval_ms == 0 {
            anyhow::bail!("Invalid failover.health_interval_ms: must be > 0");
        }
        if self.replication.replicate_timeout_ms == 0 || self.replication.ping_timeout_ms == 0 {
            anyhow::bail!("Invalid replication timeouts: must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log.level '{}': must be one of {:?}",
                self.log.level,
                valid_levels
            );
        }

        Ok(())
    }

    /// Address the primary's client dials to reach the backup.
    pub fn backup_rpc_addr(&self) -> String {
        format!(
            "{}:{}",
            self.replication.backup_host, self.replication.backup_rpc_port
        )
    }

    /// Bind address for a role's replication server.
    pub fn rpc_bind_addr(&self, role: Role) -> String {
        let port = match role {
            Role::Primary => self.replication.primary_rpc_port,
            Role::Backup => self.replication.backup_rpc_port,
        };
        format!("0.0.0.0:{}", port)
    }

    /// Bind address for the HTTP gateway.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Per-role state directory, so both roles can share a host.
    pub fn state_dir(&self, role: Role) -> PathBuf {
        Path::new(&self.storage.state_dir).join(role.as_str())
    }

    pub fn replicate_timeout(&self) -> Duration {
        Duration::from_millis(self.replication.replicate_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.replication.ping_timeout_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.failover.health_interval_ms)
    }
}

/// Which replica this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Backup,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Backup => "backup",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" => Ok(Role::Primary),
            "backup" => Ok(Role::Backup),
            other => anyhow::bail!("unknown role '{}', expected 'primary' or 'backup'", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.replication.primary_rpc_port, 50051);
        assert_eq!(config.replication.backup_rpc_port, 50052);
        assert_eq!(config.failover.health_interval_ms, 5000);
        assert_eq!(config.replication.replicate_timeout_ms, 5000);
        assert_eq!(config.replication.ping_timeout_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.http.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_equal_rpc_ports() {
        let mut config = AppConfig::default();
        config.replication.primary_rpc_port = 50052;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = AppConfig::default();
        config.log.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_role_state_dirs_are_disjoint() {
        let config = AppConfig::default();
        assert_ne!(config.state_dir(Role::Primary), config.state_dir(Role::Backup));
        assert_eq!(config.backup_rpc_addr(), "127.0.0.1:50052");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("primary".parse::<Role>().unwrap(), Role::Primary);
        assert_eq!("backup".parse::<Role>().unwrap(), Role::Backup);
        assert!("observer".parse::<Role>().is_err());
    }
}
