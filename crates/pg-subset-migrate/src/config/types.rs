//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration.
    pub source: SourceConfig,

    /// Target database configuration.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

/// Target database connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name. Created on the server if it does not exist.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Maintenance database used for the existence check and CREATE DATABASE
    /// (default: "postgres").
    #[serde(default = "default_maintenance_db")]
    pub maintenance_db: String,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per INSERT batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Explicit table allow-list. When set, replaces keyword classification.
    #[serde(default)]
    pub tables: Option<Vec<String>>,

    /// Extension enabled in the target database before migration
    /// (default: "uuid-ossp").
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            tables: None,
            extension: default_extension(),
        }
    }
}

// Passwords must never leak into logs, so Debug is written by hand.

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("maintenance_db", &self.maintenance_db)
            .finish()
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_maintenance_db() -> String {
    "postgres".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_extension() -> String {
    "uuid-ossp".to_string()
}
