//! Reconciliation Configuration
//!
//! This module provides configuration structures for the master database,
//! the replica registry and the table catalog that drives a reconciliation pass.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Master database connection
    pub master: DatabaseConfig,

    /// Where replicas are discovered
    pub registry: RegistryConfig,

    /// Connection retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Tables whose new rows are harvested from replicas into master
    #[serde(default)]
    pub contributing_tables: Vec<String>,

    /// Reference tables mirrored from master to every replica
    #[serde(default)]
    pub lookup_tables: Vec<LookupTableConfig>,

    /// Foreign-key columns that point at contributing tables
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,

    /// Comparison tolerances
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Master backup before mutation
    #[serde(default)]
    pub backup: BackupConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL host
    pub host: String,

    /// PostgreSQL port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database user
    pub user: String,

    /// Database password
    pub password: String,

    /// Database name
    pub database: String,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Replica registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry kind
    #[serde(default)]
    pub kind: RegistryKind,

    /// Substring a container name must contain to be treated as a replica
    #[serde(default = "default_container_filter")]
    pub container_filter: String,

    /// Container-side database port to resolve
    #[serde(default = "default_db_port")]
    pub container_port: u16,

    /// Host the published container ports are reachable on
    #[serde(default = "default_host")]
    pub host: String,

    /// Containers whose name contains this marker never contribute data
    #[serde(default = "default_test_marker")]
    pub test_marker: String,

    /// Statically declared replicas
    #[serde(default)]
    pub replicas: Vec<StaticReplica>,
}

/// How replicas are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// Running Docker containers
    #[default]
    Docker,
    /// The `replicas` list in this file
    Static,
}

/// A statically declared replica
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticReplica {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub contributing: bool,
}

/// Connection retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Connection attempts before giving up
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

/// Lookup table declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupTableConfig {
    /// Table name
    pub name: String,

    /// Fields forming the natural key
    pub key_fields: Vec<String>,

    /// Database-local surrogate identity column
    #[serde(default)]
    pub id_field: Option<String>,

    /// Push master content over rows whose content drifted
    #[serde(default)]
    pub propagate_updates: bool,
}

/// Foreign-key reference declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Table holding the reference
    pub table: String,

    /// Referencing column
    pub column: String,

    /// Table whose identity the column holds
    pub target: String,

    /// Array-valued column; inferred from the master column type when absent
    #[serde(default)]
    pub array: Option<bool>,
}

/// Numeric comparison tolerances
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComparisonConfig {
    #[serde(default = "default_absolute_epsilon")]
    pub absolute_epsilon: f64,

    #[serde(default = "default_relative_epsilon")]
    pub relative_epsilon: f64,
}

/// Backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Dump master before the first mutation
    #[serde(default)]
    pub enabled: bool,

    /// Directory backups are written to
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// pg_dump executable
    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_db_port() -> u16 {
    5432
}

fn default_pool_size() -> u32 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_container_filter() -> String {
    "loot_db".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_test_marker() -> String {
    "test".to_string()
}

fn default_true() -> bool {
    true
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_absolute_epsilon() -> f64 {
    1e-9
}

fn default_relative_epsilon() -> f64 {
    1e-6
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            absolute_epsilon: default_absolute_epsilon(),
            relative_epsilon: default_relative_epsilon(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_backup_dir(),
            pg_dump: default_pg_dump(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ReconcileConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.master.host.is_empty() {
            return Err(crate::Error::Config("master.host cannot be empty".into()));
        }

        if self.master.database.is_empty() {
            return Err(crate::Error::Config("master.database cannot be empty".into()));
        }

        if self.retry.attempts == 0 {
            return Err(crate::Error::Config("retry.attempts must be at least 1".into()));
        }

        if self.registry.kind == RegistryKind::Static {
            for replica in &self.registry.replicas {
                if replica.id.is_empty() || replica.host.is_empty() {
                    return Err(crate::Error::Config(format!(
                        "static replica '{}' needs an id and a host",
                        replica.name
                    )));
                }
            }
        }

        for table in &self.lookup_tables {
            if table.key_fields.is_empty() {
                return Err(crate::Error::Config(format!(
                    "lookup table '{}' declares no key_fields",
                    table.name
                )));
            }
            if let Some(id) = &table.id_field {
                if table.key_fields.contains(id) {
                    return Err(crate::Error::Config(format!(
                        "lookup table '{}' uses its id_field '{}' as a natural key",
                        table.name, id
                    )));
                }
            }
        }

        for table in &self.contributing_tables {
            if self.lookup_table(table).is_none() {
                return Err(crate::Error::Config(format!(
                    "contributing table '{}' has no lookup_tables entry",
                    table
                )));
            }
        }

        for reference in &self.references {
            let target = self.lookup_table(&reference.target).ok_or_else(|| {
                crate::Error::Config(format!(
                    "reference {}.{} targets undeclared table '{}'",
                    reference.table, reference.column, reference.target
                ))
            })?;
            if target.id_field.is_none() {
                return Err(crate::Error::Config(format!(
                    "reference {}.{} targets '{}' which has no id_field",
                    reference.table, reference.column, reference.target
                )));
            }
        }

        Ok(())
    }

    /// Look up a lookup table declaration by name
    pub fn lookup_table(&self, name: &str) -> Option<&LookupTableConfig> {
        self.lookup_tables.iter().find(|t| t.name == name)
    }

    /// Sample configuration for the loot-tracking deployment
    pub fn sample() -> &'static str {
        SAMPLE_CONFIG
    }
}

impl RetryConfig {
    /// Delay between connection attempts
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl DatabaseConfig {
    /// Connection URL for another endpoint sharing these credentials
    pub fn url_for(&self, host: &str, port: u16) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, host, port, self.database
        )
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

const SAMPLE_CONFIG: &str = r#"contributing_tables = ["item", "mod"]

[master]
host = "localhost"
port = 5432
user = "loot_user"
password = "change-me"
database = "loot_tracking"

[registry]
kind = "docker"
container_filter = "loot_db"
container_port = 5432
test_marker = "test"

[retry]
attempts = 3
backoff_ms = 2000

[[lookup_tables]]
name = "impositions"
key_fields = ["name"]
id_field = "id"

[[lookup_tables]]
name = "item"
key_fields = ["name", "type"]
id_field = "id"

[[lookup_tables]]
name = "min_caster_levels"
key_fields = ["spell_level", "item_type"]

[[lookup_tables]]
name = "min_costs"
key_fields = ["spell_level"]

[[lookup_tables]]
name = "mod"
key_fields = ["name", "type"]
id_field = "id"

[[lookup_tables]]
name = "spells"
key_fields = ["name"]
id_field = "id"

[[lookup_tables]]
name = "weather_regions"
key_fields = ["region_name"]

[[references]]
table = "loot"
column = "itemid"
target = "item"

[[references]]
table = "loot"
column = "modids"
target = "mod"

[backup]
enabled = true
dir = "."

[logging]
level = "info"
format = "pretty"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_config() {
        let config = ReconcileConfig::from_str(ReconcileConfig::sample()).unwrap();
        assert_eq!(config.master.database, "loot_tracking");
        assert_eq!(config.registry.kind, RegistryKind::Docker);
        assert_eq!(config.lookup_tables.len(), 7);
        assert_eq!(config.contributing_tables, vec!["item", "mod"]);
        assert_eq!(config.references.len(), 2);
        assert_eq!(config.retry.backoff(), Duration::from_secs(2));
        assert!(config.lookup_table("min_costs").unwrap().id_field.is_none());
    }

    #[test]
    fn test_static_registry() {
        let toml = r#"
[master]
host = "db.internal"
user = "u"
password = "p"
database = "loot_tracking"

[registry]
kind = "static"

[[registry.replicas]]
id = "r1"
name = "loot_db_1"
host = "10.0.0.5"
port = 5433

[[registry.replicas]]
id = "r2"
name = "loot_db_test"
host = "10.0.0.6"
contributing = false
"#;

        let config = ReconcileConfig::from_str(toml).unwrap();
        assert_eq!(config.registry.kind, RegistryKind::Static);
        assert_eq!(config.registry.replicas.len(), 2);
        assert!(config.registry.replicas[0].contributing);
        assert!(!config.registry.replicas[1].contributing);
        assert_eq!(config.registry.replicas[1].port, 5432);
        assert_eq!(
            config.master.url_for("10.0.0.5", 5433),
            "postgres://u:p@10.0.0.5:5433/loot_tracking"
        );
    }

    #[test]
    fn test_reference_to_table_without_identity_is_rejected() {
        let toml = r#"
[master]
host = "localhost"
user = "u"
password = "p"
database = "d"

[registry]

[[lookup_tables]]
name = "min_costs"
key_fields = ["spell_level"]

[[references]]
table = "loot"
column = "costid"
target = "min_costs"
"#;

        let err = ReconcileConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("no id_field"));
    }

    #[test]
    fn test_contributing_table_must_be_declared() {
        let toml = r#"
contributing_tables = ["item"]

[master]
host = "localhost"
user = "u"
password = "p"
database = "d"

[registry]
"#;

        assert!(matches!(
            ReconcileConfig::from_str(toml),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconcile.toml");
        std::fs::write(&path, ReconcileConfig::sample()).unwrap();

        let config = ReconcileConfig::from_file(&path).unwrap();
        assert!(config.backup.enabled);
        assert_eq!(config.logging.level, "info");
    }
}
