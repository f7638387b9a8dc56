//! Reconciliation Error Types

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciliation error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Connectivity errors
    #[error("Connection failed to {target} after {attempts} attempt(s): {reason}")]
    Connectivity {
        target: String,
        attempts: u32,
        reason: String,
    },

    #[error("Replica registry error: {0}")]
    Registry(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Metadata query failed on {target}: {reason}")]
    MetadataQuery { target: String, reason: String },

    #[error("Statement failed on {target}: {reason}")]
    Statement { target: String, reason: String },

    // Phase errors
    #[error("Structure sync failed on {target}: {reason}")]
    DdlApplication { target: String, reason: String },

    #[error("Data harvest of {table} from {replica} failed: {reason}")]
    DataHarvest {
        table: String,
        replica: String,
        reason: String,
    },

    #[error("Reference rewrite failed on {replica}: {reason}")]
    ReferenceRewrite { replica: String, reason: String },

    #[error("Backup failed: {0}")]
    Backup(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable
    ///
    /// Only connection establishment is ever retried; statement failures
    /// surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connectivity { .. })
    }

    /// Wrap any error raised while applying a batch into the error for that phase
    pub fn into_phase_error(self, phase: crate::orchestrator::Phase, target: &str) -> Error {
        use crate::orchestrator::Phase;

        let reason = self.to_string();
        match phase {
            Phase::StructureSync => Error::DdlApplication {
                target: target.to_string(),
                reason,
            },
            Phase::ReferenceRewrite => Error::ReferenceRewrite {
                replica: target.to_string(),
                reason,
            },
            _ => self,
        }
    }
}
