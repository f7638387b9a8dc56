//! Replica Registry
//!
//! Enumerates the replicas of a reconciliation pass and resolves each one
//! to a network endpoint. The registry never manages replica lifecycles.

mod docker;
mod fixed;

use async_trait::async_trait;

pub use docker::DockerRegistry;
pub use fixed::StaticRegistry;

use crate::config::{RegistryConfig, RegistryKind};
use crate::error::Result;

/// One replica database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub id: String,
    pub name: String,
    /// Whether rows are harvested from this replica into master
    pub contributing: bool,
}

/// Host and port of a replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// Source of replicas
#[async_trait]
pub trait ReplicaRegistry: Send + Sync {
    /// Replicas to reconcile, in processing order
    async fn replicas(&self) -> Result<Vec<Replica>>;

    /// Resolve a replica's endpoint; `None` when it is unavailable
    async fn endpoint_for(&self, replica_id: &str) -> Option<Endpoint>;
}

/// Build the registry selected by configuration
pub fn from_config(config: &RegistryConfig) -> Box<dyn ReplicaRegistry> {
    match config.kind {
        RegistryKind::Docker => Box::new(DockerRegistry::new(config)),
        RegistryKind::Static => Box::new(StaticRegistry::new(&config.replicas)),
    }
}
