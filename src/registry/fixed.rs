//! Registry backed by the replica list in the configuration file

use async_trait::async_trait;

use super::{Endpoint, Replica, ReplicaRegistry};
use crate::config::StaticReplica;
use crate::error::Result;

/// Fixed replica list
pub struct StaticRegistry {
    replicas: Vec<StaticReplica>,
}

impl StaticRegistry {
    pub fn new(replicas: &[StaticReplica]) -> Self {
        Self {
            replicas: replicas.to_vec(),
        }
    }
}

#[async_trait]
impl ReplicaRegistry for StaticRegistry {
    async fn replicas(&self) -> Result<Vec<Replica>> {
        Ok(self
            .replicas
            .iter()
            .map(|r| Replica {
                id: r.id.clone(),
                name: r.name.clone(),
                contributing: r.contributing,
            })
            .collect())
    }

    async fn endpoint_for(&self, replica_id: &str) -> Option<Endpoint> {
        self.replicas
            .iter()
            .find(|r| r.id == replica_id)
            .map(|r| Endpoint {
                host: r.host.clone(),
                port: r.port,
            })
    }
}
