//! Docker Registry
//!
//! Replicas are the running containers whose name contains the configured
//! filter. Containers whose name contains the test marker are kept out of
//! data harvesting.

use async_trait::async_trait;
use tokio::process::Command;

use super::{Endpoint, Replica, ReplicaRegistry};
use crate::config::RegistryConfig;
use crate::error::{Error, Result};

/// Replicas discovered through `docker ps`
pub struct DockerRegistry {
    container_filter: String,
    container_port: u16,
    host: String,
    test_marker: String,
}

impl DockerRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            container_filter: config.container_filter.clone(),
            container_port: config.container_port,
            host: config.host.clone(),
            test_marker: config.test_marker.to_lowercase(),
        }
    }
}

#[async_trait]
impl ReplicaRegistry for DockerRegistry {
    async fn replicas(&self) -> Result<Vec<Replica>> {
        let output = Command::new("docker")
            .args(["ps", "--format", "{{.ID}}\t{{.Names}}"])
            .output()
            .await
            .map_err(|e| Error::Registry(format!("Failed to execute docker: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Registry(format!(
                "docker ps failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let replicas = parse_ps(
            &String::from_utf8_lossy(&output.stdout),
            &self.container_filter,
            &self.test_marker,
        );
        tracing::info!(
            "Found {} container(s) matching '{}'",
            replicas.len(),
            self.container_filter
        );
        Ok(replicas)
    }

    async fn endpoint_for(&self, replica_id: &str) -> Option<Endpoint> {
        let output = Command::new("docker")
            .arg("port")
            .arg(replica_id)
            .arg(self.container_port.to_string())
            .output()
            .await;

        match output {
            Ok(result) if result.status.success() => {
                let port = parse_port(&String::from_utf8_lossy(&result.stdout))?;
                Some(Endpoint {
                    host: self.host.clone(),
                    port,
                })
            }
            Ok(result) => {
                tracing::error!(
                    "Error getting port for container {}: {}",
                    replica_id,
                    String::from_utf8_lossy(&result.stderr).trim()
                );
                None
            }
            Err(e) => {
                tracing::error!("Failed to execute docker port for {}: {}", replica_id, e);
                None
            }
        }
    }
}

/// Parse `docker ps --format '{{.ID}}\t{{.Names}}'` output
fn parse_ps(output: &str, filter: &str, test_marker: &str) -> Vec<Replica> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(_, name)| name.contains(filter))
        .map(|(id, name)| Replica {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            contributing: test_marker.is_empty() || !name.to_lowercase().contains(test_marker),
        })
        .collect()
}

/// Parse `docker port` output such as `0.0.0.0:55432`
fn parse_port(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps() {
        let output = "a1b2c3\tloot_db_1\nd4e5f6\tloot_db_test\n0789ab\tredis\n\n";
        let replicas = parse_ps(output, "loot_db", "test");

        assert_eq!(replicas.len(), 2);
        assert_eq!(replicas[0].id, "a1b2c3");
        assert!(replicas[0].contributing);
        assert_eq!(replicas[1].name, "loot_db_test");
        assert!(!replicas[1].contributing);
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("0.0.0.0:55432\n[::]:55432\n"), Some(55432));
        assert_eq!(parse_port(""), None);
        assert_eq!(parse_port("garbage"), None);
    }
}
