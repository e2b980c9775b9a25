pub mod join;
pub mod join_request_processor;

use std::collections::BTreeSet;
use std::time::Duration;

use crate::communication::peers::NodeId;
use crate::errors::{new_err, RaftError};

/// Current set of voting members. Calculates quorum as majority.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClusterConfiguration {
    members: BTreeSet<NodeId>,
}

impl ClusterConfiguration {
    pub fn new(members: Vec<NodeId>) -> ClusterConfiguration {
        ClusterConfiguration {
            members: members.into_iter().collect(),
        }
    }

    pub fn quorum_size(&self) -> u32 {
        let node_count = self.members.len() as u32;

        node_count / 2 + 1 //majority
    }

    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.members.iter().cloned().collect()
    }

    pub fn peers(&self, node_id: &str) -> Vec<NodeId> {
        self.members
            .iter()
            .filter(|member| member.as_str() != node_id)
            .cloned()
            .collect()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.members.contains(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member list of the configuration extended with the new node.
    pub fn with_member(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut members = self.members.clone();
        members.insert(node_id);

        members.into_iter().collect()
    }
}

/// Exponential backoff policy for the join attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,

    /// None - retry until success or node termination.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt with the number (starting from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .checked_mul(2u32.pow(exponent))
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max_attempts) => attempt >= max_attempts,
            None => false,
        }
    }
}

/// Record for the external service discovery registry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display)]
#[display(fmt = "group_{} {}:{}", group_id, host, port)]
pub struct ServiceRegistration {
    pub group_id: u64,
    pub host: String,
    pub port: u16,
}

impl ServiceRegistration {
    /// Builds the record from the node bind address ("host:port").
    pub fn new(group_id: u64, bind_address: &str) -> Result<ServiceRegistration, RaftError> {
        let (host, port) = match bind_address.rsplit_once(':') {
            Some(parts) => parts,
            None => {
                return new_err(
                    format!("Invalid bind address: {}", bind_address),
                    "port expected".to_string(),
                )
            }
        };

        let port = match port.parse::<u16>() {
            Ok(port) => port,
            Err(err) => {
                return new_err(format!("Invalid bind address: {}", bind_address), err.to_string())
            }
        };

        Ok(ServiceRegistration {
            group_id,
            host: host.to_string(),
            port,
        })
    }

    /// Registry key for the node group.
    pub fn group_key(&self) -> String {
        format!("group_{}", self.group_id)
    }
}
