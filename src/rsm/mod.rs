pub mod updater;

use serde::{Deserialize, Serialize};

use crate::communication::peers::NodeId;
use crate::errors::RaftError;
use crate::operation_log::LogEntry;

/// Point-in-time copy of the state machine and the log position it covers.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_included_index: u64,
    pub last_included_term: u64,

    /// Cluster configuration as of the last included entry.
    pub cluster_members: Vec<NodeId>,
    pub data: Vec<u8>,
}

/// Provides Raft operations with the underlying replicated state machine.
pub trait ReplicatedStateMachine: Send + 'static {
    /// Apply operation log entry to the state machine. Entries with index not greater than
    /// the last applied index are ignored. The applied index moves to the entry index
    /// even when the entry command is rejected; the error is returned to the client.
    fn apply_entry(&mut self, entry: &LogEntry) -> Result<(), RaftError>;

    /// Returns index of the last operation log entry applied to the state machine.
    fn last_applied_entry_index(&self) -> u64;

    /// Point read of the key.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Serialized copy of the state.
    fn snapshot_data(&self) -> Result<Vec<u8>, RaftError>;

    /// Replaces the whole state and sets the last applied index.
    fn restore(&mut self, last_included_index: u64, data: &[u8]) -> Result<(), RaftError>;
}
