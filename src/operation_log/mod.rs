pub mod replication;

use serde::{Deserialize, Serialize};

use crate::communication::peers::NodeId;
use crate::errors::RaftError;
use crate::rsm::Snapshot;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DataEntryContent {
    pub data: Vec<u8>,
}

/// Full member list of the new cluster configuration.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NewClusterConfigurationEntryContent {
    pub new_cluster_configuration: Vec<NodeId>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EntryContent {
    NoOp,
    Data(DataEntryContent),
    ClusterConfiguration(NewClusterConfigurationEntryContent),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub term: u64,
    pub entry_content: EntryContent,
}

/// Durable operation log. Every mutating call returns only after the change is
/// persisted. Indices before the snapshot are compacted away: `entry()` returns
/// `None` for them and the snapshot metadata stands in for the last compacted entry.
pub trait OperationLog: Send + 'static {
    fn create_next_entry(&mut self, term: u64, entry_content: EntryContent) -> LogEntry {
        LogEntry {
            index: self.last_entry_index() + 1,
            term,
            entry_content,
        }
    }

    /// Appends contiguous entries right after the last entry.
    fn append_entries(&mut self, entries: Vec<LogEntry>) -> Result<(), RaftError>;
    fn entry(&self, index: u64) -> Option<LogEntry>;

    /// Last entry index. Snapshot index when the log is empty after compaction.
    fn last_entry_index(&self) -> u64;
    fn last_entry_term(&self) -> u64;

    /// Removes entries with index >= from_index.
    fn truncate_suffix(&mut self, from_index: u64) -> Result<(), RaftError>;

    /// Removes entries with index <= upto_index.
    fn truncate_prefix(&mut self, upto_index: u64) -> Result<(), RaftError>;

    fn save_snapshot(&mut self, snapshot: Snapshot) -> Result<(), RaftError>;
    fn snapshot(&self) -> Option<Snapshot>;
    fn snapshot_index(&self) -> u64;
    fn snapshot_term(&self) -> u64;

    /// First failed read since the log was opened. Failed reads return `None` from
    /// `entry()`, the node halts once it sees the failure here.
    fn read_failure(&self) -> Option<RaftError> {
        None
    }

    fn append_entry(&mut self, entry: LogEntry) -> Result<(), RaftError> {
        self.append_entries(vec![entry])
    }

    /// Entries in the inclusive index range. Stops at the first missing entry.
    fn entries(&self, from_index: u64, to_index: u64) -> Vec<LogEntry> {
        (from_index..=to_index)
            .map(|index| self.entry(index))
            .take_while(|entry| entry.is_some())
            .flatten()
            .collect()
    }

    /// Term of the entry with the index, including the last compacted one.
    fn term_at(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        if index == self.snapshot_index() {
            return Some(self.snapshot_term());
        }
        self.entry(index).map(|entry| entry.term)
    }
}
