use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::communication::peers::NodeId;
use crate::errors::{new_err, RaftError};
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipStatusWatchdog;
use crate::node::configuration::NodeLimits;
use crate::node::state::{Node, NodeState, NodeStateSaver, ProtectedNode};
use crate::operation_log::{DataEntryContent, EntryContent, LogEntry, OperationLog};
use crate::rsm::Snapshot;

#[derive(Clone, Debug, Default)]
pub struct MockOperationLog {
    entries: Vec<LogEntry>,
    snapshot: Option<Snapshot>,
    pub read_failure: Option<RaftError>,
}

impl MockOperationLog {
    pub fn new() -> MockOperationLog {
        MockOperationLog::default()
    }

    fn position(&self, index: u64) -> Option<usize> {
        let first_index = self.entries.first()?.index;
        if index < first_index {
            return None;
        }

        Some((index - first_index) as usize)
    }
}

impl OperationLog for MockOperationLog {
    fn append_entries(&mut self, entries: Vec<LogEntry>) -> Result<(), RaftError> {
        for entry in entries {
            if entry.index != self.last_entry_index() + 1 {
                return new_err(format!("Gap in the log at {}", entry.index), String::new());
            }
            self.entries.push(entry);
        }

        Ok(())
    }

    fn entry(&self, index: u64) -> Option<LogEntry> {
        self.position(index)
            .and_then(|pos| self.entries.get(pos))
            .cloned()
    }

    fn last_entry_index(&self) -> u64 {
        match self.entries.last() {
            Some(entry) => entry.index,
            None => self.snapshot_index(),
        }
    }

    fn last_entry_term(&self) -> u64 {
        match self.entries.last() {
            Some(entry) => entry.term,
            None => self.snapshot_term(),
        }
    }

    fn truncate_suffix(&mut self, from_index: u64) -> Result<(), RaftError> {
        if let Some(pos) = self.position(from_index) {
            self.entries.truncate(pos);
        }

        Ok(())
    }

    fn truncate_prefix(&mut self, upto_index: u64) -> Result<(), RaftError> {
        self.entries.retain(|entry| entry.index > upto_index);

        Ok(())
    }

    fn save_snapshot(&mut self, snapshot: Snapshot) -> Result<(), RaftError> {
        self.snapshot = Some(snapshot);

        Ok(())
    }

    fn read_failure(&self) -> Option<RaftError> {
        self.read_failure.clone()
    }

    fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.clone()
    }

    fn snapshot_index(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |snapshot| snapshot.last_included_index)
    }

    fn snapshot_term(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |snapshot| snapshot.last_included_term)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockNodeStateSaver {
    pub fail: Arc<AtomicBool>,
    pub saved: Arc<Mutex<Vec<NodeState>>>,
}

impl NodeStateSaver for MockNodeStateSaver {
    fn save_node_state(&self, state: &NodeState) -> Result<(), RaftError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RaftError::durability("Disk is full".to_string(), String::new()));
        }

        self.saved.lock().push(state.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockWatchdog;

impl ResetLeadershipStatusWatchdog for MockWatchdog {
    fn reset_leadership_status_watchdog(&self) {}
}

/// Node under test with the receiving ends of its notification channels.
pub struct TestNode {
    pub node: Node<MockOperationLog, MockNodeStateSaver>,
    pub replicate_log_to_peer_rx: Receiver<NodeId>,
    pub commit_index_updated_rx: Receiver<u64>,
    pub node_failure_rx: Receiver<RaftError>,
    pub state_saver: MockNodeStateSaver,
}

pub fn data_entry(index: u64, term: u64) -> LogEntry {
    LogEntry {
        index,
        term,
        entry_content: EntryContent::Data(DataEntryContent {
            data: vec![index as u8],
        }),
    }
}

pub fn test_node(id: &str, current_term: u64, log: MockOperationLog) -> TestNode {
    let (replicate_log_to_peer_tx, replicate_log_to_peer_rx): (Sender<NodeId>, Receiver<NodeId>) =
        crossbeam_channel::unbounded();
    let (commit_index_updated_tx, commit_index_updated_rx): (Sender<u64>, Receiver<u64>) =
        crossbeam_channel::unbounded();
    let (node_failure_tx, node_failure_rx): (Sender<RaftError>, Receiver<RaftError>) =
        crossbeam_channel::unbounded();
    let state_saver = MockNodeStateSaver::default();

    let node_state = NodeState {
        node_id: id.to_string(),
        current_term,
        vote_for_id: None,
    };

    let node = Node::new(
        node_state,
        log,
        state_saver.clone(),
        NodeLimits::default(),
        replicate_log_to_peer_tx,
        commit_index_updated_tx,
        node_failure_tx,
    );

    TestNode {
        node,
        replicate_log_to_peer_rx,
        commit_index_updated_rx,
        node_failure_rx,
        state_saver,
    }
}

/// Wraps the node for the request processors. Channel receivers stay alive in the result.
pub fn protected(test_node: TestNode) -> (ProtectedNode<MockOperationLog, MockNodeStateSaver>, TestChannels) {
    let channels = TestChannels {
        replicate_log_to_peer_rx: test_node.replicate_log_to_peer_rx,
        commit_index_updated_rx: test_node.commit_index_updated_rx,
        node_failure_rx: test_node.node_failure_rx,
    };

    (Arc::new(Mutex::new(test_node.node)), channels)
}

pub struct TestChannels {
    pub replicate_log_to_peer_rx: Receiver<NodeId>,
    pub commit_index_updated_rx: Receiver<u64>,
    pub node_failure_rx: Receiver<RaftError>,
}

pub fn configuration_entry(index: u64, term: u64, members: &[&str]) -> LogEntry {
    LogEntry {
        index,
        term,
        entry_content: EntryContent::ClusterConfiguration(
            crate::operation_log::NewClusterConfigurationEntryContent {
                new_cluster_configuration: members.iter().map(|m| m.to_string()).collect(),
            },
        ),
    }
}
