use std::cmp;
use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::communication::peers::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    NodeId,
};
use crate::errors::{new_err, RaftError};
use crate::membership::ClusterConfiguration;
use crate::node::configuration::NodeLimits;
use crate::operation_log::{EntryContent, LogEntry, NewClusterConfigurationEntryContent, OperationLog};
use crate::rsm::Snapshot;

#[cfg(test)]
pub(crate) mod mocks;

pub type ProtectedNode<Log, Ns> = Arc<Mutex<Node<Log, Ns>>>;

/// Node state shared by the node workers. Every worker takes the lock for the whole
/// read-modify-write sequence and never holds it while waiting on the network.
#[derive(Debug)]
pub struct Node<Log, Ns>
where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    pub id: NodeId,
    current_term: u64,
    voted_for_id: Option<NodeId>,

    pub current_leader_id: Option<NodeId>,
    pub status: NodeStatus,
    next_index: HashMap<NodeId, u64>,
    match_index: HashMap<NodeId, u64>,
    commit_index: u64,
    halted: bool,

    pub log: Log,
    state_saver: Ns,
    limits: NodeLimits,

    cluster_configuration: ClusterConfiguration,
    cluster_configuration_index: u64,

    replicate_log_to_peer_tx: Sender<NodeId>,
    commit_index_updated_tx: Sender<u64>,
    node_failure_tx: Sender<RaftError>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display)]
pub enum NodeStatus {
    Follower,
    Candidate,
    Leader,
}

/// Persistent part of the node state.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display)]
#[display(
    fmt = "Node state: id {} term {} voted for {:?}",
    node_id,
    current_term,
    vote_for_id
)]
pub struct NodeState {
    pub node_id: NodeId,
    pub current_term: u64,
    pub vote_for_id: Option<NodeId>,
}

impl NodeState {
    pub fn new(node_id: NodeId) -> NodeState {
        NodeState {
            node_id,
            current_term: 0,
            vote_for_id: None,
        }
    }
}

/// Durable storage for the current term and vote. Must persist before returning.
pub trait NodeStateSaver: Send + Sync + 'static {
    fn save_node_state(&self, state: &NodeState) -> Result<(), RaftError>;
}

#[derive(Clone, Debug)]
pub enum ReplicationRequest {
    AppendEntries(AppendEntriesRequest),
    InstallSnapshot(InstallSnapshotRequest),
}

impl<Log, Ns> Node<Log, Ns>
where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    pub fn new(
        node_state: NodeState,
        log: Log,
        state_saver: Ns,
        limits: NodeLimits,
        replicate_log_to_peer_tx: Sender<NodeId>,
        commit_index_updated_tx: Sender<u64>,
        node_failure_tx: Sender<RaftError>,
    ) -> Node<Log, Ns> {
        let mut node = Node {
            id: node_state.node_id,
            current_term: node_state.current_term,
            voted_for_id: node_state.vote_for_id,
            current_leader_id: None,
            status: NodeStatus::Follower,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            commit_index: 0,
            halted: false,
            log,
            state_saver,
            limits,
            cluster_configuration: ClusterConfiguration::default(),
            cluster_configuration_index: 0,
            replicate_log_to_peer_tx,
            commit_index_updated_tx,
            node_failure_tx,
        };

        node.rebuild_cluster_configuration();

        //snapshot covers committed entries only
        let snapshot_index = node.log.snapshot_index();
        if snapshot_index > 0 {
            node.set_commit_index(snapshot_index);
        }

        node
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn voted_for_id(&self) -> Option<&NodeId> {
        self.voted_for_id.as_ref()
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    pub fn limits(&self) -> &NodeLimits {
        &self.limits
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn cluster_configuration(&self) -> &ClusterConfiguration {
        &self.cluster_configuration
    }

    pub fn peers(&self) -> Vec<NodeId> {
        self.cluster_configuration.peers(&self.id)
    }

    /// Only members of their own configuration campaign for the leadership.
    pub fn is_voting_member(&self) -> bool {
        self.cluster_configuration.contains(&self.id)
    }

    /// Configuration entry is appended but not committed yet.
    pub fn has_pending_configuration_change(&self) -> bool {
        self.cluster_configuration_index > self.commit_index
    }

    pub fn node_state(&self) -> NodeState {
        NodeState {
            node_id: self.id.clone(),
            current_term: self.current_term,
            vote_for_id: self.voted_for_id.clone(),
        }
    }

    fn save_node_state(&mut self) -> Result<(), RaftError> {
        let state = self.node_state();

        let result = self.state_saver.save_node_state(&state);
        if let Err(err) = result {
            let err = RaftError::durability("Node state save failed".to_string(), err.to_string());
            self.halt(err.clone());
            return Err(err);
        }

        Ok(())
    }

    /// Halts the node if the log failed to read an entry. Returns true when halted.
    pub fn halt_on_read_failure(&mut self) -> bool {
        match self.log.read_failure() {
            Some(err) => {
                self.halt(err);
                true
            }
            None => false,
        }
    }

    /// Stops the node participation after the durability failure.
    pub fn halt(&mut self, err: RaftError) {
        if self.halted {
            return;
        }
        error!("Node {} halted: {}", self.id, err);

        self.halted = true;
        self.status = NodeStatus::Follower;
        self.current_leader_id = None;

        if self.node_failure_tx.send(err).is_err() {
            warn!("Node {} failure listener is gone", self.id);
        }
    }

    fn durability_check<T>(&mut self, result: Result<T, RaftError>, text: &str) -> Result<T, RaftError> {
        match result {
            Ok(val) => Ok(val),
            Err(err) => {
                let err = RaftError::durability(text.to_string(), err.to_string());
                self.halt(err.clone());
                Err(err)
            }
        }
    }

    /// Increments the term and votes for itself. Returns the new term.
    pub fn become_candidate(&mut self) -> Result<u64, RaftError> {
        self.current_term += 1;
        self.voted_for_id = Some(self.id.clone());
        self.status = NodeStatus::Candidate;
        self.current_leader_id = None;

        self.save_node_state()?;

        info!("Node {} Status changed to Candidate for term {}", self.id, self.current_term);

        Ok(self.current_term)
    }

    /// Steps down to the follower. Newer term resets the vote.
    pub fn become_follower(&mut self, term: u64, leader_id: Option<NodeId>) -> Result<(), RaftError> {
        let previous_status = self.status;
        if term > self.current_term {
            self.current_term = term;
            self.voted_for_id = None;
            self.current_leader_id = None;

            self.save_node_state()?;
        }

        self.status = NodeStatus::Follower;
        if leader_id.is_some() {
            self.current_leader_id = leader_id;
        }

        if previous_status != NodeStatus::Follower {
            info!("Node {} Status changed to Follower for term {}", self.id, self.current_term);
        }

        Ok(())
    }

    /// Promotes the candidate and appends the NoOp entry for the new term.
    pub fn become_leader(&mut self) -> Result<(), RaftError> {
        self.status = NodeStatus::Leader;
        self.current_leader_id = Some(self.id.clone());

        let next_index = self.log.last_entry_index() + 1;
        self.next_index.clear();
        self.match_index.clear();
        for peer_id in self.peers() {
            self.next_index.insert(peer_id.clone(), next_index);
            self.match_index.insert(peer_id, 0);
        }

        info!("Node {} Status changed to Leader for term {}", self.id, self.current_term);

        self.append_content_to_log(EntryContent::NoOp)?;

        Ok(())
    }

    pub fn grant_vote(&mut self, candidate_id: NodeId) -> Result<(), RaftError> {
        self.voted_for_id = Some(candidate_id);

        self.save_node_state()
    }

    /// Writes the one-node configuration into the empty log.
    pub fn bootstrap(&mut self) -> Result<bool, RaftError> {
        if self.log.last_entry_index() > 0 {
            info!("Node {} has existing log. Bootstrap skipped", self.id);
            return Ok(false);
        }

        if self.current_term == 0 {
            self.current_term = 1;
            self.save_node_state()?;
        }

        let entry = LogEntry {
            index: 1,
            term: self.current_term,
            entry_content: EntryContent::ClusterConfiguration(NewClusterConfigurationEntryContent {
                new_cluster_configuration: vec![self.id.clone()],
            }),
        };

        let result = self.log.append_entry(entry);
        self.durability_check(result, "Cannot append bootstrap entry")?;
        self.rebuild_cluster_configuration();

        info!("Node {} bootstrapped one-node cluster", self.id);

        Ok(true)
    }

    ///Gets entry by index & compares terms.
    /// Special case index=0, term=0 returns true. Compacted entries are committed and match.
    pub fn check_log_for_previous_entry(&self, prev_log_term: u64, prev_log_index: u64) -> bool {
        if prev_log_index < self.log.snapshot_index() {
            return true;
        }

        self.log.term_at(prev_log_index) == Some(prev_log_term)
    }

    //Check last log entry for voting purpose. Compares first term, index afterwards.
    //To grant vote - candidate log should contain entries same term or greater
    pub fn check_candidate_last_log_entry(
        &self,
        candidate_last_log_entry_term: u64,
        candidate_last_log_entry_index: u64,
    ) -> bool {
        if self.log.last_entry_term() > candidate_last_log_entry_term {
            return false;
        }
        if self.log.last_entry_term() < candidate_last_log_entry_term {
            return true;
        }
        //equal terms
        self.log.last_entry_index() <= candidate_last_log_entry_index
    }

    /// Rejection hint: the leader retries after the returned index. Skips the whole
    /// conflicting term.
    pub fn conflict_hint(&self, prev_log_index: u64) -> u64 {
        let last_index = self.log.last_entry_index();
        if prev_log_index > last_index {
            return last_index;
        }

        let snapshot_index = self.log.snapshot_index();
        let conflict_term = self.log.term_at(prev_log_index);
        let mut hint = prev_log_index.saturating_sub(1);
        while hint > snapshot_index && self.log.term_at(hint) == conflict_term {
            hint -= 1;
        }

        hint
    }

    /// Appends leader entries after the matched previous entry. Conflicting suffix is
    /// discarded. Returns the last index covered by the request.
    pub fn append_leader_entries(
        &mut self,
        prev_log_index: u64,
        entries: Vec<LogEntry>,
    ) -> Result<u64, RaftError> {
        let last_new_index = prev_log_index + entries.len() as u64;
        let snapshot_index = self.log.snapshot_index();

        let mut new_entries = Vec::new();
        let mut configuration_changed = false;
        for entry in entries {
            if entry.index <= snapshot_index {
                continue;
            }

            if new_entries.is_empty() {
                match self.log.term_at(entry.index) {
                    Some(term) if term == entry.term => continue,
                    Some(_) => {
                        if entry.index <= self.commit_index {
                            return new_err(
                                format!("Conflict with committed entry, index = {}", entry.index),
                                String::new(),
                            );
                        }

                        warn!("Node {} log conflict at index {}. Truncating log", self.id, entry.index);
                        let result = self.log.truncate_suffix(entry.index);
                        self.durability_check(result, "Cannot truncate log")?;
                        configuration_changed = true;
                    }
                    None => {}
                }
            }

            if let EntryContent::ClusterConfiguration(_) = entry.entry_content {
                configuration_changed = true;
            }
            new_entries.push(entry);
        }

        if !new_entries.is_empty() {
            trace!("Node {} appending {} entries", self.id, new_entries.len());
            let result = self.log.append_entries(new_entries);
            self.durability_check(result, "Cannot append entries to log")?;
        }

        if configuration_changed {
            self.rebuild_cluster_configuration();
        }

        Ok(last_new_index)
    }

    /// Leader appends new content and schedules replication.
    pub fn append_content_to_log(&mut self, content: EntryContent) -> Result<LogEntry, RaftError> {
        if self.status != NodeStatus::Leader {
            return Err(RaftError::new(
                crate::errors::ErrorKind::NotLeader,
                "Cannot append content to log".to_string(),
                "Not a leader".to_string(),
            ));
        }

        let is_configuration = matches!(content, EntryContent::ClusterConfiguration(_));
        let entry = self.log.create_next_entry(self.current_term, content);
        let result = self.log.append_entry(entry.clone());
        self.durability_check(result, "Cannot append content to log")?;

        trace!("Node {} appended entry index={} term={}", self.id, entry.index, entry.term);

        if is_configuration {
            self.rebuild_cluster_configuration();
        }

        self.notify_peers_replication();
        self.update_commit_index();

        Ok(entry)
    }

    fn notify_peers_replication(&self) {
        for peer_id in self.peers() {
            if self.replicate_log_to_peer_tx.send(peer_id).is_err() {
                warn!("Node {} log replicator is stopped", self.id);
            }
        }
    }

    /// Commit index never decreases.
    pub fn set_commit_index(&mut self, new_commit_index: u64) {
        if new_commit_index <= self.commit_index {
            return;
        }

        trace!("Node {} commit index = {}", self.id, new_commit_index);
        self.commit_index = new_commit_index;
        if self.commit_index_updated_tx.send(new_commit_index).is_err() {
            warn!("Node {} rsm updater is stopped", self.id);
        }
    }

    /// Leader commit rule: the majority match index of the current term entry.
    pub fn update_commit_index(&mut self) {
        if self.status != NodeStatus::Leader {
            return;
        }

        let mut match_indices: Vec<u64> = self
            .cluster_configuration
            .all_nodes()
            .iter()
            .map(|member| {
                if *member == self.id {
                    self.log.last_entry_index()
                } else {
                    self.match_index.get(member).copied().unwrap_or(0)
                }
            })
            .collect();

        if match_indices.is_empty() {
            return;
        }

        match_indices.sort_unstable_by(|a, b| b.cmp(a));
        let quorum_size = self.cluster_configuration.quorum_size() as usize;
        let majority_index = match_indices[cmp::min(quorum_size, match_indices.len()) - 1];

        if majority_index > self.commit_index
            && self.log.term_at(majority_index) == Some(self.current_term)
        {
            self.set_commit_index(majority_index);
        }
    }

    pub fn next_index(&self, peer_id: &str) -> u64 {
        match self.next_index.get(peer_id) {
            Some(next_index) => *next_index,
            None => self.log.last_entry_index() + 1,
        }
    }

    pub fn match_index(&self, peer_id: &str) -> u64 {
        self.match_index.get(peer_id).copied().unwrap_or(0)
    }

    fn update_peer_progress(&mut self, peer_id: &str, match_index: u64) {
        let current_match = self.match_index(peer_id);
        let new_match = cmp::max(current_match, match_index);
        self.match_index.insert(peer_id.to_string(), new_match);

        let next_index = cmp::max(self.next_index(peer_id), new_match + 1);
        self.next_index.insert(peer_id.to_string(), next_index);
    }

    /// Builds the next replication request for the peer. Peers behind the snapshot
    /// receive the snapshot.
    pub fn create_replication_request(&self, peer_id: &str) -> Option<ReplicationRequest> {
        if self.status != NodeStatus::Leader || self.halted {
            return None;
        }

        let next_index = self.next_index(peer_id);
        if next_index <= self.log.snapshot_index() {
            return match self.log.snapshot() {
                Some(snapshot) => Some(ReplicationRequest::InstallSnapshot(
                    InstallSnapshotRequest::new(self.current_term, self.id.clone(), snapshot),
                )),
                None => {
                    error!("Node {} snapshot is missing, index = {}", self.id, self.log.snapshot_index());
                    None
                }
            };
        }

        let prev_log_index = next_index - 1;
        let prev_log_term = match self.log.term_at(prev_log_index) {
            Some(term) => term,
            None => {
                error!("Node {} has no entry with index = {}", self.id, prev_log_index);
                return None;
            }
        };

        let last_index = self.log.last_entry_index();
        let upto_index = cmp::min(last_index, prev_log_index + self.limits.max_entries_per_request);
        let entries = if next_index <= upto_index {
            self.log.entries(next_index, upto_index)
        } else {
            Vec::new() //heartbeat
        };

        Some(ReplicationRequest::AppendEntries(AppendEntriesRequest {
            term: self.current_term,
            leader_id: self.id.clone(),
            prev_log_index,
            prev_log_term,
            entries,
            leader_commit: self.commit_index,
        }))
    }

    /// Returns true when the peer acknowledged the leadership for the request term.
    pub fn process_append_entries_response(
        &mut self,
        peer_id: &str,
        request_term: u64,
        prev_log_index: u64,
        response: &AppendEntriesResponse,
    ) -> Result<bool, RaftError> {
        if response.term > self.current_term {
            info!("Node {} discovered higher term {} from {}", self.id, response.term, peer_id);
            self.become_follower(response.term, None)?;
            return Ok(false);
        }

        if self.status != NodeStatus::Leader || request_term != self.current_term {
            return Ok(false);
        }

        if response.success {
            self.update_peer_progress(peer_id, response.match_index);
            self.update_commit_index();
        } else {
            let next_index = (response.match_index + 1)
                .min(prev_log_index)
                .max(self.match_index(peer_id) + 1)
                .max(1);
            trace!("Node {} peer {} rejected entries. Next index = {}", self.id, peer_id, next_index);
            let previous_next_index = self.next_index(peer_id);
            self.next_index.insert(peer_id.to_string(), next_index);

            if next_index < previous_next_index
                && self.replicate_log_to_peer_tx.send(peer_id.to_string()).is_err()
            {
                warn!("Node {} log replicator is stopped", self.id);
            }
        }

        Ok(response.term == request_term)
    }

    pub fn process_install_snapshot_response(
        &mut self,
        peer_id: &str,
        request_term: u64,
        last_included_index: u64,
        response: &InstallSnapshotResponse,
    ) -> Result<bool, RaftError> {
        if response.term > self.current_term {
            self.become_follower(response.term, None)?;
            return Ok(false);
        }

        if self.status != NodeStatus::Leader || request_term != self.current_term {
            return Ok(false);
        }

        if response.success {
            info!("Node {} installed snapshot on {}, index = {}", self.id, peer_id, last_included_index);
            self.update_peer_progress(peer_id, last_included_index);
            self.update_commit_index();

            if self.replicate_log_to_peer_tx.send(peer_id.to_string()).is_err() {
                warn!("Node {} log replicator is stopped", self.id);
            }
        }

        Ok(response.term == request_term)
    }

    /// Replaces the covered log prefix with the leader snapshot.
    pub fn install_snapshot(&mut self, snapshot: Snapshot) -> Result<(), RaftError> {
        let last_included_index = snapshot.last_included_index;
        let last_included_term = snapshot.last_included_term;

        if last_included_index <= self.log.snapshot_index() {
            trace!("Node {} already has snapshot, index = {}", self.id, last_included_index);
            return Ok(());
        }

        let matching_entry = self.log.term_at(last_included_index) == Some(last_included_term);

        let result = self.log.save_snapshot(snapshot);
        self.durability_check(result, "Cannot save snapshot")?;

        if !matching_entry {
            let result = self.log.truncate_suffix(last_included_index + 1);
            self.durability_check(result, "Cannot truncate log")?;
        }
        let result = self.log.truncate_prefix(last_included_index);
        self.durability_check(result, "Cannot truncate log")?;

        self.rebuild_cluster_configuration();
        self.set_commit_index(last_included_index);

        info!("Node {} installed snapshot, index = {} term = {}", self.id, last_included_index, last_included_term);

        Ok(())
    }

    /// Saves the local snapshot and compacts the log prefix it covers.
    pub fn compact_log(&mut self, snapshot: Snapshot) -> Result<(), RaftError> {
        let last_included_index = snapshot.last_included_index;
        if last_included_index <= self.log.snapshot_index() || last_included_index > self.commit_index {
            return Ok(());
        }

        let result = self.log.save_snapshot(snapshot);
        self.durability_check(result, "Cannot save snapshot")?;

        let result = self.log.truncate_prefix(last_included_index);
        self.durability_check(result, "Cannot truncate log")?;

        info!("Node {} created snapshot, index = {}", self.id, last_included_index);

        Ok(())
    }

    /// Members of the configuration in effect at the index.
    pub fn cluster_members_at(&self, index: u64) -> Vec<NodeId> {
        let snapshot_index = self.log.snapshot_index();

        let mut current = cmp::min(index, self.log.last_entry_index());
        while current > snapshot_index {
            if let Some(LogEntry {
                entry_content: EntryContent::ClusterConfiguration(content),
                ..
            }) = self.log.entry(current)
            {
                return content.new_cluster_configuration;
            }
            current -= 1;
        }

        match self.log.snapshot() {
            Some(snapshot) => snapshot.cluster_members,
            None => Vec::new(),
        }
    }

    /// The latest configuration in the log wins, committed or not.
    pub fn rebuild_cluster_configuration(&mut self) {
        let snapshot_index = self.log.snapshot_index();

        let mut index = self.log.last_entry_index();
        while index > snapshot_index {
            if let Some(LogEntry {
                entry_content: EntryContent::ClusterConfiguration(content),
                ..
            }) = self.log.entry(index)
            {
                self.set_cluster_configuration(content.new_cluster_configuration, index);
                return;
            }
            index -= 1;
        }

        match self.log.snapshot() {
            Some(snapshot) => self.set_cluster_configuration(snapshot.cluster_members, snapshot_index),
            None => self.set_cluster_configuration(Vec::new(), 0),
        }
    }

    fn set_cluster_configuration(&mut self, members: Vec<NodeId>, index: u64) {
        let new_configuration = ClusterConfiguration::new(members);
        if new_configuration != self.cluster_configuration {
            info!(
                "Node {} cluster configuration: {:?} (index = {})",
                self.id,
                new_configuration.all_nodes(),
                index
            );
        }

        self.cluster_configuration = new_configuration;
        self.cluster_configuration_index = index;
    }
}
