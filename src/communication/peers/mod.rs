use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::common::QuorumResponse;
use crate::errors::RaftError;
use crate::operation_log::LogEntry;
use crate::rsm::Snapshot;

/// Node identifier. It is the network address of the node peer endpoint.
pub type NodeId = String;

/// Candidate's request for a vote.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(
    fmt = "Vote request: term {} candidate {} last log index {} last log term {}",
    term,
    candidate_id,
    last_log_index,
    last_log_term
)]
pub struct VoteRequest {
    pub term: u64,
    pub candidate_id: NodeId,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "Vote response: term {} granted {} peer {}", term, vote_granted, peer_id)]
pub struct VoteResponse {
    pub term: u64,
    pub vote_granted: bool,
    pub peer_id: NodeId,
}

impl QuorumResponse for VoteResponse {
    fn get_result(&self) -> bool {
        self.vote_granted
    }
}

/// Leader's log replication request. Empty entries - heartbeat.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(
    fmt = "Append entries request: term {} leader {} prev index {} prev term {} commit {} entries {}",
    term,
    leader_id,
    prev_log_index,
    prev_log_term,
    leader_commit,
    "entries.len()"
)]
pub struct AppendEntriesRequest {
    pub term: u64,
    pub leader_id: NodeId,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
}

/// On success `match_index` is the last index known to match the leader log.
/// On rejection it is the follower's hint: the leader retries after this index.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(
    fmt = "Append entries response: term {} success {} match index {}",
    term,
    success,
    match_index
)]
pub struct AppendEntriesResponse {
    pub term: u64,
    pub success: bool,
    pub match_index: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(
    fmt = "Install snapshot request: term {} leader {} last included index {} last included term {} size {}",
    term,
    leader_id,
    last_included_index,
    last_included_term,
    "data.len()"
)]
pub struct InstallSnapshotRequest {
    pub term: u64,
    pub leader_id: NodeId,
    pub last_included_index: u64,
    pub last_included_term: u64,
    pub cluster_members: Vec<NodeId>,
    pub data: Vec<u8>,
}

impl InstallSnapshotRequest {
    pub fn new(term: u64, leader_id: NodeId, snapshot: Snapshot) -> InstallSnapshotRequest {
        InstallSnapshotRequest {
            term,
            leader_id,
            last_included_index: snapshot.last_included_index,
            last_included_term: snapshot.last_included_term,
            cluster_members: snapshot.cluster_members,
            data: snapshot.data,
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            last_included_index: self.last_included_index,
            last_included_term: self.last_included_term,
            cluster_members: self.cluster_members,
            data: self.data,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "Install snapshot response: term {} success {}", term, success)]
pub struct InstallSnapshotResponse {
    pub term: u64,
    pub success: bool,
}

/// Request for adding the new node to the cluster.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "Join request: new node {}", new_node)]
pub struct JoinRequest {
    pub new_node: NodeId,
}

/// Not accepted join request contains the current leader hint if it is known.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "Join response: accepted {} leader hint {:?}", accepted, leader_hint)]
pub struct JoinResponse {
    pub accepted: bool,
    pub leader_hint: Option<NodeId>,
}

/// Outgoing side of the peer transport.
pub trait PeerRequestHandler: Send + Sync + Clone + 'static {
    fn send_vote_request(
        &self,
        destination_node_id: &NodeId,
        request: VoteRequest,
    ) -> Result<VoteResponse, RaftError>;

    fn send_append_entries_request(
        &self,
        destination_node_id: &NodeId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, RaftError>;

    fn send_install_snapshot_request(
        &self,
        destination_node_id: &NodeId,
        request: InstallSnapshotRequest,
    ) -> Result<InstallSnapshotResponse, RaftError>;

    fn send_join_request(
        &self,
        destination_node_id: &NodeId,
        request: JoinRequest,
    ) -> Result<JoinResponse, RaftError>;
}

/// Incoming side of the peer transport: request receivers and response senders for the node.
pub trait PeerRequestChannels: Send + Sync + Clone + 'static {
    fn vote_request_rx(&self, node_id: &NodeId) -> Receiver<VoteRequest>;
    fn vote_response_tx(&self, node_id: &NodeId) -> Sender<VoteResponse>;

    fn append_entries_request_rx(&self, node_id: &NodeId) -> Receiver<AppendEntriesRequest>;
    fn append_entries_response_tx(&self, node_id: &NodeId) -> Sender<AppendEntriesResponse>;

    fn install_snapshot_request_rx(&self, node_id: &NodeId) -> Receiver<InstallSnapshotRequest>;
    fn install_snapshot_response_tx(&self, node_id: &NodeId) -> Sender<InstallSnapshotResponse>;

    fn join_request_rx(&self, node_id: &NodeId) -> Receiver<JoinRequest>;
    fn join_response_tx(&self, node_id: &NodeId) -> Sender<JoinResponse>;
}
