use crate::communication::duplex_channel::DuplexChannel;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use raftkv::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    JoinRequest, JoinResponse, NodeId, PeerRequestChannels, PeerRequestHandler, RaftError,
    VoteRequest, VoteResponse,
};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
struct NodeChannels {
    votes: DuplexChannel<VoteRequest, VoteResponse>,
    append_entries: DuplexChannel<AppendEntriesRequest, AppendEntriesResponse>,
    install_snapshot: DuplexChannel<InstallSnapshotRequest, InstallSnapshotResponse>,
    join: DuplexChannel<JoinRequest, JoinResponse>,
}

impl NodeChannels {
    fn new(node_id: &str, timeout: Duration) -> NodeChannels {
        NodeChannels {
            votes: DuplexChannel::new(format!("Vote channel NodeId={}", node_id), timeout),
            append_entries: DuplexChannel::new(
                format!("AppendEntries channel NodeId={}", node_id),
                timeout,
            ),
            install_snapshot: DuplexChannel::new(
                format!("InstallSnapshot channel NodeId={}", node_id),
                timeout,
            ),
            join: DuplexChannel::new(format!("Join channel NodeId={}", node_id), timeout),
        }
    }
}

/// Basic in-memory implementation of the PeerRequestHandler and PeerRequestChannels traits.
/// Clones share the channels. Isolated nodes neither send nor receive requests.
#[derive(Clone, Debug)]
pub struct InProcPeerCommunicator {
    timeout: Duration,
    channels: Arc<RwLock<HashMap<NodeId, NodeChannels>>>,
    isolated_nodes: Arc<RwLock<HashSet<NodeId>>>,
}

impl InProcPeerCommunicator {
    /// Create new instance of the InProcPeerCommunicator with nodes and communication timeout.
    pub fn new(nodes: Vec<NodeId>, timeout: Duration) -> InProcPeerCommunicator {
        let communicator = InProcPeerCommunicator {
            timeout,
            channels: Arc::new(RwLock::new(HashMap::new())),
            isolated_nodes: Arc::new(RwLock::new(HashSet::new())),
        };

        for node_id in nodes {
            communicator.add_node_communication(&node_id);
        }

        communicator
    }

    /// Registers the channels for the new node. Existing channels are kept.
    pub fn add_node_communication(&self, node_id: &str) {
        self.channels
            .write()
            .entry(node_id.to_string())
            .or_insert_with(|| NodeChannels::new(node_id, self.timeout));
    }

    /// Drops all requests from and to the node.
    pub fn isolate_node(&self, node_id: &str) {
        info!("Node {} isolated", node_id);
        self.isolated_nodes.write().insert(node_id.to_string());
    }

    pub fn heal_node(&self, node_id: &str) {
        info!("Node {} connection restored", node_id);
        self.isolated_nodes.write().remove(node_id);
    }

    fn node_channels(&self, node_id: &str) -> Result<NodeChannels, RaftError> {
        match self.channels.read().get(node_id) {
            Some(channels) => Ok(channels.clone()),
            None => Err(RaftError::transport(
                format!("Unknown node {}", node_id),
                String::new(),
            )),
        }
    }

    fn channels_for_local_node(&self, node_id: &str) -> NodeChannels {
        self.add_node_communication(node_id);

        self.channels.read()[node_id].clone()
    }

    fn check_connection(&self, source_node_id: &str, destination_node_id: &str) -> Result<(), RaftError> {
        let isolated_nodes = self.isolated_nodes.read();
        if isolated_nodes.contains(source_node_id) || isolated_nodes.contains(destination_node_id) {
            return Err(RaftError::transport(
                format!(
                    "Connection from {} to {} is broken",
                    source_node_id, destination_node_id
                ),
                "isolated node".to_string(),
            ));
        }

        Ok(())
    }
}

impl PeerRequestHandler for InProcPeerCommunicator {
    fn send_vote_request(
        &self,
        destination_node_id: &NodeId,
        request: VoteRequest,
    ) -> Result<VoteResponse, RaftError> {
        trace!("Destination Node {} Sending request {}", destination_node_id, request);
        self.check_connection(&request.candidate_id, destination_node_id)?;

        let resp = self.node_channels(destination_node_id)?.votes.send_request(request);

        trace!("Destination Node {} Response {:?}", destination_node_id, resp);
        resp
    }

    fn send_append_entries_request(
        &self,
        destination_node_id: &NodeId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, RaftError> {
        trace!("Destination Node {} Sending request {}", destination_node_id, request);
        self.check_connection(&request.leader_id, destination_node_id)?;

        let resp = self
            .node_channels(destination_node_id)?
            .append_entries
            .send_request(request);

        trace!("Destination Node {} Response {:?}", destination_node_id, resp);
        resp
    }

    fn send_install_snapshot_request(
        &self,
        destination_node_id: &NodeId,
        request: InstallSnapshotRequest,
    ) -> Result<InstallSnapshotResponse, RaftError> {
        trace!("Destination Node {} Sending request {}", destination_node_id, request);
        self.check_connection(&request.leader_id, destination_node_id)?;

        self.node_channels(destination_node_id)?
            .install_snapshot
            .send_request(request)
    }

    fn send_join_request(
        &self,
        destination_node_id: &NodeId,
        request: JoinRequest,
    ) -> Result<JoinResponse, RaftError> {
        trace!("Destination Node {} Sending request {}", destination_node_id, request);
        self.check_connection(&request.new_node, destination_node_id)?;

        //the leader answers after the configuration commit
        let channel = self.node_channels(destination_node_id)?.join;
        channel.send_request_with_timeout(request, self.timeout * 10)
    }
}

impl PeerRequestChannels for InProcPeerCommunicator {
    fn vote_request_rx(&self, node_id: &NodeId) -> Receiver<VoteRequest> {
        self.channels_for_local_node(node_id).votes.request_rx()
    }

    fn vote_response_tx(&self, node_id: &NodeId) -> Sender<VoteResponse> {
        self.channels_for_local_node(node_id).votes.response_tx()
    }

    fn append_entries_request_rx(&self, node_id: &NodeId) -> Receiver<AppendEntriesRequest> {
        self.channels_for_local_node(node_id).append_entries.request_rx()
    }

    fn append_entries_response_tx(&self, node_id: &NodeId) -> Sender<AppendEntriesResponse> {
        self.channels_for_local_node(node_id).append_entries.response_tx()
    }

    fn install_snapshot_request_rx(&self, node_id: &NodeId) -> Receiver<InstallSnapshotRequest> {
        self.channels_for_local_node(node_id).install_snapshot.request_rx()
    }

    fn install_snapshot_response_tx(&self, node_id: &NodeId) -> Sender<InstallSnapshotResponse> {
        self.channels_for_local_node(node_id).install_snapshot.response_tx()
    }

    fn join_request_rx(&self, node_id: &NodeId) -> Receiver<JoinRequest> {
        self.channels_for_local_node(node_id).join.request_rx()
    }

    fn join_response_tx(&self, node_id: &NodeId) -> Sender<JoinResponse> {
        self.channels_for_local_node(node_id).join.response_tx()
    }
}
