use super::frame::{read_frame, send_request, write_frame};
use super::server::spawn_listener;
use super::{PeerMessage, PeerReply};
use crate::communication::duplex_channel::DuplexChannel;

use crossbeam_channel::{Receiver, Sender};
use raftkv::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    JoinRequest, JoinResponse, NodeId, PeerRequestChannels, PeerRequestHandler, RaftError,
    VoteRequest, VoteResponse,
};

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Join requests are answered after the configuration entry commits.
const JOIN_TIMEOUT_FACTOR: u32 = 10;

#[derive(Clone, Debug)]
struct LocalChannels {
    votes: DuplexChannel<VoteRequest, VoteResponse>,
    append_entries: DuplexChannel<AppendEntriesRequest, AppendEntriesResponse>,
    install_snapshot: DuplexChannel<InstallSnapshotRequest, InstallSnapshotResponse>,
    join: DuplexChannel<JoinRequest, JoinResponse>,
}

impl LocalChannels {
    fn dispatch(&self, message: PeerMessage, join_timeout: Duration) -> Result<PeerReply, RaftError> {
        let reply = match message {
            PeerMessage::Vote(request) => PeerReply::Vote(self.votes.send_request(request)?),
            PeerMessage::AppendEntries(request) => {
                PeerReply::AppendEntries(self.append_entries.send_request(request)?)
            }
            PeerMessage::InstallSnapshot(request) => {
                PeerReply::InstallSnapshot(self.install_snapshot.send_request(request)?)
            }
            PeerMessage::Join(request) => {
                PeerReply::Join(self.join.send_request_with_timeout(request, join_timeout)?)
            }
        };

        Ok(reply)
    }
}

/// Peer transport over TCP. Node ids are the peer endpoint addresses.
#[derive(Clone, Debug)]
pub struct NetworkPeerCommunicator {
    node_id: NodeId,
    local_address: SocketAddr,
    timeout: Duration,
    channels: LocalChannels,
}

impl NetworkPeerCommunicator {
    /// Starts listening on the node id address.
    pub fn start(node_id: NodeId, timeout: Duration) -> Result<NetworkPeerCommunicator, RaftError> {
        let channels = LocalChannels {
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
        };

        let join_timeout = timeout * JOIN_TIMEOUT_FACTOR;
        let server_channels = channels.clone();
        let local_address = spawn_listener("peer", &node_id, join_timeout, move |stream| {
            serve_peer_connection(stream, &server_channels, join_timeout)
        })?;

        Ok(NetworkPeerCommunicator {
            node_id,
            local_address,
            timeout,
            channels,
        })
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    fn send(
        &self,
        destination_node_id: &str,
        message: PeerMessage,
        response_timeout: Duration,
    ) -> Result<PeerReply, RaftError> {
        trace!("Destination Node {} Sending request {:?}", destination_node_id, message);

        send_request(destination_node_id, &message, self.timeout, response_timeout)
    }

    fn check_local(&self, node_id: &str) {
        if node_id != self.node_id {
            warn!("Channels of node {} requested from the node {} transport", node_id, self.node_id);
        }
    }
}

fn serve_peer_connection(
    mut stream: TcpStream,
    channels: &LocalChannels,
    join_timeout: Duration,
) -> Result<(), RaftError> {
    let message: PeerMessage = read_frame(&mut stream)?;
    let reply = channels.dispatch(message, join_timeout)?;

    write_frame(&mut stream, &reply)
}

fn unexpected_reply(destination_node_id: &str, reply: PeerReply) -> RaftError {
    RaftError::transport(
        format!("Unexpected reply from {}", destination_node_id),
        format!("{:?}", reply),
    )
}

impl PeerRequestHandler for NetworkPeerCommunicator {
    fn send_vote_request(
        &self,
        destination_node_id: &NodeId,
        request: VoteRequest,
    ) -> Result<VoteResponse, RaftError> {
        match self.send(destination_node_id, PeerMessage::Vote(request), self.timeout)? {
            PeerReply::Vote(response) => Ok(response),
            reply => Err(unexpected_reply(destination_node_id, reply)),
        }
    }

    fn send_append_entries_request(
        &self,
        destination_node_id: &NodeId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse, RaftError> {
        match self.send(destination_node_id, PeerMessage::AppendEntries(request), self.timeout)? {
            PeerReply::AppendEntries(response) => Ok(response),
            reply => Err(unexpected_reply(destination_node_id, reply)),
        }
    }

    fn send_install_snapshot_request(
        &self,
        destination_node_id: &NodeId,
        request: InstallSnapshotRequest,
    ) -> Result<InstallSnapshotResponse, RaftError> {
        match self.send(destination_node_id, PeerMessage::InstallSnapshot(request), self.timeout)? {
            PeerReply::InstallSnapshot(response) => Ok(response),
            reply => Err(unexpected_reply(destination_node_id, reply)),
        }
    }

    fn send_join_request(
        &self,
        destination_node_id: &NodeId,
        request: JoinRequest,
    ) -> Result<JoinResponse, RaftError> {
        let response_timeout = self.timeout * JOIN_TIMEOUT_FACTOR;
        match self.send(destination_node_id, PeerMessage::Join(request), response_timeout)? {
            PeerReply::Join(response) => Ok(response),
            reply => Err(unexpected_reply(destination_node_id, reply)),
        }
    }
}

impl PeerRequestChannels for NetworkPeerCommunicator {
    fn vote_request_rx(&self, node_id: &NodeId) -> Receiver<VoteRequest> {
        self.check_local(node_id);
        self.channels.votes.request_rx()
    }

    fn vote_response_tx(&self, node_id: &NodeId) -> Sender<VoteResponse> {
        self.check_local(node_id);
        self.channels.votes.response_tx()
    }

    fn append_entries_request_rx(&self, node_id: &NodeId) -> Receiver<AppendEntriesRequest> {
        self.check_local(node_id);
        self.channels.append_entries.request_rx()
    }

    fn append_entries_response_tx(&self, node_id: &NodeId) -> Sender<AppendEntriesResponse> {
        self.check_local(node_id);
        self.channels.append_entries.response_tx()
    }

    fn install_snapshot_request_rx(&self, node_id: &NodeId) -> Receiver<InstallSnapshotRequest> {
        self.check_local(node_id);
        self.channels.install_snapshot.request_rx()
    }

    fn install_snapshot_response_tx(&self, node_id: &NodeId) -> Sender<InstallSnapshotResponse> {
        self.check_local(node_id);
        self.channels.install_snapshot.response_tx()
    }

    fn join_request_rx(&self, node_id: &NodeId) -> Receiver<JoinRequest> {
        self.check_local(node_id);
        self.channels.join.request_rx()
    }

    fn join_response_tx(&self, node_id: &NodeId) -> Sender<JoinResponse> {
        self.check_local(node_id);
        self.channels.join.response_tx()
    }
}
