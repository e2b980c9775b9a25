use std::time::Duration;

use crate::communication::client::ClientRequestChannels;
use crate::communication::peers::{NodeId, PeerRequestChannels};
use crate::membership::RetryPolicy;
use crate::node::state::NodeState;
use crate::{ElectionTimer, NodeStateSaver, OperationLog, PeerRequestHandler, ReplicatedStateMachine};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeLimits {
    /// Leader heartbeat interval. Should be well below the election timeout.
    pub heartbeat_timeout: Duration,
    pub communication_timeout: Duration,

    /// Deadline for client writes awaiting commit and reads awaiting apply.
    pub client_request_timeout: Duration,
    pub max_entries_per_request: u64,

    /// Applied entries count since the last snapshot which triggers a new snapshot.
    /// Zero disables snapshots.
    pub snapshot_threshold: u64,
    pub max_data_content_size: u64,
}

impl Default for NodeLimits {
    fn default() -> Self {
        NodeLimits {
            heartbeat_timeout: Duration::from_millis(150),
            communication_timeout: Duration::from_millis(500),
            client_request_timeout: Duration::from_millis(3000),
            max_entries_per_request: 256,
            snapshot_threshold: 1000,
            max_data_content_size: 20 * 1024 * 1024, //20 MB
        }
    }
}

/// How the node enters the cluster on its first start.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeMembership {
    /// Initialize a one-node cluster with this node as the sole member.
    Bootstrap,

    /// Ask an existing member to add this node.
    Join(NodeId, RetryPolicy),

    /// Wait for a leader to contact the node. Used for restarts.
    Existing,
}

#[derive(Clone, Debug)]
pub struct NodeConfiguration<Log, Rsm, Cc, Pc, Et, Ns>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler + PeerRequestChannels,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
{
    pub node_state: NodeState,
    pub membership: NodeMembership,
    pub peer_communicator: Pc,
    pub client_communicator: Cc,
    pub election_timer: Et,
    pub operation_log: Log,
    pub rsm: Rsm,
    pub state_saver: Ns,
    pub limits: NodeLimits,
}
