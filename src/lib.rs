#![warn(missing_debug_implementations, unsafe_code)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate crossbeam_channel;
#[macro_use]
extern crate derive_more;

mod common;
mod communication;
mod errors;
mod leadership;
mod membership;
mod node;
mod operation_log;
mod request_handler;
mod rsm;

pub use communication::client::{
    ClientRequestChannels, ClientRequestHandler, ClientResponseStatus, ClientRpcResponse,
    ReadRequest, WriteRequest,
};
pub use communication::peers::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    JoinRequest, JoinResponse, NodeId, PeerRequestChannels, PeerRequestHandler, VoteRequest,
    VoteResponse,
};
pub use errors::{new_err, ErrorKind, RaftError};
pub use leadership::ElectionTimer;
pub use membership::{ClusterConfiguration, RetryPolicy, ServiceRegistration};
pub use node::configuration::{NodeConfiguration, NodeLimits, NodeMembership};
pub use node::state::{NodeState, NodeStateSaver, NodeStatus};
pub use node::{NodeStatusInfo, NodeStatusSource, NodeWorker};
pub use operation_log::{
    DataEntryContent, EntryContent, LogEntry, NewClusterConfigurationEntryContent, OperationLog,
};
pub use rsm::{ReplicatedStateMachine, Snapshot};

/// Starts the node workers. Bootstrap durability failures are returned immediately,
/// later fatal failures stop the node and are returned by `NodeWorker::join`.
pub fn start_node<Log, Rsm, Cc, Pc, Et, Ns>(
    node_config: NodeConfiguration<Log, Rsm, Cc, Pc, Et, Ns>,
) -> Result<NodeWorker, RaftError>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler + PeerRequestChannels,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
{
    node::start(node_config)
}
