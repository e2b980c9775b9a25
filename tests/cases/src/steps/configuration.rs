use raftkv::{
    ElectionTimer, NodeConfiguration, NodeId, NodeLimits, NodeMembership, NodeState, NodeStateSaver,
    NodeStatusInfo, NodeWorker, OperationLog,
};
use raftkv_modules::{
    InProcClientCommunicator, InProcPeerCommunicator, MemoryKvStore, MemoryOperationLog,
    MockNodeStateSaver, RandomizedElectionTimer,
};

use crate::steps;

/// Running node with the handles the cases inspect.
#[derive(Debug)]
pub struct CaseNode {
    pub node_id: NodeId,
    pub worker: NodeWorker,
    pub client: InProcClientCommunicator,
    pub kv_store: MemoryKvStore,
}

impl CaseNode {
    pub fn status(&self) -> NodeStatusInfo {
        self.worker.status()
    }
}

pub fn start_node<Log, Et, Ns>(
    node_state: NodeState,
    membership: NodeMembership,
    peer_communicator: InProcPeerCommunicator,
    election_timer: Et,
    operation_log: Log,
    state_saver: Ns,
    limits: NodeLimits,
) -> CaseNode
where
    Log: OperationLog,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
{
    let node_id = node_state.node_id.clone();
    let client = InProcClientCommunicator::new(&node_id, steps::client_communication_timeout());
    let kv_store = MemoryKvStore::new();

    let config = NodeConfiguration {
        node_state,
        membership,
        peer_communicator,
        client_communicator: client.clone(),
        election_timer,
        operation_log,
        rsm: kv_store.clone(),
        state_saver,
        limits,
    };

    let worker = raftkv::start_node(config).expect("node started");
    info!("Case node {} started", node_id);

    CaseNode {
        node_id,
        worker,
        client,
        kv_store,
    }
}

/// Node with the volatile log and state.
pub fn start_memory_node(
    node_id: &str,
    membership: NodeMembership,
    peer_communicator: InProcPeerCommunicator,
    limits: NodeLimits,
) -> CaseNode {
    let (timeout_min, timeout_max) = steps::election_timeout_range_ms();
    let election_timer =
        RandomizedElectionTimer::new(timeout_min, timeout_max).expect("valid election timeout range");

    start_node(
        NodeState::new(node_id.to_string()),
        membership,
        peer_communicator,
        election_timer,
        MemoryOperationLog::new(),
        MockNodeStateSaver::default(),
        limits,
    )
}
