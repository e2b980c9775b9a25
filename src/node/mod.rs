use std::fmt;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::common;
use crate::common::RaftWorkerPool;
use crate::communication::client::ClientRequestChannels;
use crate::communication::peers::{NodeId, PeerRequestChannels, PeerRequestHandler};
use crate::errors::{ErrorKind, RaftError};
use crate::leadership::status::administrator::RaftElectionsAdministrator;
use crate::leadership::status::election_manager::{run_node_status_watcher, ElectionManagerParams};
use crate::leadership::watchdog::leader_status_watcher::{watch_leader_status, WatchLeaderStatusParams};
use crate::leadership::watchdog::watchdog_handler::LeadershipStatusWatchdogHandler;
use crate::leadership::ElectionTimer;
use crate::membership::join::{join_cluster, JoinClusterParams};
use crate::membership::join_request_processor::{process_join_requests, JoinRequestHandlerParams};
use crate::node::configuration::{NodeConfiguration, NodeMembership};
use crate::node::state::{Node, NodeStateSaver, NodeStatus, ProtectedNode};
use crate::operation_log::replication::heartbeat_sender::{
    send_heartbeat_append_entries, SendHeartbeatAppendEntriesParams,
};
use crate::operation_log::replication::peer_log_replicator::{replicate_log_to_peer, LogReplicatorParams};
use crate::operation_log::OperationLog;
use crate::request_handler::client::{process_client_requests, ClientRequestHandlerParams};
use crate::request_handler::peer::{process_peer_request, PeerRequestHandlerParams};
use crate::request_handler::pending_requests::PendingRequests;
use crate::rsm::updater::{update_rsm, RsmUpdaterParams};
use crate::rsm::ReplicatedStateMachine;

pub mod configuration;
pub mod state;

const PEER_THREAD_POOL_SIZE: usize = 16;

/// Point-in-time view of the node for the status reporting.
#[derive(Clone, Debug, Eq, PartialEq, Display)]
#[display(
    fmt = "node={} state={} term={} leader={} commit={} applied={} last_index={} snapshot={} members={} halted={}",
    node_id,
    status,
    current_term,
    "current_leader_id.as_deref().unwrap_or(\"-\")",
    commit_index,
    last_applied,
    last_log_index,
    snapshot_index,
    "cluster_members.len()",
    halted
)]
pub struct NodeStatusInfo {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub current_term: u64,
    pub current_leader_id: Option<NodeId>,
    pub commit_index: u64,
    pub last_applied: u64,
    pub last_log_index: u64,

    /// Last log index covered by the stored snapshot. Zero without a snapshot.
    pub snapshot_index: u64,
    pub cluster_members: Vec<NodeId>,
    pub halted: bool,
}

pub trait NodeStatusSource: Send + Sync {
    fn status(&self) -> NodeStatusInfo;
}

struct NodeStatusReader<Log, Rsm, Ns>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Ns: NodeStateSaver,
{
    protected_node: ProtectedNode<Log, Ns>,
    rsm: Arc<Mutex<Rsm>>,
}

impl<Log, Rsm, Ns> NodeStatusSource for NodeStatusReader<Log, Rsm, Ns>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Ns: NodeStateSaver,
{
    fn status(&self) -> NodeStatusInfo {
        let last_applied = self.rsm.lock().last_applied_entry_index();
        let node = self.protected_node.lock();

        NodeStatusInfo {
            node_id: node.id.clone(),
            status: node.status,
            current_term: node.current_term(),
            current_leader_id: node.current_leader_id.clone(),
            commit_index: node.commit_index(),
            last_applied,
            last_log_index: node.log.last_entry_index(),
            snapshot_index: node.log.snapshot_index(),
            cluster_members: node.cluster_configuration().all_nodes(),
            halted: node.is_halted(),
        }
    }
}

/// Handle for the running node. The node stops on the termination request or on the
/// fatal failure, returned from `join` and `terminate`.
pub struct NodeWorker {
    join_handle: JoinHandle<Result<(), RaftError>>,
    terminate_worker_tx: Sender<()>,
    status_source: Arc<dyn NodeStatusSource>,
}

impl fmt::Debug for NodeWorker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeWorker({})", self.status_source.status())
    }
}

impl NodeWorker {
    pub fn status(&self) -> NodeStatusInfo {
        self.status_source.status()
    }

    pub fn status_source(&self) -> Arc<dyn NodeStatusSource> {
        self.status_source.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    pub fn terminate(self) -> Result<(), RaftError> {
        if self.terminate_worker_tx.send(()).is_err() {
            trace!("Node is already stopped");
        }

        self.join()
    }

    /// Waits for the node stop.
    pub fn join(self) -> Result<(), RaftError> {
        match self.join_handle.join() {
            Ok(result) => result,
            Err(_) => Err(RaftError::new(
                ErrorKind::General,
                "Node stopped abnormally".to_string(),
                "supervisor thread panicked".to_string(),
            )),
        }
    }
}

pub fn start<Log, Rsm, Cc, Pc, Et, Ns>(
    config: NodeConfiguration<Log, Rsm, Cc, Pc, Et, Ns>,
) -> Result<NodeWorker, RaftError>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler + PeerRequestChannels,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
{
    let (replicate_log_to_peer_tx, replicate_log_to_peer_rx): (Sender<NodeId>, Receiver<NodeId>) =
        crossbeam_channel::unbounded();
    let (commit_index_updated_tx, commit_index_updated_rx): (Sender<u64>, Receiver<u64>) =
        crossbeam_channel::unbounded();
    let (node_failure_tx, node_failure_rx): (Sender<RaftError>, Receiver<RaftError>) =
        crossbeam_channel::unbounded();
    let (leader_initial_heartbeat_tx, leader_initial_heartbeat_rx): (Sender<()>, Receiver<()>) =
        crossbeam_channel::unbounded();

    let node_id = config.node_state.node_id.clone();
    let mut node = Node::new(
        config.node_state,
        config.operation_log,
        config.state_saver,
        config.limits,
        replicate_log_to_peer_tx.clone(),
        commit_index_updated_tx,
        node_failure_tx,
    );

    let join_target = match config.membership {
        NodeMembership::Bootstrap => {
            node.bootstrap()?;
            None
        }
        NodeMembership::Join(target, retry_policy) => {
            if node.log.last_entry_index() == 0 && !node.is_voting_member() {
                Some((target, retry_policy))
            } else {
                info!("Node {} has existing state. Join skipped", node_id);
                None
            }
        }
        NodeMembership::Existing => None,
    };

    let protected_node = Arc::new(Mutex::new(node));
    let rsm = Arc::new(Mutex::new(config.rsm));
    let pending_requests = PendingRequests::new();

    let peer_thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(PEER_THREAD_POOL_SIZE)
        .thread_name(|idx| format!("raft-peer-{}", idx))
        .build()
        .map_err(|err| {
            RaftError::new(
                ErrorKind::General,
                "Cannot create peer thread pool".to_string(),
                err.to_string(),
            )
        })?;
    let peer_thread_pool = Arc::new(peer_thread_pool);

    let election_administrator = RaftElectionsAdministrator::new();
    let watchdog_handler = LeadershipStatusWatchdogHandler::new();

    let election_worker = common::run_worker(
        run_node_status_watcher,
        ElectionManagerParams {
            protected_node: protected_node.clone(),
            election_administrator: election_administrator.clone(),
            leader_initial_heartbeat_tx,
            leadership_status_watchdog_handler: watchdog_handler.clone(),
            peer_communicator: config.peer_communicator.clone(),
            peer_thread_pool: peer_thread_pool.clone(),
        },
    );

    let check_leader_worker = common::run_worker(
        watch_leader_status,
        WatchLeaderStatusParams {
            protected_node: protected_node.clone(),
            raft_elections_administrator: election_administrator,
            watchdog_event_rx: watchdog_handler.clone(),
            election_timer: config.election_timer,
        },
    );

    let peer_request_processor_worker = common::run_worker(
        process_peer_request,
        PeerRequestHandlerParams {
            protected_node: protected_node.clone(),
            peer_communicator: config.peer_communicator.clone(),
            leadership_status_watchdog_handler: watchdog_handler,
        },
    );

    let join_request_processor_worker = common::run_worker(
        process_join_requests,
        JoinRequestHandlerParams {
            protected_node: protected_node.clone(),
            peer_communicator: config.peer_communicator.clone(),
        },
    );

    let send_heartbeat_append_entries_worker = common::run_worker(
        send_heartbeat_append_entries,
        SendHeartbeatAppendEntriesParams {
            protected_node: protected_node.clone(),
            leader_initial_heartbeat_rx,
            replicate_log_to_peer_tx,
        },
    );

    let peer_log_replicator_worker = common::run_worker(
        replicate_log_to_peer,
        LogReplicatorParams {
            protected_node: protected_node.clone(),
            replicate_log_to_peer_rx,
            peer_communicator: config.peer_communicator.clone(),
            peer_thread_pool: peer_thread_pool.clone(),
        },
    );

    let rsm_updater_worker = common::run_worker(
        update_rsm,
        RsmUpdaterParams {
            protected_node: protected_node.clone(),
            rsm: rsm.clone(),
            commit_index_updated_rx,
            pending_requests: pending_requests.clone(),
        },
    );

    let client_request_handler_worker = common::run_worker(
        process_client_requests,
        ClientRequestHandlerParams {
            protected_node: protected_node.clone(),
            rsm: rsm.clone(),
            client_communicator: config.client_communicator,
            peer_communicator: config.peer_communicator.clone(),
            pending_requests,
            peer_thread_pool,
        },
    );

    let mut workers = vec![
        client_request_handler_worker,
        send_heartbeat_append_entries_worker,
        peer_request_processor_worker,
        join_request_processor_worker,
        check_leader_worker,
        election_worker,
        peer_log_replicator_worker,
        rsm_updater_worker,
    ];

    if let Some((join_target, retry_policy)) = join_target {
        info!("Node {} joining the cluster via {}", node_id, join_target);
        workers.push(common::run_worker(
            join_cluster,
            JoinClusterParams {
                protected_node: protected_node.clone(),
                peer_communicator: config.peer_communicator,
                join_target,
                retry_policy,
            },
        ));
    }

    let worker_pool = RaftWorkerPool::new(workers);

    let status_source: Arc<dyn NodeStatusSource> = Arc::new(NodeStatusReader { protected_node, rsm });

    let (terminate_worker_tx, terminate_worker_rx): (Sender<()>, Receiver<()>) =
        crossbeam_channel::unbounded();

    let join_handle = thread::spawn(move || {
        info!("Node {} started", node_id);

        let result = select!(
            recv(terminate_worker_rx) -> res => {
                if res.is_err() {
                    error!("Abnormal exit for node: {}", node_id);
                }
                info!("Node {} termination requested", node_id);
                Ok(())
            },
            recv(node_failure_rx) -> res => {
                match res {
                    Ok(err) => {
                        error!("Node {} failed: {}", node_id, err);
                        Err(err)
                    },
                    Err(_) => Ok(()),
                }
            },
        );

        worker_pool.terminate();
        worker_pool.join();

        info!("Node {} shutting down", node_id);

        result
    });

    Ok(NodeWorker {
        join_handle,
        terminate_worker_tx,
        status_source,
    })
}
