use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rayon::ThreadPool;

use crate::common::QuorumResponse;
use crate::communication::peers::{NodeId, PeerRequestHandler};
use crate::errors::RaftError;
use crate::node::state::{NodeStateSaver, NodeStatus, ProtectedNode, ReplicationRequest};
use crate::operation_log::OperationLog;

pub struct LogReplicatorParams<Log, Pc, Ns>
where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub replicate_log_to_peer_rx: Receiver<NodeId>,
    pub peer_communicator: Pc,
    pub peer_thread_pool: Arc<ThreadPool>,
}

/// Peer acknowledged the leadership for the request term.
#[derive(Clone, Copy, Debug)]
pub struct LeadershipConfirmation(pub bool);

impl QuorumResponse for LeadershipConfirmation {
    fn get_result(&self) -> bool {
        self.0
    }
}

// peer id -> another replication round was requested while in flight
type InFlightReplications = Arc<Mutex<HashMap<NodeId, bool>>>;

pub fn replicate_log_to_peer<Log, Pc, Ns>(
    params: LogReplicatorParams<Log, Pc, Ns>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    info!("Peer log replicator worker started");
    let in_flight: InFlightReplications = Arc::new(Mutex::new(HashMap::new()));
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for peer log replicator worker");
                }
                break
            },
            recv(params.replicate_log_to_peer_rx) -> peer_id_result => {
                match peer_id_result {
                    Ok(peer_id) => schedule_replication(&params, &in_flight, peer_id),
                    Err(err) => {
                        error!("Cannot receive peer id for replication: {}", err);
                        break
                    }
                }
            }
        );
    }
    info!("Peer log replicator worker stopped");
}

// At most one replication round per peer is in flight. Requests arriving meanwhile
// are merged into a single rerun.
fn schedule_replication<Log, Pc, Ns>(
    params: &LogReplicatorParams<Log, Pc, Ns>,
    in_flight: &InFlightReplications,
    peer_id: NodeId,
) where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    {
        let mut in_flight = in_flight.lock();
        if let Some(rerun) = in_flight.get_mut(&peer_id) {
            *rerun = true;
            return;
        }
        in_flight.insert(peer_id.clone(), false);
    }

    let protected_node = params.protected_node.clone();
    let communicator = params.peer_communicator.clone();
    let in_flight = in_flight.clone();
    params.peer_thread_pool.spawn(move || loop {
        let match_index = protected_node.lock().match_index(&peer_id);
        let has_more_entries = match replicate_to_peer(&protected_node, &communicator, &peer_id) {
            Ok(_) => {
                let node = protected_node.lock();
                node.status == NodeStatus::Leader
                    && node.match_index(&peer_id) > match_index
                    && node.next_index(&peer_id) <= node.log.last_entry_index()
            }
            Err(err) => {
                trace!("Replication to peer {} failed: {}", peer_id, err);
                false
            }
        };

        let mut in_flight = in_flight.lock();
        let rerun = in_flight.get(&peer_id).copied().unwrap_or(false);
        if rerun || has_more_entries {
            in_flight.insert(peer_id.clone(), false);
            continue;
        }
        in_flight.remove(&peer_id);
        break;
    });
}

/// Sends one replication request to the peer and processes the response. The node lock
/// is released while the request is in flight. Returns true when the peer acknowledged
/// the current leadership.
pub fn replicate_to_peer<Log, Pc, Ns>(
    protected_node: &ProtectedNode<Log, Ns>,
    communicator: &Pc,
    peer_id: &NodeId,
) -> Result<bool, RaftError>
where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    let request = protected_node.lock().create_replication_request(peer_id);

    match request {
        None => {
            protected_node.lock().halt_on_read_failure();
            Ok(false)
        }
        Some(ReplicationRequest::AppendEntries(request)) => {
            let request_term = request.term;
            let prev_log_index = request.prev_log_index;

            let response = communicator.send_append_entries_request(peer_id, request)?;

            protected_node.lock().process_append_entries_response(
                peer_id,
                request_term,
                prev_log_index,
                &response,
            )
        }
        Some(ReplicationRequest::InstallSnapshot(request)) => {
            let request_term = request.term;
            let last_included_index = request.last_included_index;

            info!(
                "Sending snapshot to peer {}, index = {}",
                peer_id, last_included_index
            );
            let response = communicator.send_install_snapshot_request(peer_id, request)?;

            protected_node.lock().process_install_snapshot_response(
                peer_id,
                request_term,
                last_included_index,
                &response,
            )
        }
    }
}
