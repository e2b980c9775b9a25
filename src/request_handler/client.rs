use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use rayon::ThreadPool;

use crate::common::peer_consensus_requester::request_peer_consensus;
use crate::communication::client::{
    ClientRequestChannels, ClientResponseStatus, ClientRpcResponse, ReadRequest, WriteRequest,
};
use crate::communication::peers::{NodeId, PeerRequestHandler};
use crate::errors::{ErrorKind, RaftError};
use crate::node::state::{NodeStateSaver, NodeStatus, ProtectedNode};
use crate::operation_log::replication::peer_log_replicator::{replicate_to_peer, LeadershipConfirmation};
use crate::operation_log::{DataEntryContent, EntryContent, OperationLog};
use crate::request_handler::pending_requests::PendingRequests;
use crate::rsm::ReplicatedStateMachine;

const APPLY_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct ClientRequestHandlerParams<Log, Rsm, Cc, Pc, Ns>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub rsm: Arc<Mutex<Rsm>>,
    pub client_communicator: Cc,
    pub peer_communicator: Pc,
    pub pending_requests: PendingRequests,
    pub peer_thread_pool: Arc<ThreadPool>,
}

pub fn process_client_requests<Log, Rsm, Cc, Pc, Ns>(
    params: ClientRequestHandlerParams<Log, Rsm, Cc, Pc, Ns>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    info!("Client request processor worker started");
    let write_request_rx = params.client_communicator.write_request_rx();
    let read_request_rx = params.client_communicator.read_request_rx();
    let response_timeout = params.protected_node.lock().limits().communication_timeout;
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for client request processor worker");
                }
                break
            },
            recv(write_request_rx) -> res => {
                match res {
                    Ok(request) => {
                        let response = process_write_request(&params, request);
                        let send_result = params.client_communicator
                            .write_response_tx()
                            .send_timeout(response, response_timeout);
                        if let Err(err) = send_result {
                            error!("Cannot send write response: {}", err);
                        }
                    },
                    Err(err) => {
                        error!("Invalid write request: {}", err);
                        break
                    }
                }
            },
            recv(read_request_rx) -> res => {
                match res {
                    Ok(request) => {
                        let response = process_read_request(&params, request);
                        let send_result = params.client_communicator
                            .read_response_tx()
                            .send_timeout(response, response_timeout);
                        if let Err(err) = send_result {
                            error!("Cannot send read response: {}", err);
                        }
                    },
                    Err(err) => {
                        error!("Invalid read request: {}", err);
                        break
                    }
                }
            },
        );
    }
    info!("Client request processor worker stopped");
}

/// Appends the command and waits until it is applied. A timeout does not cancel the
/// entry: it can still be committed and applied later.
pub fn process_write_request<Log, Rsm, Cc, Pc, Ns>(
    params: &ClientRequestHandlerParams<Log, Rsm, Cc, Pc, Ns>,
    request: WriteRequest,
) -> ClientRpcResponse
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    let (result_rx, entry_index, client_request_timeout) = {
        let mut node = params.protected_node.lock();
        trace!("Node {} Received {}", node.id, request);

        let max_size = node.limits().max_data_content_size;
        if request.data.len() as u64 > max_size {
            return ClientRpcResponse::error(
                node.current_leader_id.clone(),
                format!("Data size {} exceeds the limit {}", request.data.len(), max_size),
            );
        }

        if node.status != NodeStatus::Leader {
            return not_leader_response(node.current_leader_id.clone());
        }

        let entry_content = EntryContent::Data(DataEntryContent { data: request.data });
        match node.append_content_to_log(entry_content) {
            Ok(entry) => (
                params.pending_requests.register(&entry),
                entry.index,
                node.limits().client_request_timeout,
            ),
            Err(err) => return error_response(&err, node.current_leader_id.clone()),
        }
    };

    match result_rx.recv_timeout(client_request_timeout) {
        Ok(Ok(())) => ClientRpcResponse::new(ClientResponseStatus::Ok, Some(current_leader(params))),
        Ok(Err(err)) => error_response(&err, leader_hint(params)),
        Err(RecvTimeoutError::Timeout) => {
            params.pending_requests.remove(entry_index);
            ClientRpcResponse::new(ClientResponseStatus::Timeout, leader_hint(params))
        }
        Err(RecvTimeoutError::Disconnected) => {
            ClientRpcResponse::error(leader_hint(params), "Node is stopping".to_string())
        }
    }
}

/// Read index protocol: fixes the commit index, confirms the leadership with a quorum
/// round and serves the value once the state machine caught up with the fixed index.
pub fn process_read_request<Log, Rsm, Cc, Pc, Ns>(
    params: &ClientRequestHandlerParams<Log, Rsm, Cc, Pc, Ns>,
    request: ReadRequest,
) -> ClientRpcResponse
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    let (client_request_timeout, node_id) = {
        let node = params.protected_node.lock();
        trace!("Node {} Received {}", node.id, request);

        (node.limits().client_request_timeout, node.id.clone())
    };
    let deadline = Instant::now() + client_request_timeout;

    //commit index is not known to be current before the first commit in the leader term
    let (read_index, term, peers, quorum_size) = loop {
        {
            let node = params.protected_node.lock();
            if node.status != NodeStatus::Leader || node.is_halted() {
                return not_leader_response(node.current_leader_id.clone());
            }

            let commit_index = node.commit_index();
            if node.log.term_at(commit_index) == Some(node.current_term()) {
                break (
                    commit_index,
                    node.current_term(),
                    node.peers(),
                    node.cluster_configuration().quorum_size(),
                );
            }
        }

        if Instant::now() >= deadline {
            return ClientRpcResponse::new(ClientResponseStatus::Timeout, Some(node_id));
        }
        thread::sleep(APPLY_POLL_INTERVAL);
    };

    let protected_node = &params.protected_node;
    let peer_communicator = &params.peer_communicator;
    let requester = |peer_id: &NodeId, _: ()| -> Result<LeadershipConfirmation, RaftError> {
        replicate_to_peer(protected_node, peer_communicator, peer_id).map(LeadershipConfirmation)
    };
    let confirmation = params
        .peer_thread_pool
        .install(|| request_peer_consensus((), &node_id, peers, quorum_size, requester));

    let leadership_confirmed = matches!(confirmation, Ok(true)) && {
        let node = params.protected_node.lock();
        node.status == NodeStatus::Leader && node.current_term() == term
    };
    if !leadership_confirmed {
        info!("Node {} cannot confirm leadership for read in term {}", node_id, term);
        return not_leader_response(leader_hint(params));
    }

    loop {
        {
            let rsm = params.rsm.lock();
            if rsm.last_applied_entry_index() >= read_index {
                let value = rsm.get(&request.key);
                let status = if value.is_some() {
                    ClientResponseStatus::Ok
                } else {
                    ClientResponseStatus::NotFound
                };

                let mut response = ClientRpcResponse::new(status, Some(node_id));
                response.value = value;
                return response;
            }
        }

        if Instant::now() >= deadline {
            return ClientRpcResponse::new(ClientResponseStatus::Timeout, Some(node_id));
        }
        thread::sleep(APPLY_POLL_INTERVAL);
    }
}

fn not_leader_response(current_leader: Option<NodeId>) -> ClientRpcResponse {
    ClientRpcResponse::new(ClientResponseStatus::NotLeader, current_leader)
}

fn error_response(err: &RaftError, current_leader: Option<NodeId>) -> ClientRpcResponse {
    match err.kind() {
        ErrorKind::NotLeader => not_leader_response(current_leader),
        _ => ClientRpcResponse::error(current_leader, err.to_string()),
    }
}

fn leader_hint<Log, Rsm, Cc, Pc, Ns>(params: &ClientRequestHandlerParams<Log, Rsm, Cc, Pc, Ns>) -> Option<NodeId>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    params.protected_node.lock().current_leader_id.clone()
}

fn current_leader<Log, Rsm, Cc, Pc, Ns>(params: &ClientRequestHandlerParams<Log, Rsm, Cc, Pc, Ns>) -> NodeId
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Cc: ClientRequestChannels,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    let node = params.protected_node.lock();
    node.current_leader_id.clone().unwrap_or_else(|| node.id.clone())
}
