use crossbeam_channel::Receiver;

use crate::communication::peers::{
    AppendEntriesRequest, InstallSnapshotRequest, NodeId, PeerRequestChannels, VoteRequest,
};
use crate::leadership::vote_request_processor::process_vote_request;
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipStatusWatchdog;
use crate::node::state::{NodeStateSaver, ProtectedNode};
use crate::operation_log::replication::append_entries_processor::process_append_entries_request;
use crate::operation_log::replication::snapshot_processor::process_install_snapshot_request;
use crate::operation_log::OperationLog;

pub struct PeerRequestHandlerParams<Log, Pc, Ns, Rl>
where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub peer_communicator: Pc,
    pub leadership_status_watchdog_handler: Rl,
}

pub fn process_peer_request<Log, Pc, Ns, Rl>(
    params: PeerRequestHandlerParams<Log, Pc, Ns, Rl>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    info!("Peer request processor worker started");
    let node_id = params.protected_node.lock().id.clone();
    let vote_request_rx = params.peer_communicator.vote_request_rx(&node_id);
    let append_entries_request_rx = params.peer_communicator.append_entries_request_rx(&node_id);
    let install_snapshot_request_rx = params.peer_communicator.install_snapshot_request_rx(&node_id);
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for peer request processor worker");
                }
                break
            },
            recv(vote_request_rx) -> res => {
                match res {
                    Ok(request) => handle_vote_request(&node_id, request, &params),
                    Err(err) => {
                        error!("Invalid vote request: {}", err);
                        break
                    }
                }
            },
            recv(append_entries_request_rx) -> res => {
                match res {
                    Ok(request) => handle_append_entries_request(&node_id, request, &params),
                    Err(err) => {
                        error!("Invalid append entries request: {}", err);
                        break
                    }
                }
            },
            recv(install_snapshot_request_rx) -> res => {
                match res {
                    Ok(request) => handle_install_snapshot_request(&node_id, request, &params),
                    Err(err) => {
                        error!("Invalid install snapshot request: {}", err);
                        break
                    }
                }
            },
        );
    }
    info!("Peer request processor worker stopped");
}

fn handle_vote_request<Log, Pc, Ns, Rl>(
    node_id: &NodeId,
    request: VoteRequest,
    params: &PeerRequestHandlerParams<Log, Pc, Ns, Rl>,
) where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    trace!("Node {} Received {}", node_id, request);

    let vote_response = process_vote_request(
        request,
        &params.protected_node,
        &params.leadership_status_watchdog_handler,
    );

    let timeout = params.protected_node.lock().limits().communication_timeout;
    let send_result = params
        .peer_communicator
        .vote_response_tx(node_id)
        .send_timeout(vote_response, timeout);
    if let Err(err) = send_result {
        warn!("Node {} cannot send vote response: {}", node_id, err);
    }
}

fn handle_append_entries_request<Log, Pc, Ns, Rl>(
    node_id: &NodeId,
    request: AppendEntriesRequest,
    params: &PeerRequestHandlerParams<Log, Pc, Ns, Rl>,
) where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    trace!("Node {} Received {}", node_id, request);

    let append_entries_response = process_append_entries_request(
        request,
        &params.protected_node,
        &params.leadership_status_watchdog_handler,
    );

    let timeout = params.protected_node.lock().limits().communication_timeout;
    let send_result = params
        .peer_communicator
        .append_entries_response_tx(node_id)
        .send_timeout(append_entries_response, timeout);
    if let Err(err) = send_result {
        warn!("Node {} cannot send append entries response: {}", node_id, err);
    }
}

fn handle_install_snapshot_request<Log, Pc, Ns, Rl>(
    node_id: &NodeId,
    request: InstallSnapshotRequest,
    params: &PeerRequestHandlerParams<Log, Pc, Ns, Rl>,
) where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    info!("Node {} Received {}", node_id, request);

    let install_snapshot_response = process_install_snapshot_request(
        request,
        &params.protected_node,
        &params.leadership_status_watchdog_handler,
    );

    let timeout = params.protected_node.lock().limits().communication_timeout;
    let send_result = params
        .peer_communicator
        .install_snapshot_response_tx(node_id)
        .send_timeout(install_snapshot_response, timeout);
    if let Err(err) = send_result {
        warn!("Node {} cannot send install snapshot response: {}", node_id, err);
    }
}
