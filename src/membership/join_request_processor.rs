use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::communication::peers::{JoinRequest, JoinResponse, PeerRequestChannels};
use crate::node::state::{NodeStateSaver, NodeStatus, ProtectedNode};
use crate::operation_log::{EntryContent, NewClusterConfigurationEntryContent, OperationLog};

const COMMIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct JoinRequestHandlerParams<Log, Pc, Ns>
where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub peer_communicator: Pc,
}

/// Join requests wait for the configuration commit, so they are served apart from the
/// other peer requests.
pub fn process_join_requests<Log, Pc, Ns>(
    params: JoinRequestHandlerParams<Log, Pc, Ns>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Pc: PeerRequestChannels,
    Ns: NodeStateSaver,
{
    info!("Join request processor worker started");
    let node_id = params.protected_node.lock().id.clone();
    let join_request_rx = params.peer_communicator.join_request_rx(&node_id);
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for join request processor worker");
                }
                break
            },
            recv(join_request_rx) -> res => {
                match res {
                    Ok(request) => {
                        info!("Node {} Received {}", node_id, request);
                        let response = process_join_request(&params.protected_node, request);

                        let timeout = params.protected_node.lock().limits().communication_timeout;
                        let send_result = params
                            .peer_communicator
                            .join_response_tx(&node_id)
                            .send_timeout(response, timeout);
                        if let Err(err) = send_result {
                            warn!("Node {} cannot send join response: {}", node_id, err);
                        }
                    },
                    Err(err) => {
                        error!("Invalid join request: {}", err);
                        break
                    }
                }
            }
        );
    }
    info!("Join request processor worker stopped");
}

/// Leader appends the configuration with the new member and accepts the request once
/// the configuration is committed. One configuration change can be in flight.
pub fn process_join_request<Log, Ns>(
    protected_node: &ProtectedNode<Log, Ns>,
    request: JoinRequest,
) -> JoinResponse
where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    let (entry_index, entry_term, deadline) = {
        let mut node = protected_node.lock();

        if node.status != NodeStatus::Leader || node.is_halted() {
            return JoinResponse {
                accepted: false,
                leader_hint: node.current_leader_id.clone(),
            };
        }

        let leader_hint = Some(node.id.clone());
        if node.cluster_configuration().contains(&request.new_node) {
            info!("Node {} is already a cluster member", request.new_node);
            return JoinResponse {
                accepted: true,
                leader_hint,
            };
        }

        let committed_in_term = node.log.term_at(node.commit_index()) == Some(node.current_term());
        if node.has_pending_configuration_change() || !committed_in_term {
            info!("Node {} Configuration change is in progress. Join of {} postponed", node.id, request.new_node);
            return JoinResponse {
                accepted: false,
                leader_hint,
            };
        }

        let new_cluster_configuration = node
            .cluster_configuration()
            .with_member(request.new_node.clone());
        let entry_content = EntryContent::ClusterConfiguration(NewClusterConfigurationEntryContent {
            new_cluster_configuration,
        });

        match node.append_content_to_log(entry_content) {
            Ok(entry) => (
                entry.index,
                entry.term,
                Instant::now() + node.limits().client_request_timeout,
            ),
            Err(err) => {
                error!("Node {} cannot add {} to the cluster: {}", node.id, request.new_node, err);
                return JoinResponse {
                    accepted: false,
                    leader_hint,
                };
            }
        }
    };

    loop {
        {
            let node = protected_node.lock();
            if node.commit_index() >= entry_index {
                let accepted = node.log.term_at(entry_index) == Some(entry_term)
                    || entry_index < node.log.snapshot_index();
                info!("Node {} joined the cluster: {}", request.new_node, accepted);

                return JoinResponse {
                    accepted,
                    leader_hint: node.current_leader_id.clone(),
                };
            }

            if node.status != NodeStatus::Leader || Instant::now() >= deadline {
                return JoinResponse {
                    accepted: false,
                    leader_hint: node.current_leader_id.clone(),
                };
            }
        }

        thread::sleep(COMMIT_POLL_INTERVAL);
    }
}
