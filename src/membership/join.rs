use crossbeam_channel::Receiver;

use crate::communication::peers::{JoinRequest, NodeId, PeerRequestHandler};
use crate::errors::{ErrorKind, RaftError};
use crate::membership::RetryPolicy;
use crate::node::state::{NodeStateSaver, ProtectedNode};
use crate::operation_log::OperationLog;

pub struct JoinClusterParams<Log, Pc, Ns>
where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub peer_communicator: Pc,
    pub join_target: NodeId,
    pub retry_policy: RetryPolicy,
}

/// Asks the cluster to add the node. Follows the leader redirects and backs off between
/// the attempts. Exhausted attempts halt the node.
pub fn join_cluster<Log, Pc, Ns>(params: JoinClusterParams<Log, Pc, Ns>, terminate_worker_rx: Receiver<()>)
where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
{
    info!("Cluster join worker started");
    let node_id = params.protected_node.lock().id.clone();
    let mut target = params.join_target.clone();
    let mut attempt = 0;
    loop {
        attempt += 1;

        let request = JoinRequest {
            new_node: node_id.clone(),
        };
        let mut redirected = false;
        match params.peer_communicator.send_join_request(&target, request) {
            Ok(response) if response.accepted => {
                info!("Node {} joined the cluster via {}", node_id, target);
                break;
            }
            Ok(response) => match response.leader_hint {
                Some(leader) if leader != target => {
                    info!("Node {} join redirected from {} to {}", node_id, target, leader);
                    target = leader;
                    redirected = true;
                }
                _ => info!("Node {} join request to {} is postponed", node_id, target),
            },
            Err(err) => {
                warn!("Node {} join attempt {} to {} failed: {}", node_id, attempt, target, err);
                target = params.join_target.clone();
            }
        }

        if params.protected_node.lock().is_voting_member() {
            info!("Node {} is a cluster member", node_id);
            break;
        }

        if params.retry_policy.attempts_exhausted(attempt) {
            let err = RaftError::new(
                ErrorKind::Transport,
                format!("Cannot join the cluster via {}", params.join_target),
                format!("{} attempts made", attempt),
            );
            params.protected_node.lock().halt(err);
            break;
        }

        if redirected {
            continue;
        }

        let backoff = crossbeam_channel::after(params.retry_policy.backoff(attempt));
        select!(
            recv(terminate_worker_rx) -> _ => break,
            recv(backoff) -> _ => {},
        );
    }
    info!("Cluster join worker stopped");
}
