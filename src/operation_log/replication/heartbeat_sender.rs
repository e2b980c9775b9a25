use crossbeam_channel::{Receiver, Sender};

use crate::communication::peers::NodeId;
use crate::node::state::{NodeStateSaver, NodeStatus, ProtectedNode};
use crate::operation_log::OperationLog;

pub struct SendHeartbeatAppendEntriesParams<Log, Ns>
where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub leader_initial_heartbeat_rx: Receiver<()>,
    pub replicate_log_to_peer_tx: Sender<NodeId>,
}

/// Heartbeat is a regular replication round: peers that are behind get the missing
/// entries, others get an empty request.
pub fn send_heartbeat_append_entries<Log, Ns>(
    params: SendHeartbeatAppendEntriesParams<Log, Ns>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    info!("Heartbeat sender worker started");
    let heartbeat_timeout = params.protected_node.lock().limits().heartbeat_timeout;
    let ticker = crossbeam_channel::tick(heartbeat_timeout);
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for heartbeat sender worker");
                }
                break
            },
            recv(ticker) -> _  => {
                send_heartbeat(&params)
            },
            recv(params.leader_initial_heartbeat_rx) -> res  => {
                if res.is_err() {
                    error!("Leader initial heartbeat channel is closed");
                    break
                }
                trace!("Sending initial heartbeat...");
                send_heartbeat(&params)
            },
        );
    }
    info!("Heartbeat sender worker stopped");
}

fn send_heartbeat<Log, Ns>(params: &SendHeartbeatAppendEntriesParams<Log, Ns>)
where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    let peers = {
        let node = params.protected_node.lock();
        if node.status != NodeStatus::Leader || node.is_halted() {
            return;
        }

        node.peers()
    };

    for peer_id in peers {
        if params.replicate_log_to_peer_tx.send(peer_id).is_err() {
            warn!("Log replicator is stopped. Heartbeat skipped");
            return;
        }
    }
}
