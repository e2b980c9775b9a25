use crate::communication::peers::{InstallSnapshotRequest, InstallSnapshotResponse};
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipStatusWatchdog;
use crate::node::state::{NodeStateSaver, ProtectedNode};
use crate::operation_log::OperationLog;

/// Replaces the follower log prefix with the leader snapshot. The state machine is
/// restored from the saved snapshot by the rsm updater.
pub fn process_install_snapshot_request<Log, Ns, Rl>(
    request: InstallSnapshotRequest,
    protected_node: &ProtectedNode<Log, Ns>,
    leadership_status_watchdog_handler: &Rl,
) -> InstallSnapshotResponse
where
    Log: OperationLog,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    let mut node = protected_node.lock();

    if node.is_halted() || request.term < node.current_term() {
        return InstallSnapshotResponse {
            term: node.current_term(),
            success: false,
        };
    }

    if let Err(err) = node.become_follower(request.term, Some(request.leader_id.clone())) {
        error!("Node {} cannot accept the leader {}: {}", node.id, request.leader_id, err);
        return InstallSnapshotResponse {
            term: node.current_term(),
            success: false,
        };
    }
    leadership_status_watchdog_handler.reset_leadership_status_watchdog();

    let success = match node.install_snapshot(request.into_snapshot()) {
        Ok(()) => true,
        Err(err) => {
            error!("Node {} cannot install snapshot: {}", node.id, err);
            false
        }
    };

    InstallSnapshotResponse {
        term: node.current_term(),
        success,
    }
}
