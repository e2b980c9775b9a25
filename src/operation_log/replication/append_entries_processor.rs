use crate::communication::peers::{AppendEntriesRequest, AppendEntriesResponse};
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipStatusWatchdog;
use crate::node::state::{NodeStateSaver, ProtectedNode};
use crate::operation_log::OperationLog;

pub fn process_append_entries_request<Log, Ns, Rl>(
    request: AppendEntriesRequest,
    protected_node: &ProtectedNode<Log, Ns>,
    leadership_status_watchdog_handler: &Rl,
) -> AppendEntriesResponse
where
    Log: OperationLog,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    let mut node = protected_node.lock();

    if node.is_halted() {
        return AppendEntriesResponse {
            term: node.current_term(),
            success: false,
            match_index: 0,
        };
    }

    if request.term < node.current_term() {
        info!(
            "Node {} Stale 'Append Entries Request'. Current term {}, request term {}",
            node.id,
            node.current_term(),
            request.term
        );
        return AppendEntriesResponse {
            term: node.current_term(),
            success: false,
            match_index: node.log.last_entry_index(),
        };
    }

    if let Err(err) = node.become_follower(request.term, Some(request.leader_id.clone())) {
        error!("Node {} cannot accept the leader {}: {}", node.id, request.leader_id, err);
        return AppendEntriesResponse {
            term: node.current_term(),
            success: false,
            match_index: 0,
        };
    }
    leadership_status_watchdog_handler.reset_leadership_status_watchdog();

    if !node.check_log_for_previous_entry(request.prev_log_term, request.prev_log_index) {
        if node.halt_on_read_failure() {
            return AppendEntriesResponse {
                term: node.current_term(),
                success: false,
                match_index: 0,
            };
        }

        let hint = node.conflict_hint(request.prev_log_index);
        trace!(
            "Node {} Previous entry mismatch: index {} term {}. Hint {}",
            node.id,
            request.prev_log_index,
            request.prev_log_term,
            hint
        );

        return AppendEntriesResponse {
            term: node.current_term(),
            success: false,
            match_index: hint,
        };
    }

    let leader_commit = request.leader_commit;
    match node.append_leader_entries(request.prev_log_index, request.entries) {
        Ok(last_new_index) => {
            node.set_commit_index(leader_commit.min(last_new_index));

            AppendEntriesResponse {
                term: node.current_term(),
                success: true,
                match_index: last_new_index,
            }
        }
        Err(err) => {
            error!("Node {} cannot append leader entries: {}", node.id, err);

            AppendEntriesResponse {
                term: node.current_term(),
                success: false,
                match_index: 0,
            }
        }
    }
}
