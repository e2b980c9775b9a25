use crate::communication::peers::{VoteRequest, VoteResponse};
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipStatusWatchdog;
use crate::node::state::{NodeStateSaver, ProtectedNode};
use crate::operation_log::OperationLog;

/// Grants at most one vote per term and only to candidates with the up-to-date log.
/// The vote is persisted before the response.
pub fn process_vote_request<Log, Ns, Rl>(
    request: VoteRequest,
    protected_node: &ProtectedNode<Log, Ns>,
    leadership_status_watchdog_handler: &Rl,
) -> VoteResponse
where
    Log: OperationLog,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
{
    let mut node = protected_node.lock();

    let mut vote_granted = false;
    if !node.is_halted() && request.term >= node.current_term() {
        let step_down_result = if request.term > node.current_term() {
            node.become_follower(request.term, None)
        } else {
            Ok(())
        };

        let can_vote = match node.voted_for_id() {
            None => true,
            Some(voted_for_id) => *voted_for_id == request.candidate_id,
        };

        if step_down_result.is_ok()
            && can_vote
            && node.check_candidate_last_log_entry(request.last_log_term, request.last_log_index)
            && node.grant_vote(request.candidate_id.clone()).is_ok()
        {
            vote_granted = true;
            leadership_status_watchdog_handler.reset_leadership_status_watchdog();
        }
    }

    trace!(
        "Node {} vote for {} in term {}: {}",
        node.id,
        request.candidate_id,
        request.term,
        vote_granted
    );

    VoteResponse {
        vote_granted,
        peer_id: node.id.clone(),
        term: node.current_term(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::state::mocks::{configuration_entry, data_entry, protected, test_node, MockOperationLog, MockWatchdog};
    use crate::operation_log::OperationLog;

    fn voter_log() -> MockOperationLog {
        let mut log = MockOperationLog::new();
        log.append_entry(configuration_entry(1, 1, &["a", "b", "c"])).expect("append");
        log.append_entry(data_entry(2, 2)).expect("append");

        log
    }

    fn vote_request(term: u64, candidate: &str, last_log_index: u64, last_log_term: u64) -> VoteRequest {
        VoteRequest {
            term,
            candidate_id: candidate.to_string(),
            last_log_index,
            last_log_term,
        }
    }

    #[test]
    fn test_one_vote_per_term() {
        let (node, _channels) = protected(test_node("a", 2, voter_log()));

        let first = process_vote_request(vote_request(3, "b", 2, 2), &node, &MockWatchdog);
        let second = process_vote_request(vote_request(3, "c", 5, 2), &node, &MockWatchdog);
        let repeated = process_vote_request(vote_request(3, "b", 2, 2), &node, &MockWatchdog);

        assert!(first.vote_granted);
        assert!(!second.vote_granted);
        assert!(repeated.vote_granted);
        assert_eq!(3, second.term);
    }

    #[test]
    fn test_outdated_candidate_log_is_rejected() {
        let (node, _channels) = protected(test_node("a", 2, voter_log()));

        let response = process_vote_request(vote_request(3, "b", 7, 1), &node, &MockWatchdog);

        assert!(!response.vote_granted);
        //term is adopted even without the vote
        assert_eq!(3, node.lock().current_term());
    }

    #[test]
    fn test_stale_term_is_rejected() {
        let (node, _channels) = protected(test_node("a", 5, voter_log()));

        let response = process_vote_request(vote_request(4, "b", 2, 2), &node, &MockWatchdog);

        assert!(!response.vote_granted);
        assert_eq!(5, response.term);
    }

    #[test]
    fn test_vote_is_persisted() {
        let test = test_node("a", 2, voter_log());
        let saver = test.state_saver.clone();
        let (node, _channels) = protected(test);

        process_vote_request(vote_request(3, "c", 2, 2), &node, &MockWatchdog);

        let saved = saver.saved.lock();
        let last = saved.last().expect("saved state");
        assert_eq!(3, last.current_term);
        assert_eq!(Some("c".to_string()), last.vote_for_id);
    }
}
