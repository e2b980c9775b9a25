use crossbeam_channel::Receiver;

use crate::leadership::status::administrator::RaftElections;
use crate::leadership::status::CandidateInfo;
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipEventChannelRx;
use crate::node::state::{NodeStateSaver, NodeStatus, ProtectedNode};
use crate::operation_log::OperationLog;
use crate::ElectionTimer;

pub struct WatchLeaderStatusParams<Log, Et, Ns, Rl, Re>
where
    Log: OperationLog,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipEventChannelRx,
    Re: RaftElections,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub raft_elections_administrator: Re,
    pub watchdog_event_rx: Rl,
    pub election_timer: Et,
}

pub fn watch_leader_status<Log, Et, Ns, Rl, Re>(
    params: WatchLeaderStatusParams<Log, Et, Ns, Rl, Re>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipEventChannelRx,
    Re: RaftElections,
{
    info!("Watch leader expiration status worker started");
    loop {
        let timeout = crossbeam_channel::after(params.election_timer.next_elections_timeout());
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for watch leader expiration status worker");
                }
                break
            },
            recv(timeout) -> _  => {
                propose_node_election(&params)
            },
            recv(params.watchdog_event_rx.reset_leadership_watchdog_rx())
                -> watchdog_event_result => {
                if let Err(err) = watchdog_event_result {
                    error!("Invalid result from watchdog_event_rx: {}", err);
                    break
                }
                continue
            },
        );
    }
    info!("Watch leader expiration status worker stopped");
}

fn propose_node_election<Log, Et, Ns, Rl, Re>(params: &WatchLeaderStatusParams<Log, Et, Ns, Rl, Re>)
where
    Log: OperationLog,
    Et: ElectionTimer,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipEventChannelRx,
    Re: RaftElections,
{
    let node = params.protected_node.lock();
    if node.status == NodeStatus::Leader || node.is_halted() {
        return;
    }

    if !node.is_voting_member() {
        trace!("Node {} is not a cluster member yet. Election skipped", node.id);
        return;
    }

    info!(
        "Node {} Leader awaiting time elapsed. Starting new election",
        node.id
    );

    params
        .raft_elections_administrator
        .promote_node_to_candidate(CandidateInfo {
            term: node.current_term(),
            candidate_id: node.id.clone(),
        });
}
