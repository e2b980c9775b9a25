use crossbeam_channel::{Receiver, Sender};
use rayon::ThreadPool;
use std::sync::Arc;

use crate::common;
use crate::communication::peers::PeerRequestHandler;
use crate::leadership::election::{start_election, StartElectionParams};
use crate::leadership::status::administrator::{RaftElections, RaftElectionsChannelRx};
use crate::leadership::status::LeaderElectionEvent;
use crate::leadership::watchdog::watchdog_handler::ResetLeadershipStatusWatchdog;
use crate::node::state::{NodeStateSaver, NodeStatus, ProtectedNode};
use crate::operation_log::OperationLog;

pub struct ElectionManagerParams<Log, Pc, Ns, Rl, Re>
where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
    Re: RaftElections + RaftElectionsChannelRx,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub election_administrator: Re,
    pub leader_initial_heartbeat_tx: Sender<()>,
    pub leadership_status_watchdog_handler: Rl,
    pub peer_communicator: Pc,
    pub peer_thread_pool: Arc<ThreadPool>,
}

pub fn run_node_status_watcher<Log, Pc, Ns, Rl, Re>(
    params: ElectionManagerParams<Log, Pc, Ns, Rl, Re>,
    terminate_worker_rx: Receiver<()>,
) where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
    Re: RaftElections + RaftElectionsChannelRx,
{
    info!("Leader election status watcher worker started");
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for leader election status watcher worker");
                }
                break
            },
            recv(params.election_administrator.leader_election_event_rx()) -> event_result => {
                match event_result {
                    Ok(event) => change_node_leadership_state(&params, event),
                    Err(err) => {
                        error!("Cannot receive election event: {}", err);
                        break
                    }
                }
            }
        );
    }
    info!("Leader election status watcher worker stopped");
}

fn change_node_leadership_state<Log, Pc, Ns, Rl, Re>(
    params: &ElectionManagerParams<Log, Pc, Ns, Rl, Re>,
    event: LeaderElectionEvent,
) where
    Log: OperationLog,
    Pc: PeerRequestHandler,
    Ns: NodeStateSaver,
    Rl: ResetLeadershipStatusWatchdog,
    Re: RaftElections + RaftElectionsChannelRx,
{
    match event {
        LeaderElectionEvent::PromoteNodeToCandidate(info) => {
            let mut node = params.protected_node.lock();

            //obsolete timeout: the node heard from a leader or voted in a newer term
            if node.current_term() != info.term
                || node.status == NodeStatus::Leader
                || node.is_halted()
            {
                return;
            }

            let term = match node.become_candidate() {
                Ok(term) => term,
                Err(err) => {
                    error!("Node {} cannot become a candidate: {}", info.candidate_id, err);
                    return;
                }
            };

            let election_params = StartElectionParams {
                node_id: node.id.clone(),
                term,
                last_log_index: node.log.last_entry_index(),
                last_log_term: node.log.last_entry_term(),
                raft_elections_administrator: params.election_administrator.clone(),
                peers: node.peers(),
                quorum_size: node.cluster_configuration().quorum_size(),
                peer_communicator: params.peer_communicator.clone(),
                peer_thread_pool: params.peer_thread_pool.clone(),
            };

            common::run_worker_thread(start_election, election_params);
        }
        LeaderElectionEvent::PromoteNodeToLeader(term) => {
            let mut node = params.protected_node.lock();

            if node.status != NodeStatus::Candidate || node.current_term() != term {
                info!(
                    "Node {} obsolete election result for term {}. Current term {}",
                    node.id,
                    term,
                    node.current_term()
                );
                return;
            }

            if let Err(err) = node.become_leader() {
                error!("Node {} cannot become a leader: {}", node.id, err);
                return;
            }

            params
                .leadership_status_watchdog_handler
                .reset_leadership_status_watchdog();

            if params.leader_initial_heartbeat_tx.send(()).is_err() {
                error!("Node {} cannot send leader initial heartbeat", node.id);
            }
        }
        LeaderElectionEvent::ResetNodeToFollower(info) => {
            let mut node = params.protected_node.lock();

            if info.term < node.current_term() {
                return;
            }

            if let Err(err) = node.become_follower(info.term, info.leader_id) {
                error!("Node {} cannot become a follower: {}", node.id, err);
                return;
            }

            params
                .leadership_status_watchdog_handler
                .reset_leadership_status_watchdog();
        }
    }
}
