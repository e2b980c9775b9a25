use rayon::ThreadPool;
use std::sync::Arc;

use crate::common::peer_consensus_requester::request_peer_consensus;
use crate::communication::peers::{NodeId, PeerRequestHandler, VoteRequest, VoteResponse};
use crate::errors::RaftError;
use crate::leadership::status::administrator::RaftElections;
use crate::leadership::status::FollowerInfo;

pub struct StartElectionParams<Pc, Re>
where
    Pc: PeerRequestHandler,
    Re: RaftElections,
{
    pub node_id: NodeId,
    pub term: u64,
    pub last_log_index: u64,
    pub last_log_term: u64,
    pub raft_elections_administrator: Re,
    pub peers: Vec<NodeId>,
    pub quorum_size: u32,
    pub peer_communicator: Pc,
    pub peer_thread_pool: Arc<ThreadPool>,
}

pub fn start_election<Pc, Re>(params: StartElectionParams<Pc, Re>)
where
    Pc: PeerRequestHandler,
    Re: RaftElections,
{
    let vote_request = VoteRequest {
        candidate_id: params.node_id.clone(),
        term: params.term,
        last_log_index: params.last_log_index,
        last_log_term: params.last_log_term,
    };

    let requester = |dest_node_id: &NodeId, req: VoteRequest| -> Result<VoteResponse, RaftError> {
        let resp = params.peer_communicator.send_vote_request(dest_node_id, req)?;

        trace!(
            "Destination Node {} vote requested. Result={}",
            dest_node_id,
            resp.vote_granted
        );

        if resp.term > params.term {
            params
                .raft_elections_administrator
                .reset_node_to_follower(FollowerInfo {
                    term: resp.term,
                    leader_id: None,
                });
        }
        Ok(resp)
    };

    let notify_peers_result = params.peer_thread_pool.install(|| {
        request_peer_consensus(
            vote_request,
            &params.node_id,
            params.peers.clone(),
            params.quorum_size,
            requester,
        )
    });

    match notify_peers_result {
        Ok(true) => {
            info!(
                "Leader election - quorum ({}) gathered for Node {} term {}",
                params.quorum_size, params.node_id, params.term
            );
            params
                .raft_elections_administrator
                .promote_node_to_leader(params.term);
        }
        Ok(false) => {
            info!("Leader election failed for Node {} term {}", params.node_id, params.term);
        }
        Err(err) => {
            warn!(
                "Leader election failed with errors for Node {} term {}: {}",
                params.node_id, params.term, err
            );
        }
    };
}
