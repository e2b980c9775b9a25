use rayon::prelude::*;

use crate::common::QuorumResponse;
use crate::communication::peers::NodeId;
use crate::errors;
use crate::errors::RaftError;

/// Sends the request to all peers in parallel and counts positive responses.
/// The local node is counted as an implicit positive response.
pub fn request_peer_consensus<Req, Resp, Requester>(
    request: Req,
    node_id: &str,
    peers: Vec<NodeId>,
    quorum_size: u32,
    requester: Requester,
) -> Result<bool, RaftError>
where
    Requester: Fn(&NodeId, Req) -> Result<Resp, RaftError> + Sync,
    Req: Clone + Send + Sync,
    Resp: QuorumResponse,
{
    if quorum_size <= 1 {
        return Ok(true);
    }

    let responses = get_responses_from_peers(request, peers, requester);

    let mut votes = 1; //self voted already
    let mut errors = Vec::new();
    for response in responses {
        match response {
            Ok(peer_resp) => {
                if peer_resp.get_result() {
                    votes += 1;
                }

                if votes >= quorum_size {
                    trace!("Node {} gathered quorum for request", node_id);
                    return Ok(true);
                }
            }
            Err(err) => {
                errors.push(err);
            }
        }
    }

    info!(
        "Node {}: cannot get quorum for request. Vote count: {}, quorum: {}",
        node_id, votes, quorum_size
    );
    if !errors.is_empty() && votes == 1 {
        //no responses
        return errors::new_multiple_err("Cannot get quorum for request".to_string(), errors);
    }

    Ok(false)
}

fn get_responses_from_peers<Req, Resp, Requester>(
    request: Req,
    peers: Vec<NodeId>,
    requester: Requester,
) -> Vec<Result<Resp, RaftError>>
where
    Requester: Fn(&NodeId, Req) -> Result<Resp, RaftError> + Sync,
    Req: Clone + Send + Sync,
    Resp: QuorumResponse,
{
    peers
        .into_par_iter()
        .map(|peer_id| requester(&peer_id, request.clone()))
        .collect()
}
