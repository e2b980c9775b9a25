use crate::communication::peers::NodeId;

pub mod administrator;
pub mod election_manager;

pub enum LeaderElectionEvent {
    PromoteNodeToCandidate(CandidateInfo),
    PromoteNodeToLeader(u64), //term
    ResetNodeToFollower(FollowerInfo),
}

/// Election timeout elapsed in the term.
pub struct CandidateInfo {
    pub term: u64,
    pub candidate_id: NodeId,
}

pub struct FollowerInfo {
    pub term: u64,
    pub leader_id: Option<NodeId>,
}
