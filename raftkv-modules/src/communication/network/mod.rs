//! TCP transport. One request per connection: the request frame is answered by a single
//! response frame and the connection is closed.

pub mod client_communicator;
mod frame;
pub mod peer_communicator;
mod server;

use raftkv::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    JoinRequest, JoinResponse, ReadRequest, VoteRequest, VoteResponse, WriteRequest,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
enum PeerMessage {
    Vote(VoteRequest),
    AppendEntries(AppendEntriesRequest),
    InstallSnapshot(InstallSnapshotRequest),
    Join(JoinRequest),
}

#[derive(Debug, Serialize, Deserialize)]
enum PeerReply {
    Vote(VoteResponse),
    AppendEntries(AppendEntriesResponse),
    InstallSnapshot(InstallSnapshotResponse),
    Join(JoinResponse),
}

#[derive(Debug, Serialize, Deserialize)]
enum ClientMessage {
    Write(WriteRequest),
    Read(ReadRequest),
}
