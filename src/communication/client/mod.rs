use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::communication::peers::NodeId;
use crate::errors::RaftError;

/// Status of client RPC response.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum ClientResponseStatus {
    /// Successful request.
    Ok,

    /// Read request: the key is absent.
    NotFound,

    /// This node is not a leader. Retry against the leader hint.
    NotLeader,

    /// Request deadline elapsed. A write may still be applied later.
    Timeout,

    /// Error occurred.
    Error,
}

/// Client RPC request for the apply new data(command) to the operation log.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "Write request. Data size: {}", "data.len()")]
pub struct WriteRequest {
    /// Data(command) serialized in bytes format.
    pub data: Vec<u8>,
}

/// Client RPC request for the strongly consistent point read.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "Read request. Key size: {}", "key.len()")]
pub struct ReadRequest {
    pub key: Vec<u8>,
}

/// Generic response for the client RPC
#[derive(Clone, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[display(
    fmt = "Client RPC response: status {} current_leader {:?} message: {}",
    status,
    current_leader,
    message
)]
pub struct ClientRpcResponse {
    /// Response status.
    pub status: ClientResponseStatus,

    /// Current leader hint. Can be empty if no leader known to the moment.
    pub current_leader: Option<NodeId>,

    /// Read value. Set only for successful reads.
    pub value: Option<Vec<u8>>,

    /// Error message. Not empty if status is 'Error'.
    pub message: String,
}

impl ClientRpcResponse {
    pub fn new(status: ClientResponseStatus, current_leader: Option<NodeId>) -> ClientRpcResponse {
        ClientRpcResponse {
            status,
            current_leader,
            value: None,
            message: String::new(),
        }
    }

    pub fn error(current_leader: Option<NodeId>, message: String) -> ClientRpcResponse {
        ClientRpcResponse {
            status: ClientResponseStatus::Error,
            current_leader,
            value: None,
            message,
        }
    }
}

/// API abstraction for the communications with clients.
pub trait ClientRequestHandler: Clone + Sync + Send + 'static {
    /// Apply new data(command) to operation log.
    fn write(&self, request: WriteRequest) -> Result<ClientRpcResponse, RaftError>;

    /// Read committed value of the key.
    fn read(&self, request: ReadRequest) -> Result<ClientRpcResponse, RaftError>;
}

/// Abstraction for channels responsible for the communications with clients.
pub trait ClientRequestChannels: Send + Clone + 'static {
    /// Returns receiver channel for the write requests.
    fn write_request_rx(&self) -> Receiver<WriteRequest>;

    /// Returns sender channel for the write responses.
    fn write_response_tx(&self) -> Sender<ClientRpcResponse>;

    /// Returns receiver channel for the read requests.
    fn read_request_rx(&self) -> Receiver<ReadRequest>;

    /// Returns sender channel for the read responses.
    fn read_response_tx(&self) -> Sender<ClientRpcResponse>;
}
