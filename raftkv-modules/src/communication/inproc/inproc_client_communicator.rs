use crate::communication::duplex_channel::DuplexChannel;
use crossbeam_channel::{Receiver, Sender};
use raftkv::{
    ClientRequestChannels, ClientRequestHandler, ClientRpcResponse, RaftError, ReadRequest,
    WriteRequest,
};
use std::time::Duration;

/// In-memory client endpoint of the node.
#[derive(Clone, Debug)]
pub struct InProcClientCommunicator {
    write_duplex_channel: DuplexChannel<WriteRequest, ClientRpcResponse>,
    read_duplex_channel: DuplexChannel<ReadRequest, ClientRpcResponse>,
}

impl InProcClientCommunicator {
    /// The timeout should exceed the node client request timeout.
    pub fn new(node_id: &str, timeout: Duration) -> InProcClientCommunicator {
        InProcClientCommunicator {
            write_duplex_channel: DuplexChannel::new(
                format!("Write channel NodeId={}", node_id),
                timeout,
            ),
            read_duplex_channel: DuplexChannel::new(
                format!("Read channel NodeId={}", node_id),
                timeout,
            ),
        }
    }
}

impl ClientRequestChannels for InProcClientCommunicator {
    fn write_request_rx(&self) -> Receiver<WriteRequest> {
        self.write_duplex_channel.request_rx()
    }

    fn write_response_tx(&self) -> Sender<ClientRpcResponse> {
        self.write_duplex_channel.response_tx()
    }

    fn read_request_rx(&self) -> Receiver<ReadRequest> {
        self.read_duplex_channel.request_rx()
    }

    fn read_response_tx(&self) -> Sender<ClientRpcResponse> {
        self.read_duplex_channel.response_tx()
    }
}

impl ClientRequestHandler for InProcClientCommunicator {
    fn write(&self, request: WriteRequest) -> Result<ClientRpcResponse, RaftError> {
        trace!("{}", request);
        self.write_duplex_channel.send_request(request)
    }

    fn read(&self, request: ReadRequest) -> Result<ClientRpcResponse, RaftError> {
        trace!("{}", request);
        self.read_duplex_channel.send_request(request)
    }
}
