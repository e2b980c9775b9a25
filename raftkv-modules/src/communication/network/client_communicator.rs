use super::frame::{read_frame, send_request, write_frame};
use super::server::spawn_listener;
use super::ClientMessage;
use crate::communication::duplex_channel::DuplexChannel;

use crossbeam_channel::{Receiver, Sender};
use raftkv::{
    ClientRequestChannels, ClientRequestHandler, ClientRpcResponse, RaftError, ReadRequest,
    WriteRequest,
};

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Client API endpoint of the node served over TCP.
#[derive(Clone, Debug)]
pub struct NetworkClientCommunicator {
    local_address: SocketAddr,
    write_duplex_channel: DuplexChannel<WriteRequest, ClientRpcResponse>,
    read_duplex_channel: DuplexChannel<ReadRequest, ClientRpcResponse>,
}

impl NetworkClientCommunicator {
    /// Starts listening on the api address. The timeout should exceed the node client
    /// request timeout.
    pub fn start(api_address: &str, timeout: Duration) -> Result<NetworkClientCommunicator, RaftError> {
        let write_duplex_channel =
            DuplexChannel::new(format!("Write channel api={}", api_address), timeout);
        let read_duplex_channel =
            DuplexChannel::new(format!("Read channel api={}", api_address), timeout);

        let server_write_channel = write_duplex_channel.clone();
        let server_read_channel = read_duplex_channel.clone();
        let local_address = spawn_listener("client", api_address, timeout, move |stream| {
            serve_client_connection(stream, &server_write_channel, &server_read_channel)
        })?;

        Ok(NetworkClientCommunicator {
            local_address,
            write_duplex_channel,
            read_duplex_channel,
        })
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }
}

fn serve_client_connection(
    mut stream: TcpStream,
    write_channel: &DuplexChannel<WriteRequest, ClientRpcResponse>,
    read_channel: &DuplexChannel<ReadRequest, ClientRpcResponse>,
) -> Result<(), RaftError> {
    let message: ClientMessage = read_frame(&mut stream)?;
    let response = match message {
        ClientMessage::Write(request) => write_channel.send_request(request)?,
        ClientMessage::Read(request) => read_channel.send_request(request)?,
    };

    write_frame(&mut stream, &response)
}

impl ClientRequestChannels for NetworkClientCommunicator {
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

/// Remote client of the node api address.
#[derive(Clone, Debug)]
pub struct NetworkClient {
    api_address: String,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl NetworkClient {
    pub fn new(api_address: String, connect_timeout: Duration, response_timeout: Duration) -> NetworkClient {
        NetworkClient {
            api_address,
            connect_timeout,
            response_timeout,
        }
    }
}

impl ClientRequestHandler for NetworkClient {
    fn write(&self, request: WriteRequest) -> Result<ClientRpcResponse, RaftError> {
        trace!("{} to {}", request, self.api_address);
        send_request(
            &self.api_address,
            &ClientMessage::Write(request),
            self.connect_timeout,
            self.response_timeout,
        )
    }

    fn read(&self, request: ReadRequest) -> Result<ClientRpcResponse, RaftError> {
        trace!("{} to {}", request, self.api_address);
        send_request(
            &self.api_address,
            &ClientMessage::Read(request),
            self.connect_timeout,
            self.response_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftkv::ClientResponseStatus;
    use std::thread;

    #[test]
    fn test_read_request_over_tcp() {
        let timeout = Duration::from_millis(1000);
        let server = NetworkClientCommunicator::start("127.0.0.1:0", timeout).expect("listener started");

        let request_rx = server.read_request_rx();
        let response_tx = server.read_response_tx();
        let handler = thread::spawn(move || {
            let request = request_rx.recv().expect("request");
            let mut response = ClientRpcResponse::new(ClientResponseStatus::Ok, None);
            response.value = Some(request.key);
            response_tx.send(response).expect("response");
        });

        let client = NetworkClient::new(server.local_address().to_string(), timeout, timeout);
        let response = client
            .read(ReadRequest {
                key: b"answer".to_vec(),
            })
            .expect("read response");

        assert_eq!(ClientResponseStatus::Ok, response.status);
        assert_eq!(Some(b"answer".to_vec()), response.value);
        handler.join().expect("handler");
    }
}
