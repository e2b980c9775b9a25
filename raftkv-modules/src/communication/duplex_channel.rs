use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use std::sync::Arc;
use std::time::Duration;

use raftkv::RaftError;

/// Create abstraction for the dual-end communication via channels. Both channels are
/// rendezvous channels. Requesters take turns, so with a single request handler
/// every response reaches the requester of the matching request.
#[derive(Clone, Debug)]
pub struct DuplexChannel<Request, Response> {
    name: String,
    timeout_duration: Duration,
    exchange_lock: Arc<Mutex<()>>,

    /// Sender channel for the request.
    pub request_tx: Sender<Request>,

    /// Receiver channel for the request.
    pub request_rx: Receiver<Request>,

    /// Sender channel for the response.
    pub response_tx: Sender<Response>,

    /// Receiver channel for the response.
    pub response_rx: Receiver<Response>,
}

impl<Request, Response> DuplexChannel<Request, Response>
where
    Request: Send + 'static,
{
    /// Creates new DuplexChannel with the name and communication timeout on recv's and send's.
    pub fn new(name: String, timeout_duration: Duration) -> DuplexChannel<Request, Response> {
        let (request_tx, request_rx): (Sender<Request>, Receiver<Request>) =
            crossbeam_channel::bounded(0);
        let (response_tx, response_rx): (Sender<Response>, Receiver<Response>) =
            crossbeam_channel::bounded(0);

        DuplexChannel {
            timeout_duration,
            name,
            exchange_lock: Arc::new(Mutex::new(())),
            request_tx,
            request_rx,
            response_tx,
            response_rx,
        }
    }

    /// Returns the receiver channel for the request.
    pub fn request_rx(&self) -> Receiver<Request> {
        self.request_rx.clone()
    }

    /// Returns the sender channel for the response.
    pub fn response_tx(&self) -> Sender<Response> {
        self.response_tx.clone()
    }

    /// Sends request and gets response via channels.
    pub fn send_request(&self, request: Request) -> Result<Response, RaftError> {
        self.send_request_with_timeout(request, self.timeout_duration)
    }

    /// Sends request and waits for the response up to the timeout.
    pub fn send_request_with_timeout(
        &self,
        request: Request,
        response_timeout: Duration,
    ) -> Result<Response, RaftError> {
        let _exchange = self.exchange_lock.lock();

        let send_result = self.request_tx.send_timeout(request, self.timeout_duration);
        if let Err(err) = send_result {
            return Err(RaftError::transport(
                format!("Cannot send request. Channel : {} ", self.name),
                err.to_string(),
            ));
        }

        self.response_rx
            .recv_timeout(response_timeout)
            .map_err(|err| {
                RaftError::transport(
                    format!("Cannot receive response. Channel : {}", self.name),
                    err.to_string(),
                )
            })
    }
}
