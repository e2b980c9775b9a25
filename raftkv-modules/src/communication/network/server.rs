use raftkv::RaftError;

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Binds the address and serves every accepted connection on its own thread.
/// Returns the bound address. The listener lives until the process exits.
pub(crate) fn spawn_listener<H>(
    name: &str,
    address: &str,
    io_timeout: Duration,
    handler: H,
) -> Result<SocketAddr, RaftError>
where
    H: Fn(TcpStream) -> Result<(), RaftError> + Send + Sync + 'static,
{
    let listener = TcpListener::bind(address).map_err(|err| {
        RaftError::transport(format!("Cannot bind {}", address), err.to_string())
    })?;
    let local_address = listener.local_addr().map_err(|err| {
        RaftError::transport(format!("Cannot bind {}", address), err.to_string())
    })?;

    let handler = Arc::new(handler);
    let listener_name = name.to_string();
    thread::Builder::new()
        .name(format!("{}-listener", name))
        .spawn(move || {
            info!("{} listener started on {}", listener_name, local_address);
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let configured = stream
                            .set_read_timeout(Some(io_timeout))
                            .and_then(|_| stream.set_write_timeout(Some(io_timeout)));
                        if let Err(err) = configured {
                            warn!("{} connection setup failed: {}", listener_name, err);
                            continue;
                        }

                        let handler = handler.clone();
                        let connection_name = listener_name.clone();
                        thread::spawn(move || {
                            if let Err(err) = handler(stream) {
                                debug!("{} connection error: {}", connection_name, err);
                            }
                        });
                    }
                    Err(err) => warn!("{} accept error: {}", listener_name, err),
                }
            }
        })
        .map_err(|err| {
            RaftError::transport(format!("Cannot start {} listener", name), err.to_string())
        })?;

    Ok(local_address)
}
