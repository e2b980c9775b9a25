use raftkv::RaftError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Frames above the limit are rejected before the payload is read.
const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

fn io_err(text: &str, err: std::io::Error) -> RaftError {
    RaftError::transport(text.to_string(), err.to_string())
}

/// Writes the 4-byte big-endian length prefix and the bincode payload.
pub(crate) fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), RaftError> {
    let payload = bincode::serialize(message).map_err(|err| {
        RaftError::serialization("Cannot encode frame".to_string(), err.to_string())
    })?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(RaftError::serialization(
            "Frame is too large".to_string(),
            format!("{} bytes", payload.len()),
        ));
    }

    let len = payload.len() as u32;
    writer
        .write_all(&len.to_be_bytes())
        .map_err(|err| io_err("Cannot write frame", err))?;
    writer
        .write_all(&payload)
        .map_err(|err| io_err("Cannot write frame", err))?;
    writer.flush().map_err(|err| io_err("Cannot write frame", err))
}

pub(crate) fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, RaftError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .map_err(|err| io_err("Cannot read frame length", err))?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RaftError::serialization(
            "Frame is too large".to_string(),
            format!("{} bytes", len),
        ));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .map_err(|err| io_err("Cannot read frame", err))?;

    bincode::deserialize(&payload).map_err(|err| {
        RaftError::serialization("Cannot decode frame".to_string(), err.to_string())
    })
}

/// Connects to the address, sends the request frame and waits for the response frame.
pub(crate) fn send_request<Req, Resp>(
    address: &str,
    request: &Req,
    connect_timeout: Duration,
    response_timeout: Duration,
) -> Result<Resp, RaftError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let socket_address = address
        .to_socket_addrs()
        .map_err(|err| io_err(&format!("Cannot resolve address {}", address), err))?
        .next()
        .ok_or_else(|| {
            RaftError::transport(format!("Cannot resolve address {}", address), String::new())
        })?;

    let mut stream = TcpStream::connect_timeout(&socket_address, connect_timeout)
        .map_err(|err| io_err(&format!("Cannot connect to {}", address), err))?;
    stream
        .set_write_timeout(Some(connect_timeout))
        .map_err(|err| io_err("Cannot configure connection", err))?;
    stream
        .set_read_timeout(Some(response_timeout))
        .map_err(|err| io_err("Cannot configure connection", err))?;

    write_frame(&mut stream, request)?;
    read_frame(&mut stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftkv::ErrorKind;
    use std::io::Cursor;

    #[test]
    fn test_frame_has_length_prefix() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &"raft".to_string()).expect("frame written");

        let payload_len = buffer.len() - 4;
        assert_eq!(&(payload_len as u32).to_be_bytes()[..], &buffer[..4]);

        let message: String = read_frame(&mut Cursor::new(buffer)).expect("frame read");
        assert_eq!("raft", message);
    }

    #[test]
    fn test_truncated_frame_is_transport_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &vec![7u8; 32]).expect("frame written");
        buffer.truncate(10);

        let err = read_frame::<_, Vec<u8>>(&mut Cursor::new(buffer)).expect_err("truncated");
        assert_eq!(ErrorKind::Transport, err.kind());
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let buffer = (u32::MAX).to_be_bytes().to_vec();

        let err = read_frame::<_, Vec<u8>>(&mut Cursor::new(buffer)).expect_err("oversized");
        assert_eq!(ErrorKind::Serialization, err.kind());
    }
}
