use core::fmt;
use std::error::Error;
use std::fmt::Display;

/// Error category. Only `Durability` errors are fatal for the node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Display)]
pub enum ErrorKind {
    /// Unclassified error.
    General,

    /// Peer is unreachable or the request timed out. Retried by the caller.
    Transport,

    /// Local persistence failed. The node stops participating.
    Durability,

    /// Request was sent to a node which is not the leader.
    NotLeader,

    /// Client request deadline elapsed.
    Timeout,

    /// Encoding or decoding failure.
    Serialization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftError {
    kind: ErrorKind,
    text: String,
    cause: String,
}

pub(crate) type Result<T> = std::result::Result<T, RaftError>;

pub fn new_err<T>(text: String, cause: String) -> Result<T> {
    Err(RaftError::new(ErrorKind::General, text, cause))
}

impl RaftError {
    pub fn new(kind: ErrorKind, text: String, cause: String) -> RaftError {
        RaftError { kind, text, cause }
    }

    pub fn transport(text: String, cause: String) -> RaftError {
        RaftError::new(ErrorKind::Transport, text, cause)
    }

    pub fn durability(text: String, cause: String) -> RaftError {
        RaftError::new(ErrorKind::Durability, text, cause)
    }

    pub fn serialization(text: String, cause: String) -> RaftError {
        RaftError::new(ErrorKind::Serialization, text, cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Fatal errors stop the node.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Durability
    }
}

impl Display for RaftError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cause_word = {
            if !self.cause.is_empty() {
                " Cause: ".to_string()
            } else {
                String::new()
            }
        };
        write!(f, "{} error: {}.{}{}", self.kind, self.text, cause_word, self.cause)
    }
}

impl Error for RaftError {}

pub(crate) fn new_multiple_err<T>(text: String, causes: Vec<RaftError>) -> Result<T> {
    let mut error_string = String::new();

    if !causes.is_empty() {
        error_string.push_str("Errors: ");
    }

    let kind = if causes.iter().all(|err| err.kind == ErrorKind::Transport) {
        ErrorKind::Transport
    } else {
        ErrorKind::General
    };

    for (error_index, err) in causes.into_iter().enumerate() {
        error_string.push_str(&format!("{}) {} ", error_index + 1, err));
    }
    Err(RaftError::new(kind, text, error_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_cause() {
        let err = RaftError::durability("cannot append entry".to_string(), "disk full".to_string());

        assert_eq!(
            "Durability error: cannot append entry. Cause: disk full",
            err.to_string()
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_multiple_transport_errors_stay_transport() {
        let causes = vec![
            RaftError::transport("peer a".to_string(), String::new()),
            RaftError::transport("peer b".to_string(), String::new()),
        ];

        let result: Result<()> = new_multiple_err("no quorum".to_string(), causes);
        let err = result.expect_err("error expected");

        assert_eq!(ErrorKind::Transport, err.kind());
        assert!(!err.is_fatal());
    }
}
