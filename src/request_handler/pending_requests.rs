use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::errors::{ErrorKind, RaftError};
use crate::operation_log::LogEntry;

/// Outcome of applying the client entry to the state machine.
pub type ApplyResult = Result<(), RaftError>;

#[derive(Debug)]
struct PendingRequest {
    term: u64,
    result_tx: Sender<ApplyResult>,
}

/// Client requests awaiting the apply of their log entry, keyed by the entry index.
#[derive(Clone, Debug, Default)]
pub struct PendingRequests {
    requests: Arc<Mutex<HashMap<u64, PendingRequest>>>,
}

impl PendingRequests {
    pub fn new() -> PendingRequests {
        PendingRequests::default()
    }

    /// Must be called under the node lock right after the entry append so the entry
    /// cannot be applied before the registration.
    pub fn register(&self, entry: &LogEntry) -> Receiver<ApplyResult> {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);

        self.requests.lock().insert(
            entry.index,
            PendingRequest {
                term: entry.term,
                result_tx,
            },
        );

        result_rx
    }

    /// Delivers the apply result. A different term at the index means the registered
    /// entry was overwritten by another leader.
    pub fn resolve(&self, entry: &LogEntry, result: ApplyResult) {
        let pending = self.requests.lock().remove(&entry.index);

        if let Some(pending) = pending {
            let result = if pending.term == entry.term {
                result
            } else {
                Err(leadership_lost_err(entry.index))
            };

            if pending.result_tx.try_send(result).is_err() {
                trace!("Client for entry {} is gone", entry.index);
            }
        }
    }

    /// Fails requests up to the index with unknown outcome. Used when the applied
    /// entries are replaced by a snapshot.
    pub fn fail_up_to(&self, index: u64) {
        let mut requests = self.requests.lock();

        let indices: Vec<u64> = requests.keys().filter(|key| **key <= index).copied().collect();
        for entry_index in indices {
            if let Some(pending) = requests.remove(&entry_index) {
                let _ = pending.result_tx.try_send(Err(leadership_lost_err(entry_index)));
            }
        }
    }

    /// Drops the abandoned request.
    pub fn remove(&self, index: u64) {
        self.requests.lock().remove(&index);
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn leadership_lost_err(index: u64) -> RaftError {
    RaftError::new(
        ErrorKind::NotLeader,
        format!("Entry {} outcome is unknown", index),
        "leadership lost".to_string(),
    )
}
