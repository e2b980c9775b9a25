use parking_lot::RwLock;
use raftkv::{EntryContent, LogEntry, RaftError, ReplicatedStateMachine};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::sync::Arc;

/// Key-value store command carried by the data log entries.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum KvCommand {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl KvCommand {
    pub fn encode(&self) -> Result<Vec<u8>, RaftError> {
        bincode::serialize(self).map_err(|err| {
            RaftError::serialization("Cannot encode key-value command".to_string(), err.to_string())
        })
    }

    pub fn decode(data: &[u8]) -> Result<KvCommand, RaftError> {
        bincode::deserialize(data).map_err(|err| {
            RaftError::serialization("Cannot decode key-value command".to_string(), err.to_string())
        })
    }
}

#[derive(Debug, Default)]
struct KvStoreState {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    last_applied: u64,
}

/// In-memory key-value state machine. Clones share the map, so a clone kept outside
/// the node can inspect the applied state.
#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore {
    state: Arc<RwLock<KvStoreState>>,
}

impl MemoryKvStore {
    pub fn new() -> MemoryKvStore {
        MemoryKvStore::default()
    }

    /// Copy of the whole map.
    pub fn entries(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.state.read().map.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().map.is_empty()
    }
}

impl ReplicatedStateMachine for MemoryKvStore {
    fn apply_entry(&mut self, entry: &LogEntry) -> Result<(), RaftError> {
        let mut state = self.state.write();

        if state.last_applied >= entry.index {
            warn!("Attempted to apply entry with existing index={}", entry.index);
            return Ok(());
        }
        state.last_applied = entry.index;

        if let EntryContent::Data(content) = &entry.entry_content {
            match KvCommand::decode(&content.data)? {
                KvCommand::Put { key, value } => {
                    state.map.insert(key, value);
                }
                KvCommand::Delete { key } => {
                    state.map.remove(&key);
                }
            }
        }

        trace!("Key-value store applied entry: {}", entry.index);

        Ok(())
    }

    fn last_applied_entry_index(&self) -> u64 {
        self.state.read().last_applied
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.state.read().map.get(key).cloned()
    }

    fn snapshot_data(&self) -> Result<Vec<u8>, RaftError> {
        bincode::serialize(&self.state.read().map).map_err(|err| {
            RaftError::serialization("Cannot serialize key-value store".to_string(), err.to_string())
        })
    }

    fn restore(&mut self, last_included_index: u64, data: &[u8]) -> Result<(), RaftError> {
        let map: BTreeMap<Vec<u8>, Vec<u8>> = bincode::deserialize(data).map_err(|err| {
            RaftError::serialization("Cannot restore key-value store".to_string(), err.to_string())
        })?;

        let mut state = self.state.write();
        state.map = map;
        state.last_applied = last_included_index;

        debug!("Key-value store restored, index = {}", last_included_index);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftkv::{DataEntryContent, ErrorKind};

    fn command_entry(index: u64, command: KvCommand) -> LogEntry {
        LogEntry {
            index,
            term: 1,
            entry_content: EntryContent::Data(DataEntryContent {
                data: command.encode().expect("command encodes"),
            }),
        }
    }

    fn put(key: &str, value: &str) -> KvCommand {
        KvCommand::Put {
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_put_and_delete() {
        let mut store = MemoryKvStore::new();

        store.apply_entry(&command_entry(1, put("x", "1"))).expect("applied");
        store.apply_entry(&command_entry(2, put("y", "2"))).expect("applied");
        store
            .apply_entry(&command_entry(3, KvCommand::Delete { key: b"x".to_vec() }))
            .expect("applied");

        assert_eq!(None, store.get(b"x"));
        assert_eq!(Some(b"2".to_vec()), store.get(b"y"));
        assert_eq!(3, store.last_applied_entry_index());
    }

    #[test]
    fn test_already_applied_entry_is_ignored() {
        let mut store = MemoryKvStore::new();

        store.apply_entry(&command_entry(1, put("x", "1"))).expect("applied");
        store.apply_entry(&command_entry(1, put("x", "2"))).expect("ignored");

        assert_eq!(Some(b"1".to_vec()), store.get(b"x"));
    }

    #[test]
    fn test_noop_advances_applied_index() {
        let mut store = MemoryKvStore::new();

        store
            .apply_entry(&LogEntry {
                index: 1,
                term: 1,
                entry_content: EntryContent::NoOp,
            })
            .expect("applied");

        assert_eq!(1, store.last_applied_entry_index());
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_command_is_rejected_but_applied() {
        let mut store = MemoryKvStore::new();

        let result = store.apply_entry(&LogEntry {
            index: 1,
            term: 1,
            entry_content: EntryContent::Data(DataEntryContent { data: vec![255; 3] }),
        });

        assert_eq!(ErrorKind::Serialization, result.expect_err("bad command").kind());
        assert_eq!(1, store.last_applied_entry_index());
    }

    #[test]
    fn test_restore_replaces_state() {
        let mut source = MemoryKvStore::new();
        source.apply_entry(&command_entry(1, put("a", "1"))).expect("applied");
        source.apply_entry(&command_entry(2, put("b", "2"))).expect("applied");
        let data = source.snapshot_data().expect("snapshot");

        let mut target = MemoryKvStore::new();
        target.apply_entry(&command_entry(1, put("c", "3"))).expect("applied");
        target.restore(2, &data).expect("restored");

        assert_eq!(source.entries(), target.entries());
        assert_eq!(None, target.get(b"c"));
        assert_eq!(2, target.last_applied_entry_index());
    }
}
