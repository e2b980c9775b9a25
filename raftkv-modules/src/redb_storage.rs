use raftkv::{LogEntry, NodeId, NodeState, NodeStateSaver, OperationLog, RaftError, Snapshot};
use parking_lot::Mutex;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::fs;
use std::ops::RangeBounds;
use std::path::Path;
use std::sync::Arc;

const LOG_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("raft_log");
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("raft_meta");

const NODE_STATE_KEY: &str = "node_state";
const SNAPSHOT_KEY: &str = "snapshot";

const DATABASE_FILE: &str = "raftkv.redb";

fn storage_err<E: Into<redb::Error>>(text: &str, err: E) -> RaftError {
    let err: redb::Error = err.into();
    RaftError::durability(text.to_string(), err.to_string())
}

fn encode<T: Serialize>(text: &str, value: &T) -> Result<Vec<u8>, RaftError> {
    bincode::serialize(value).map_err(|err| RaftError::durability(text.to_string(), err.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(text: &str, data: &'a [u8]) -> Result<T, RaftError> {
    bincode::deserialize(data).map_err(|err| RaftError::durability(text.to_string(), err.to_string()))
}

/// Opens (or creates) the node database in the data directory and creates the tables.
pub fn open_database<P: AsRef<Path>>(data_dir: P) -> Result<Arc<Database>, RaftError> {
    let data_dir = data_dir.as_ref();
    fs::create_dir_all(data_dir).map_err(|err| {
        RaftError::durability(
            format!("Cannot create data directory {}", data_dir.display()),
            err.to_string(),
        )
    })?;

    let db = Database::create(data_dir.join(DATABASE_FILE))
        .map_err(|err| storage_err("Cannot open database", err))?;

    let write_txn = db
        .begin_write()
        .map_err(|err| storage_err("Cannot initialize database", err))?;
    {
        write_txn
            .open_table(LOG_TABLE)
            .map_err(|err| storage_err("Cannot create log table", err))?;
        write_txn
            .open_table(META_TABLE)
            .map_err(|err| storage_err("Cannot create metadata table", err))?;
    }
    write_txn
        .commit()
        .map_err(|err| storage_err("Cannot initialize database", err))?;

    info!("Database opened in {}", data_dir.display());

    Ok(Arc::new(db))
}

fn read_meta(db: &Database, key: &str) -> Result<Option<Vec<u8>>, RaftError> {
    let read_txn = db
        .begin_read()
        .map_err(|err| storage_err("Cannot read metadata", err))?;
    let table = read_txn
        .open_table(META_TABLE)
        .map_err(|err| storage_err("Cannot read metadata", err))?;

    let value = table
        .get(key)
        .map_err(|err| storage_err("Cannot read metadata", err))?;

    Ok(value.map(|data| data.value().to_vec()))
}

fn write_meta(db: &Database, key: &str, data: &[u8]) -> Result<(), RaftError> {
    let write_txn = db
        .begin_write()
        .map_err(|err| storage_err("Cannot write metadata", err))?;
    {
        let mut table = write_txn
            .open_table(META_TABLE)
            .map_err(|err| storage_err("Cannot write metadata", err))?;
        table
            .insert(key, data)
            .map_err(|err| storage_err("Cannot write metadata", err))?;
    }
    write_txn
        .commit()
        .map_err(|err| storage_err("Cannot write metadata", err))
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredNodeState {
    current_term: u64,
    vote_for_id: Option<NodeId>,
}

/// Loads the persisted term and vote. A new database yields the initial state.
pub fn load_node_state(db: &Database, node_id: NodeId) -> Result<NodeState, RaftError> {
    let mut node_state = NodeState::new(node_id);

    if let Some(data) = read_meta(db, NODE_STATE_KEY)? {
        let stored: StoredNodeState = decode("Cannot decode node state", &data)?;
        node_state.current_term = stored.current_term;
        node_state.vote_for_id = stored.vote_for_id;
    }

    debug!("{} loaded", node_state);

    Ok(node_state)
}

/// Persists the term and vote to the node database.
#[derive(Clone)]
pub struct RedbNodeStateSaver {
    db: Arc<Database>,
}

impl RedbNodeStateSaver {
    pub fn new(db: Arc<Database>) -> RedbNodeStateSaver {
        RedbNodeStateSaver { db }
    }
}

impl fmt::Debug for RedbNodeStateSaver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RedbNodeStateSaver")
    }
}

impl NodeStateSaver for RedbNodeStateSaver {
    fn save_node_state(&self, state: &NodeState) -> Result<(), RaftError> {
        let stored = StoredNodeState {
            current_term: state.current_term,
            vote_for_id: state.vote_for_id.clone(),
        };
        let data = encode("Cannot encode node state", &stored)?;

        write_meta(&self.db, NODE_STATE_KEY, &data)?;
        trace!("{} saved", state);

        Ok(())
    }
}

/// Durable operation log. Every mutation is a committed redb write transaction.
/// The last entry position and the snapshot are cached.
pub struct RedbOperationLog {
    db: Arc<Database>,
    last_entry: Option<(u64, u64)>,
    snapshot: Option<Snapshot>,
    read_failure: Mutex<Option<RaftError>>,
}

impl fmt::Debug for RedbOperationLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RedbOperationLog")
            .field("last_entry", &self.last_entry)
            .field("snapshot_index", &self.snapshot_index())
            .finish()
    }
}

impl RedbOperationLog {
    /// Loads the snapshot and drops the entries it covers.
    pub fn open(db: Arc<Database>) -> Result<RedbOperationLog, RaftError> {
        let snapshot = match read_meta(&db, SNAPSHOT_KEY)? {
            Some(data) => Some(decode::<Snapshot>("Cannot decode snapshot", &data)?),
            None => None,
        };

        let mut log = RedbOperationLog {
            db,
            last_entry: None,
            snapshot,
            read_failure: Mutex::new(None),
        };

        let snapshot_index = log.snapshot_index();
        if snapshot_index > 0 {
            log.remove_range(..=snapshot_index, "Cannot compact log")?;
        }
        log.last_entry = log.read_last_entry()?;

        info!(
            "Operation log opened: last index = {} snapshot index = {}",
            log.last_entry_index(),
            snapshot_index
        );

        Ok(log)
    }

    fn read_last_entry(&self) -> Result<Option<(u64, u64)>, RaftError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|err| storage_err("Cannot read log", err))?;
        let table = read_txn
            .open_table(LOG_TABLE)
            .map_err(|err| storage_err("Cannot read log", err))?;

        let last = table
            .last()
            .map_err(|err| storage_err("Cannot read log", err))?;

        match last {
            Some((_, data)) => {
                let entry: LogEntry = decode("Cannot decode log entry", data.value())?;
                Ok(Some((entry.index, entry.term)))
            }
            None => Ok(None),
        }
    }

    fn read_entry(&self, index: u64) -> Result<Option<LogEntry>, RaftError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|err| storage_err("Cannot read log", err))?;
        let table = read_txn
            .open_table(LOG_TABLE)
            .map_err(|err| storage_err("Cannot read log", err))?;

        match table
            .get(&index)
            .map_err(|err| storage_err("Cannot read log", err))?
        {
            Some(data) => Ok(Some(decode("Cannot decode log entry", data.value())?)),
            None => Ok(None),
        }
    }

    fn remove_range<R>(&mut self, range: R, text: &str) -> Result<(), RaftError>
    where
        R: RangeBounds<u64> + 'static,
    {
        let write_txn = self.db.begin_write().map_err(|err| storage_err(text, err))?;
        {
            let mut table = write_txn
                .open_table(LOG_TABLE)
                .map_err(|err| storage_err(text, err))?;

            let to_remove = table
                .range(range)
                .map_err(|err| storage_err(text, err))?
                .map(|item| item.map(|(key, _)| key.value()))
                .collect::<Result<Vec<u64>, _>>()
                .map_err(|err| storage_err(text, err))?;

            for index in to_remove {
                table.remove(&index).map_err(|err| storage_err(text, err))?;
            }
        }
        write_txn.commit().map_err(|err| storage_err(text, err))
    }
}

impl OperationLog for RedbOperationLog {
    fn append_entries(&mut self, entries: Vec<LogEntry>) -> Result<(), RaftError> {
        let last = match entries.last() {
            Some(entry) => (entry.index, entry.term),
            None => return Ok(()),
        };

        let mut expected_index = self.last_entry_index() + 1;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|err| storage_err("Cannot append entries", err))?;
        {
            let mut table = write_txn
                .open_table(LOG_TABLE)
                .map_err(|err| storage_err("Cannot append entries", err))?;

            for entry in entries.iter() {
                if entry.index != expected_index {
                    return Err(RaftError::durability(
                        format!("Non-contiguous entry index {}", entry.index),
                        format!("expected {}", expected_index),
                    ));
                }
                expected_index += 1;

                let data = encode("Cannot encode log entry", entry)?;
                table
                    .insert(&entry.index, data.as_slice())
                    .map_err(|err| storage_err("Cannot append entries", err))?;
            }
        }
        write_txn
            .commit()
            .map_err(|err| storage_err("Cannot append entries", err))?;

        self.last_entry = Some(last);

        Ok(())
    }

    fn entry(&self, index: u64) -> Option<LogEntry> {
        match self.read_entry(index) {
            Ok(entry) => entry,
            Err(err) => {
                error!("Log entry {} read failed: {}", index, err);
                self.read_failure.lock().get_or_insert(err);
                None
            }
        }
    }

    fn last_entry_index(&self) -> u64 {
        match self.last_entry {
            Some((index, _)) => index,
            None => self.snapshot_index(),
        }
    }

    fn last_entry_term(&self) -> u64 {
        match self.last_entry {
            Some((_, term)) => term,
            None => self.snapshot_term(),
        }
    }

    fn truncate_suffix(&mut self, from_index: u64) -> Result<(), RaftError> {
        self.remove_range(from_index.., "Cannot truncate log")?;
        self.last_entry = self.read_last_entry()?;

        Ok(())
    }

    fn truncate_prefix(&mut self, upto_index: u64) -> Result<(), RaftError> {
        self.remove_range(..=upto_index, "Cannot compact log")?;
        self.last_entry = self.read_last_entry()?;

        Ok(())
    }

    fn save_snapshot(&mut self, snapshot: Snapshot) -> Result<(), RaftError> {
        let data = encode("Cannot encode snapshot", &snapshot)?;
        write_meta(&self.db, SNAPSHOT_KEY, &data)?;

        self.snapshot = Some(snapshot);

        Ok(())
    }

    fn read_failure(&self) -> Option<RaftError> {
        self.read_failure.lock().clone()
    }

    fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.clone()
    }

    fn snapshot_index(&self) -> u64 {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.last_included_index)
            .unwrap_or(0)
    }

    fn snapshot_term(&self) -> u64 {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.last_included_term)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftkv::{DataEntryContent, EntryContent};

    fn entry(index: u64, term: u64) -> LogEntry {
        LogEntry {
            index,
            term,
            entry_content: EntryContent::Data(DataEntryContent {
                data: format!("value {}", index).into_bytes(),
            }),
        }
    }

    fn snapshot(index: u64, term: u64) -> Snapshot {
        Snapshot {
            last_included_index: index,
            last_included_term: term,
            cluster_members: vec!["a".to_string(), "b".to_string()],
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_node_state_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");

        {
            let db = open_database(dir.path()).expect("database opened");
            let saver = RedbNodeStateSaver::new(db);
            let state = NodeState {
                node_id: "a".to_string(),
                current_term: 7,
                vote_for_id: Some("b".to_string()),
            };
            saver.save_node_state(&state).expect("state saved");
        }

        let db = open_database(dir.path()).expect("database reopened");
        let state = load_node_state(&db, "a".to_string()).expect("state loaded");

        assert_eq!(7, state.current_term);
        assert_eq!(Some("b".to_string()), state.vote_for_id);
    }

    #[test]
    fn test_new_database_has_initial_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = open_database(dir.path()).expect("database opened");

        let state = load_node_state(&db, "a".to_string()).expect("state loaded");

        assert_eq!(NodeState::new("a".to_string()), state);
    }

    #[test]
    fn test_log_entries_survive_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");

        {
            let db = open_database(dir.path()).expect("database opened");
            let mut log = RedbOperationLog::open(db).expect("log opened");
            log.append_entries(vec![entry(1, 1), entry(2, 1), entry(3, 2)])
                .expect("entries appended");
        }

        let db = open_database(dir.path()).expect("database reopened");
        let log = RedbOperationLog::open(db).expect("log reopened");

        assert_eq!(3, log.last_entry_index());
        assert_eq!(2, log.last_entry_term());
        assert_eq!(Some(entry(2, 1)), log.entry(2));
        assert_eq!(3, log.entries(1, 3).len());
    }

    #[test]
    fn test_truncate_suffix() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = open_database(dir.path()).expect("database opened");
        let mut log = RedbOperationLog::open(db).expect("log opened");
        log.append_entries((1..=5).map(|index| entry(index, 1)).collect())
            .expect("entries appended");

        log.truncate_suffix(3).expect("log truncated");

        assert_eq!(2, log.last_entry_index());
        assert_eq!(None, log.entry(3));
        assert!(log.append_entry(entry(4, 2)).is_err());
        log.append_entry(entry(3, 2)).expect("entry appended");
        assert_eq!(Some(2), log.term_at(3));
    }

    #[test]
    fn test_snapshot_compacts_log_on_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");

        {
            let db = open_database(dir.path()).expect("database opened");
            let mut log = RedbOperationLog::open(db).expect("log opened");
            log.append_entries((1..=5).map(|index| entry(index, 1)).collect())
                .expect("entries appended");

            // prefix truncation did not happen before the restart
            log.save_snapshot(snapshot(3, 1)).expect("snapshot saved");
        }

        let db = open_database(dir.path()).expect("database reopened");
        let log = RedbOperationLog::open(db).expect("log reopened");

        assert_eq!(Some(snapshot(3, 1)), log.snapshot());
        assert_eq!(None, log.entry(3));
        assert_eq!(Some(1), log.term_at(3));
        assert_eq!(Some(entry(4, 1)), log.entry(4));
        assert_eq!(5, log.last_entry_index());
    }

    #[test]
    fn test_empty_log_after_snapshot_reports_snapshot_position() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = open_database(dir.path()).expect("database opened");
        let mut log = RedbOperationLog::open(db).expect("log opened");
        log.append_entries(vec![entry(1, 1), entry(2, 3)])
            .expect("entries appended");

        log.save_snapshot(snapshot(2, 3)).expect("snapshot saved");
        log.truncate_prefix(2).expect("log compacted");

        assert_eq!(2, log.last_entry_index());
        assert_eq!(3, log.last_entry_term());
        log.append_entry(entry(3, 3)).expect("entry appended");
        assert_eq!(3, log.last_entry_index());
    }

    #[test]
    fn test_undecodable_entry_is_recorded_as_read_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = open_database(dir.path()).expect("database opened");
        let mut log = RedbOperationLog::open(Arc::clone(&db)).expect("log opened");
        log.append_entries(vec![entry(1, 1)]).expect("entry appended");

        let garbage = vec![0xffu8];
        let write_txn = db.begin_write().expect("write transaction");
        {
            let mut table = write_txn.open_table(LOG_TABLE).expect("log table");
            table.insert(&2u64, garbage.as_slice()).expect("garbage written");
        }
        write_txn.commit().expect("committed");

        assert_eq!(None, log.read_failure());
        assert_eq!(None, log.entry(2));

        let err = log.read_failure().expect("read failure recorded");
        assert!(err.is_fatal());
        assert_eq!(Some(entry(1, 1)), log.entry(1));
    }
}
