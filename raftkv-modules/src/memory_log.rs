use raftkv::{LogEntry, OperationLog, RaftError, Snapshot};

/// Volatile operation log. Loses everything on restart, used by tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryOperationLog {
    entries: Vec<LogEntry>,
    snapshot: Option<Snapshot>,
}

impl MemoryOperationLog {
    pub fn new() -> MemoryOperationLog {
        MemoryOperationLog::default()
    }

    fn position(&self, index: u64) -> Option<usize> {
        let first_index = self.entries.first()?.index;
        if index < first_index {
            return None;
        }

        let position = (index - first_index) as usize;
        if position < self.entries.len() {
            Some(position)
        } else {
            None
        }
    }
}

impl OperationLog for MemoryOperationLog {
    fn append_entries(&mut self, entries: Vec<LogEntry>) -> Result<(), RaftError> {
        let mut expected_index = self.last_entry_index() + 1;
        for entry in entries.iter() {
            if entry.index != expected_index {
                return Err(RaftError::durability(
                    format!("Non-contiguous entry index {}", entry.index),
                    format!("expected {}", expected_index),
                ));
            }
            expected_index += 1;
        }

        self.entries.extend(entries);

        Ok(())
    }

    fn entry(&self, index: u64) -> Option<LogEntry> {
        self.position(index).map(|position| self.entries[position].clone())
    }

    fn last_entry_index(&self) -> u64 {
        match self.entries.last() {
            Some(entry) => entry.index,
            None => self.snapshot_index(),
        }
    }

    fn last_entry_term(&self) -> u64 {
        match self.entries.last() {
            Some(entry) => entry.term,
            None => self.snapshot_term(),
        }
    }

    fn truncate_suffix(&mut self, from_index: u64) -> Result<(), RaftError> {
        if let Some(position) = self.position(from_index) {
            self.entries.truncate(position);
        } else if let Some(first) = self.entries.first() {
            if from_index < first.index {
                self.entries.clear();
            }
        }

        Ok(())
    }

    fn truncate_prefix(&mut self, upto_index: u64) -> Result<(), RaftError> {
        self.entries.retain(|entry| entry.index > upto_index);

        Ok(())
    }

    fn save_snapshot(&mut self, snapshot: Snapshot) -> Result<(), RaftError> {
        self.snapshot = Some(snapshot);

        Ok(())
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
