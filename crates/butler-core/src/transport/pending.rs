//! In-flight request correlation table

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use super::error::{TransportError, TransportResult};

type Completion = oneshot::Sender<TransportResult<Value>>;

struct PendingEntry {
    method: String,
    tx: Completion,
}

/// Correlation entries keyed by request id
///
/// Removing an entry is the only way to complete it, so whichever of
/// response, timeout or teardown removes it first is the one that fires.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entry and return the receiving half
    pub fn register(&self, id: impl Into<String>, method: impl Into<String>) -> oneshot::Receiver<TransportResult<Value>> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().insert(
            id.into(),
            PendingEntry {
                method: method.into(),
                tx,
            },
        );
        rx
    }

    /// Complete the entry for `id`; false if it was already gone
    pub fn resolve(&self, id: &str, outcome: TransportResult<Value>) -> bool {
        let entry = self.entries.lock().remove(id);
        match entry {
            Some(entry) => {
                // Receiver may have been dropped by a cancelled caller
                let _ = entry.tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop the entry without completing it; false if it was already gone
    pub fn discard(&self, id: &str) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Fail every entry with `error`, returning how many were failed
    pub fn fail_all(&self, error: &TransportError) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    /// Methods of the entries still waiting, for diagnostics
    pub fn methods(&self) -> Vec<String> {
        self.entries.lock().values().map(|e| e.method.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTable").field("len", &self.len()).finish()
    }
}
