use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::allocation::ParticipantId;
use crate::error::Result;
use crate::store::models::{CounterRecord, ImportOutcome, StoredValue};

/// Durable mapping from participant to cumulative reward count.
///
/// The store is the single source of truth for counts. Every mutation is
/// applied to a working copy, persisted as a full snapshot (written to a
/// sibling temp file and renamed over the old one), and only then swapped
/// into memory, so a failed write leaves the prior committed state intact
/// both on disk and in memory.
pub struct CounterStore {
    path: PathBuf,
    records: HashMap<ParticipantId, CounterRecord>,
}

impl CounterStore {
    /// Open the store at `path`, loading an existing snapshot in either the
    /// legacy bare-integer or the structured form. A missing file starts
    /// the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            Self::load(&path)?
        } else {
            HashMap::new()
        };
        debug!(
            "counter store opened at {} with {} records",
            path.display(),
            records.len()
        );
        Ok(Self { path, records })
    }

    fn load(path: &Path) -> Result<HashMap<ParticipantId, CounterRecord>> {
        let raw = fs::read_to_string(path)?;
        let stored: HashMap<String, StoredValue> = serde_json::from_str(&raw)?;

        let mut records = HashMap::with_capacity(stored.len());
        for (key, value) in stored {
            match key.parse::<u64>() {
                Ok(id) => {
                    records.insert(ParticipantId(id), CounterRecord::from(value));
                }
                Err(_) => {
                    warn!("skipping snapshot entry with non-numeric key {:?}", key);
                }
            }
        }
        Ok(records)
    }

    /// Current count for a participant; unknown participants are 0.
    pub fn get(&self, id: ParticipantId) -> u64 {
        self.records.get(&id).map(|r| r.count).unwrap_or(0)
    }

    pub fn record(&self, id: ParticipantId) -> Option<&CounterRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add 1 to every listed participant, creating records on demand, and
    /// persist the result atomically.
    pub fn increment_all(&mut self, ids: &[ParticipantId]) -> Result<()> {
        let unique: HashSet<ParticipantId> = ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut next = self.records.clone();
        for id in &unique {
            next.entry(*id).or_insert_with(CounterRecord::new).award(now);
        }

        self.persist(&next)?;
        self.records = next;
        debug!("incremented {} participants", unique.len());
        Ok(())
    }

    /// Drop every record. Idempotent.
    pub fn reset_all(&mut self) -> Result<()> {
        let empty = HashMap::new();
        self.persist(&empty)?;
        self.records = empty;
        Ok(())
    }

    /// Set counts to exactly the imported values for every label the
    /// resolver can match; unmatched labels are tallied as skipped.
    /// Overwrites, never adds. `last_awarded` is left untouched.
    pub fn import_overwrite<F>(
        &mut self,
        entries: &[(String, u64)],
        resolve: F,
    ) -> Result<ImportOutcome>
    where
        F: Fn(&str) -> Option<ParticipantId>,
    {
        let mut next = self.records.clone();
        let mut outcome = ImportOutcome::default();

        for (label, count) in entries {
            match resolve(label) {
                Some(id) => {
                    next.entry(id).or_insert_with(CounterRecord::new).count = *count;
                    outcome.updated += 1;
                }
                None => {
                    debug!("import: no eligible participant matches {:?}", label);
                    outcome.skipped += 1;
                }
            }
        }

        if outcome.updated > 0 {
            self.persist(&next)?;
            self.records = next;
        }
        Ok(outcome)
    }

    fn persist(&self, records: &HashMap<ParticipantId, CounterRecord>) -> Result<()> {
        let snapshot: HashMap<String, &CounterRecord> = records
            .iter()
            .map(|(id, record)| (id.to_string(), record))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        // Full snapshot to a temp file, then an atomic rename over the old
        // one. A crash mid-write leaves the prior snapshot authoritative.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
