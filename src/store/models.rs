use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative reward state for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_awarded: Option<DateTime<Utc>>,
}

impl CounterRecord {
    pub fn new() -> Self {
        Self {
            count: 0,
            last_awarded: None,
        }
    }

    pub fn award(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.last_awarded = Some(at);
    }
}

impl Default for CounterRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable snapshot value. Legacy snapshots stored a bare integer per
/// participant; current snapshots store the structured record. Both forms
/// load, only the structured form is written.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Record(CounterRecord),
    Bare(u64),
}

impl From<StoredValue> for CounterRecord {
    fn from(value: StoredValue) -> Self {
        match value {
            StoredValue::Record(record) => record,
            StoredValue::Bare(count) => CounterRecord {
                count,
                last_awarded: None,
            },
        }
    }
}

/// Tally of an import run. Skipped covers unmatched labels and malformed
/// lines; neither aborts the import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub updated: usize,
    pub skipped: usize,
}

/// Parse `"label: count"` lines. Returns the well-formed pairs plus the
/// number of malformed lines. Blank lines are ignored; a line without a
/// separator or with a non-integer count is malformed.
pub fn parse_import_lines(text: &str) -> (Vec<(String, u64)>, usize) {
    let mut entries = Vec::new();
    let mut malformed = 0;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.rsplit_once(':') {
            Some((label, raw_count)) if !label.trim().is_empty() => {
                match raw_count.trim().parse::<u64>() {
                    Ok(count) => entries.push((label.trim().to_string(), count)),
                    Err(_) => malformed += 1,
                }
            }
            _ => malformed += 1,
        }
    }

    (entries, malformed)
}
