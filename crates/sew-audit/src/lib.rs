use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for journal event ids (UUID v5).
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_7c2a_95b0_4e3b_a4c8_0f52_e9d1_3a77);

/// What kind of row an entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Party,
    Order,
    Request,
    SubOrder,
    Bid,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Party => "party",
            Topic::Order => "order",
            Topic::Request => "request",
            Topic::SubOrder => "sub_order",
            Topic::Bid => "bid",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only transition journal. Writes JSON Lines (one entry per line).
///
/// With `hash_chain` on, each entry carries `hash_prev` (the previous entry's
/// `hash_self`) and its own `hash_self`, so any edit to a past line breaks
/// verification from that line on.
pub struct Journal {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Number of entries already in the file; the next entry's `seq`.
    seq: u64,
}

impl Journal {
    /// Open `path` for appending, creating parent dirs. An existing file is
    /// resumed: `seq` and the last hash are restored from its final entry.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let mut journal = Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        };

        if journal.path.exists() {
            let content = fs::read_to_string(&journal.path)
                .with_context(|| format!("read journal {:?}", journal.path))?;
            let mut last: Option<JournalEntry> = None;
            for (i, line) in content.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let entry: JournalEntry = serde_json::from_str(trimmed)
                    .with_context(|| format!("parse journal entry at line {}", i + 1))?;
                journal.seq += 1;
                last = Some(entry);
            }
            journal.last_hash = last.and_then(|e| e.hash_self);
        }

        Ok(journal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one entry.
    pub fn append(
        &mut self,
        topic: Topic,
        event_type: &str,
        subject: &str,
        payload: Value,
    ) -> Result<JournalEntry> {
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;

        let mut entry = JournalEntry {
            event_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            topic,
            event_type: event_type.to_string(),
            subject: subject.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            let self_hash = compute_entry_hash(&entry)?;
            entry.hash_self = Some(self_hash);
        }

        let line = canonical_json_line(&entry)?;
        append_line(&self.path, &line)?;

        self.seq += 1;
        if self.hash_chain {
            self.last_hash = entry.hash_self.clone();
        }
        Ok(entry)
    }

    /// Serialize `value` as the payload and append.
    pub fn record<T: Serialize>(
        &mut self,
        topic: Topic,
        event_type: &str,
        subject: impl fmt::Display,
        value: &T,
    ) -> Result<JournalEntry> {
        let payload = serde_json::to_value(value).context("serialize journal payload failed")?;
        self.append(topic, event_type, &subject.to_string(), payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub event_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub topic: Topic,
    pub event_type: String,
    /// Display form of the row the entry is about, e.g. `order#12`.
    pub subject: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Event id from chain position: v5 over previous hash, canonical payload and
/// sequence number. Replaying the same journal yields the same ids.
pub fn derive_event_id(prev_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let canonical = serde_json::to_string(&sort_keys(payload))
        .context("canonicalize payload for event id failed")?;
    let name = format!("{}|{}|{}", prev_hash.unwrap_or("GENESIS"), canonical, seq);
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, name.as_bytes()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write journal line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Sorted keys, compact JSON, one entry per line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize journal entry failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// SHA-256 over the canonical entry with `hash_self` cleared.
pub fn compute_entry_hash(entry: &JournalEntry) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Verify the hash chain of a journal file.
pub fn verify_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read journal {:?}", path.as_ref()))?;
    verify_chain_str(&content)
}

/// Same as [`verify_chain`] over in-memory JSONL.
pub fn verify_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let entry: JournalEntry = match serde_json::from_str(trimmed) {
            Ok(e) => e,
            Err(e) => {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("unparseable entry: {e}"),
                })
            }
        };

        if entry.seq != count as u64 {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!("seq mismatch: expected {}, got {}", count, entry.seq),
            });
        }
        count += 1;

        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed, recomputed
                    ),
                });
            }
        }

        prev_hash = entry.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: count })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// First line (1-based) where the chain no longer holds.
    Broken { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_is_deterministic_and_position_sensitive() {
        let p = json!({"b": 1, "a": 2});
        let reordered = json!({"a": 2, "b": 1});
        let a = derive_event_id(None, &p, 0).unwrap();
        assert_eq!(a, derive_event_id(None, &reordered, 0).unwrap());
        assert_ne!(a, derive_event_id(None, &p, 1).unwrap());
        assert_ne!(a, derive_event_id(Some("abc"), &p, 0).unwrap());
    }

    #[test]
    fn canonical_line_sorts_nested_keys() {
        let line = canonical_json_line(&json!({"z": {"y": 1, "x": 2}, "a": [ {"d": 0, "c": 1} ]}))
            .unwrap();
        assert_eq!(line, r#"{"a":[{"c":1,"d":0}],"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn garbage_line_reports_broken_not_error() {
        let res = verify_chain_str("not json\n").unwrap();
        assert!(matches!(res, VerifyResult::Broken { line: 1, .. }));
    }
}
