// history.rs — Append-only JSONL apply history.
//
// Every successful apply appends one entry: which plan ran, which serial it
// produced, and a hash of the resulting resources. Each entry is linked to
// the previous one via `previous_hash`, forming a hash chain — inserting,
// deleting, or rewriting an entry breaks the chain and is detectable with
// `verify_chain`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::StateError;
use crate::snapshot::StateSnapshot;

/// One applied version of the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The serial this apply produced.
    pub serial: u64,

    /// The plan that produced it.
    pub plan_id: Uuid,

    /// When the apply finished.
    pub applied_at: DateTime<Utc>,

    /// Definition / assignment counts after the apply.
    pub definitions: usize,
    pub assignments: usize,

    /// SHA-256 over the applied resources.
    pub snapshot_hash: String,

    /// Hash of the previous entry's JSON line (None for the first entry).
    pub previous_hash: Option<String>,
}

impl HistoryEntry {
    /// Build an entry for an applied snapshot. `previous_hash` is filled
    /// in by the log on append.
    pub fn for_apply(snapshot: &StateSnapshot, plan_id: Uuid) -> Self {
        Self {
            serial: snapshot.serial,
            plan_id,
            applied_at: Utc::now(),
            definitions: snapshot.resources.definitions.len(),
            assignments: snapshot.resources.assignments.len(),
            snapshot_hash: snapshot.content_hash(),
            previous_hash: None,
        }
    }
}

/// An append-only apply history backed by a JSONL file.
pub struct HistoryLog {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written — chains the next entry.
    last_hash: Option<String>,
}

impl HistoryLog {
    /// Open (or create) a history log at the given path.
    ///
    /// If the file already exists, the last line is hashed so new entries
    /// chain onto the existing tail.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        // Append mode — existing entries are never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StateError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
        })
    }

    /// Append an entry, chaining it to the previous one, and flush.
    pub fn append(&mut self, entry: &mut HistoryEntry) -> Result<(), StateError> {
        entry.previous_hash = self.last_hash.clone();

        let json = serde_json::to_string(entry)?;
        self.last_hash = Some(hash_line(&json));

        writeln!(self.writer, "{}", json).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.writer.flush().map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Read all entries, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<HistoryEntry>, StateError> {
        let file = File::open(path.as_ref()).map_err(|source| StateError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|source| StateError::Io {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Verify the hash chain of a history file.
    ///
    /// Returns `Ok(())` when every entry's `previous_hash` matches the hash
    /// of the preceding line, or [`StateError::HistoryIntegrity`] at the
    /// first break.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<(), StateError> {
        let file = File::open(path.as_ref()).map_err(|source| StateError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut previous_hash: Option<String> = None;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| StateError::Io {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: HistoryEntry = serde_json::from_str(&line)?;
            if entry.previous_hash != previous_hash {
                return Err(StateError::HistoryIntegrity {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }

            // Hash the raw line, not a re-serialization — field order must
            // not affect the chain.
            previous_hash = Some(hash_line(&line));
        }
        Ok(())
    }

    /// The path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_last_hash(path: &Path) -> Result<Option<String>, StateError> {
        let file = File::open(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut last_line: Option<String> = None;

        for line in reader.lines() {
            let line = line.map_err(|source| StateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        Ok(last_line.map(|line| hash_line(&line)))
    }
}

/// Lowercase hex SHA-256 of one JSONL line.
fn hash_line(line: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    format!("{:x}", hasher.finalize())
}
