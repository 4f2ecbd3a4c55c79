// backend.rs — StateBackend trait and the local file implementation.
//
// The StateBackend trait is the transactional seam around live state:
// lock, read, write-with-lock, unlock. Callers never touch the snapshot
// file directly, which is what keeps N applies of the same desired state
// convergent instead of corrupting.
//
// LocalFileBackend keeps the snapshot in `state.json` and the lock in a
// `state.lock` sidecar. The lock file is created with `create_new`, which
// the OS guarantees is atomic: exactly one of two racing creators wins,
// the loser fails fast with the holder's identity.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StateError;
use crate::snapshot::StateSnapshot;

/// Proof of lock ownership, returned by `lock` and demanded by `write`
/// and `unlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLock {
    /// Random token for this acquisition.
    pub lock_id: Uuid,
    /// Who took the lock (e.g., "plan", "apply", a pipeline run id).
    pub owner: String,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
}

/// Transactional access to versioned live state.
///
/// The trait lets the reconciler run against any store — the local file
/// backend here, an in-memory one in tests, a remote one later — without
/// changing the plan/apply logic.
pub trait StateBackend {
    /// Take the exclusive lock. Fails fast with [`StateError::LockHeld`]
    /// when another holder exists; never blocks.
    fn lock(&mut self, owner: &str) -> Result<StateLock, StateError>;

    /// Read the current snapshot. A store that has never been written
    /// reads as the empty serial-0 snapshot.
    fn read(&self) -> Result<StateSnapshot, StateError>;

    /// Write the successor snapshot. Requires the live lock token and a
    /// serial exactly one past the stored serial.
    fn write(&mut self, lock: &StateLock, snapshot: &StateSnapshot) -> Result<(), StateError>;

    /// Release the lock.
    fn unlock(&mut self, lock: StateLock) -> Result<(), StateError>;
}

/// File-backed StateBackend: `state.json` plus a `state.lock` sidecar.
pub struct LocalFileBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalFileBackend {
    /// Create a backend rooted at the given state file path. The lock
    /// sidecar lives next to it. Parent directories are created.
    pub fn new(state_path: impl AsRef<Path>) -> Result<Self, StateError> {
        let state_path = state_path.as_ref().to_path_buf();
        if let Some(parent) = state_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let lock_path = state_path.with_extension("lock");
        Ok(Self {
            state_path,
            lock_path,
        })
    }

    /// Remove the lock file regardless of holder. For operator recovery
    /// after a crashed run; normal flows release through `unlock`.
    pub fn break_lock(&mut self) -> Result<(), StateError> {
        if !self.lock_path.exists() {
            return Err(StateError::NotLocked {
                path: self.lock_path.clone(),
            });
        }
        fs::remove_file(&self.lock_path).map_err(|source| StateError::Io {
            path: self.lock_path.clone(),
            source,
        })?;
        info!(path = %self.lock_path.display(), "state lock forcibly removed");
        Ok(())
    }

    fn read_lock_file(&self) -> Result<StateLock, StateError> {
        let json = fs::read_to_string(&self.lock_path).map_err(|source| StateError::Io {
            path: self.lock_path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Check that the caller's token matches the lock on disk.
    fn verify_lock(&self, lock: &StateLock) -> Result<(), StateError> {
        if !self.lock_path.exists() {
            return Err(StateError::NotLocked {
                path: self.lock_path.clone(),
            });
        }
        let on_disk = self.read_lock_file()?;
        if on_disk.lock_id != lock.lock_id {
            return Err(StateError::LockMismatch {
                on_disk: on_disk.lock_id.to_string(),
                presented: lock.lock_id.to_string(),
            });
        }
        Ok(())
    }
}

impl StateBackend for LocalFileBackend {
    fn lock(&mut self, owner: &str) -> Result<StateLock, StateError> {
        let lock = StateLock {
            lock_id: Uuid::new_v4(),
            owner: owner.to_string(),
            acquired_at: Utc::now(),
        };

        // create_new is the atomicity point: the OS rejects the second
        // creator, so two racing runs serialize here.
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = self.read_lock_file()?;
                return Err(StateError::LockHeld {
                    holder: holder.owner,
                    since: holder.acquired_at.to_rfc3339(),
                });
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.lock_path.clone(),
                    source,
                })
            }
        };

        let json = serde_json::to_string_pretty(&lock)?;
        file.write_all(json.as_bytes())
            .map_err(|source| StateError::Io {
                path: self.lock_path.clone(),
                source,
            })?;

        debug!(owner, lock_id = %lock.lock_id, "state lock acquired");
        Ok(lock)
    }

    fn read(&self) -> Result<StateSnapshot, StateError> {
        if !self.state_path.exists() {
            return Ok(StateSnapshot::empty());
        }
        let json = fs::read_to_string(&self.state_path).map_err(|source| StateError::Io {
            path: self.state_path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write(&mut self, lock: &StateLock, snapshot: &StateSnapshot) -> Result<(), StateError> {
        self.verify_lock(lock)?;

        // Compare-and-swap on the serial: a write computed against any
        // other serial is stale and must be rediffed. A never-written
        // store reads as serial 0.
        let current = self.read()?;
        if snapshot.serial != current.serial + 1 {
            return Err(StateError::StaleSnapshot {
                expected: current.serial + 1,
                actual: snapshot.serial,
            });
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.state_path, json).map_err(|source| StateError::Io {
            path: self.state_path.clone(),
            source,
        })?;

        info!(
            serial = snapshot.serial,
            lineage = %snapshot.lineage,
            "state snapshot written"
        );
        Ok(())
    }

    fn unlock(&mut self, lock: StateLock) -> Result<(), StateError> {
        self.verify_lock(&lock)?;
        fs::remove_file(&self.lock_path).map_err(|source| StateError::Io {
            path: self.lock_path.clone(),
            source,
        })?;
        debug!(lock_id = %lock.lock_id, "state lock released");
        Ok(())
    }
}
