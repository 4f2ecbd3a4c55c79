// config.rs — Engine configuration.
//
// EngineConfig names where state lives and which scope unscoped resources
// register at. The `for_workdir()` constructor generates the standard
// `.converge/` layout; `load()` reads a TOML file for everything else.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use converge_policy::Scope;

use crate::error::EngineError;

fn default_lock_owner() -> String {
    "converge".to_string()
}

/// Configuration for the reconciliation driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Path to the state snapshot file. The lock sidecar lives next to it.
    pub state_file: PathBuf,

    /// Path to the append-only apply history.
    pub history_file: PathBuf,

    /// Where definitions register and where assignments without an explicit
    /// scope bind.
    pub default_scope: Scope,

    /// Name recorded in the state lock (shows up in lock-contention errors).
    #[serde(default = "default_lock_owner")]
    pub lock_owner: String,
}

impl EngineConfig {
    /// A config with the standard `.converge/` layout under a working
    /// directory.
    pub fn for_workdir(workdir: impl AsRef<Path>, default_scope: Scope) -> Self {
        let converge_dir = workdir.as_ref().join(".converge");
        Self {
            state_file: converge_dir.join("state.json"),
            history_file: converge_dir.join("history.jsonl"),
            default_scope,
            lock_owner: default_lock_owner(),
        }
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| EngineError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
}
