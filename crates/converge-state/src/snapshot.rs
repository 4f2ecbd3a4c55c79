// snapshot.rs — The versioned live-state snapshot.
//
// A StateSnapshot is the single source of truth for what is live. The
// serial counts successful applies; the lineage ties every serial of one
// state's life together so snapshots from different stores are never
// confused for revisions of each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use converge_plan::ResourceSet;

/// One version of the live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Identity of this state's whole life, stable across serials.
    pub lineage: Uuid,

    /// Number of successful applies. Serial 0 is the empty pre-first-apply
    /// state.
    pub serial: u64,

    /// When this serial was written.
    pub updated_at: DateTime<Utc>,

    /// The live resources.
    pub resources: ResourceSet,
}

impl StateSnapshot {
    /// A fresh, empty state at serial 0.
    pub fn empty() -> Self {
        Self {
            lineage: Uuid::new_v4(),
            serial: 0,
            updated_at: Utc::now(),
            resources: ResourceSet::default(),
        }
    }

    /// The successor snapshot: same lineage, serial + 1, new resources.
    pub fn next(&self, resources: ResourceSet) -> Self {
        Self {
            lineage: self.lineage,
            serial: self.serial + 1,
            updated_at: Utc::now(),
            resources,
        }
    }

    /// SHA-256 over the serialized resources, used by the history log.
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(&self.resources).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
