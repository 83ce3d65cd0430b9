//! Operation registry: maps operation ids to cancel handles.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::coordinator::CancelHandle;

/// Opaque id of a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Live operations that can still be cancelled.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<OperationId, CancelHandle>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<OperationId, CancelHandle>> {
        // entries are plain handles, so a poisoned map is still consistent
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track `cancel` under a new id.
    pub fn register(&self, cancel: CancelHandle) -> OperationId {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.live().insert(id, cancel);
        id
    }

    /// Forget a settled operation.
    pub fn remove(&self, id: OperationId) {
        self.live().remove(&id);
    }

    /// Cancel a live operation. Unknown or settled ids return `false`.
    pub fn cancel(&self, id: OperationId) -> bool {
        let handle = self.live().get(&id).cloned();
        match handle {
            Some(handle) => {
                let first = handle.cancel();
                tracing::info!(%id, first, "Cancellation requested");
                true
            }
            None => {
                tracing::debug!(%id, "Cancel for unknown operation ignored");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live().is_empty()
    }
}
