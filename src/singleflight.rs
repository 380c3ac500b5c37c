//! Single-flight registry (C4).
//!
//! One mutual-exclusion primitive per named list, used to suppress
//! thundering-herd refreshes of a cold list. Locks are created once at
//! service construction and never garbage-collected (spec §4.4): there
//! are exactly as many locks as there are list kinds.

use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::types::ListKind;

/// Per-list mutex registry. Holding the guard for a list serialises
/// refreshes of that list only — there is no global lock (spec §4.4).
pub struct SingleFlightRegistry {
    locks: HashMap<ListKind, Mutex<()>>,
}

impl Default for SingleFlightRegistry {
    fn default() -> Self {
        let mut locks = HashMap::new();
        for kind in ListKind::ALL {
            locks.insert(*kind, Mutex::new(()));
        }
        SingleFlightRegistry { locks }
    }
}

impl SingleFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutex for `kind`. Panics if `kind` somehow isn't
    /// registered, which can only happen if `ListKind::ALL` and this
    /// registry's construction have drifted apart.
    pub async fn acquire(&self, kind: ListKind) -> MutexGuard<'_, ()> {
        self.locks
            .get(&kind)
            .expect("every ListKind has a registered single-flight lock")
            .lock()
            .await
    }
}
