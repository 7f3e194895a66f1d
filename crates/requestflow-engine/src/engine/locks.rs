//! Per-request mutual exclusion.
//!
//! A step reads the request, runs a processor and writes the new state.
//! Two approvals racing on the same request must not both see the old
//! approval count, so every step holds its request's lock end to end.
//! Different requests never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

/// Registry of async locks keyed by request id.
#[derive(Clone, Default)]
pub struct RequestLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `request_id`. Released on drop.
    pub async fn lock(&self, request_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut guard = self.inner.lock();
            // Entries only the registry still holds are idle.
            guard.retain(|_, l| Arc::strong_count(l) > 1);
            guard
                .entry(request_id.to_string())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of requests with a live or awaited lock.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|l| Arc::strong_count(l) > 1)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RequestLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLocks")
            .field("active", &self.len())
            .finish()
    }
}
