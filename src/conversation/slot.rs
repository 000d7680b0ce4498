//! Single-slot ownership token for in-flight turns

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// At most one turn may hold the slot at a time
#[derive(Debug, Clone, Default)]
pub struct TurnSlot {
    busy: Arc<AtomicBool>,
}

impl TurnSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if another turn holds it
    #[must_use]
    pub fn try_acquire(&self) -> Option<TurnGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TurnGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether a turn is currently in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of a turn; releases the slot when dropped
#[derive(Debug)]
pub struct TurnGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
