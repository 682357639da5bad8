//! TTAS (Test-Test-And-Set) ownership flag for hazard slots.

use crate::atomic::AtomicCell;

/// A TTAS flag. Unlike a spin lock it never waits: callers that fail to
/// take it move on to the next slot.
pub(crate) struct TTas {
    acquired: AtomicCell<bool>,
}

impl TTas {
    /// Create an unheld flag.
    pub(crate) fn new() -> Self {
        Self {
            acquired: AtomicCell::new(false),
        }
    }

    /// Create a flag that is already held by the caller.
    pub(crate) fn held() -> Self {
        Self {
            acquired: AtomicCell::new(true),
        }
    }

    /// Try to take the flag without waiting.
    #[inline]
    pub(crate) fn try_acquire(&self) -> bool {
        // Test phase: a relaxed load keeps the line shared while it is held
        if self.acquired.load_relaxed() {
            return false;
        }
        // Test-and-set phase
        !self.acquired.swap_acquire(true)
    }

    /// Give the flag back.
    #[inline]
    pub(crate) fn release(&self) {
        self.acquired.store_release(false);
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        self.acquired.load_relaxed()
    }
}
