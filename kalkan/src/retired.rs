//! Retired entries awaiting reclamation.

use alloc::boxed::Box;
use core::ptr::NonNull;

/// Ownership of one retired heap node.
///
/// Once a node is retired, the collection that unlinked it no longer owns
/// it; the entry does. Dropping the entry frees the node, so the only way a
/// node gets freed is by the reclaim pool dropping its entry after a scan
/// proved no hazard slot announces it (or when the domain itself is dropped).
pub(crate) struct RetiredEntry<T> {
    node: NonNull<T>,
}

impl<T> RetiredEntry<T> {
    /// Take ownership of `node`.
    ///
    /// # Safety
    ///
    /// `node` must come from `Box::into_raw`, must already be unreachable
    /// from the shared structure, and must not be retired twice.
    #[inline]
    pub(crate) unsafe fn new(node: NonNull<T>) -> Self {
        Self { node }
    }

    /// Address of the retired node, as compared against hazard announcements.
    #[inline]
    pub(crate) fn addr(&self) -> *mut T {
        self.node.as_ptr()
    }
}

impl<T> Drop for RetiredEntry<T> {
    fn drop(&mut self) {
        // SAFETY: allocated via Box::into_raw and owned exclusively by this entry
        unsafe { drop(Box::from_raw(self.node.as_ptr())) };
    }
}

// SAFETY: the entry is the sole owner of its node; moving it between threads
// moves the node.
unsafe impl<T: Send> Send for RetiredEntry<T> {}
// SAFETY: shared access only exposes the address, never the node.
unsafe impl<T: Send> Sync for RetiredEntry<T> {}
