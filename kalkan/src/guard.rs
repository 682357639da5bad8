//! Hazard pointer handles.
//!
//! Implements the announce/validate protocol:
//! - Protect: announce the observed pointer, re-read the source, retry until
//!   both reads agree
//! - Unprotect: clear the announcement
//! - Drop: clear the announcement and hand the slot back to the pool

use crate::atomic::AtomicCell;
use crate::slot::Slot;
use core::fmt;
use core::sync::atomic::{Ordering, fence};

/// RAII handle owning one hazard slot of a [`HazardPointerDomain`].
///
/// While a `HazardPointer` announces a pointer, the domain will not free the
/// node at that address, even if it has been retired. Dropping the handle
/// clears the announcement and makes the slot available to the next
/// [`make_hazard_pointer`] call.
///
/// A handle protects one pointer at a time; algorithms that must keep two
/// nodes alive at once (e.g. a queue head and its successor) take two
/// handles.
///
/// [`HazardPointerDomain`]: crate::HazardPointerDomain
/// [`make_hazard_pointer`]: crate::HazardPointerDomain::make_hazard_pointer
pub struct HazardPointer<'d, T> {
    slot: &'d Slot<T>,
}

impl<'d, T> HazardPointer<'d, T> {
    #[inline]
    pub(crate) fn new(slot: &'d Slot<T>) -> Self {
        Self { slot }
    }

    /// Loads `source` and protects the loaded pointer.
    ///
    /// On return, the pointer is announced and was still the value of
    /// `source` after the announcement became visible, so a node reachable
    /// through it cannot be freed until this handle protects something else,
    /// is unprotected, or is dropped. Returns null (and announces nothing
    /// useful) if `source` holds null.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kalkan::{AtomicCell, HazardPointerDomain};
    ///
    /// let domain = HazardPointerDomain::new(1);
    /// let shared = AtomicCell::new(Box::into_raw(Box::new(7u64)));
    ///
    /// let hp = domain.make_hazard_pointer();
    /// let ptr = hp.protect(&shared);
    /// assert_eq!(unsafe { *ptr }, 7);
    ///
    /// drop(hp);
    /// unsafe { drop(Box::from_raw(shared.load_relaxed())) };
    /// ```
    #[inline]
    pub fn protect(&self, source: &AtomicCell<*mut T>) -> *mut T {
        let mut ptr = source.load_relaxed();
        loop {
            self.slot.announce(ptr);
            // Orders the announcement before the re-read; pairs with the
            // fence a scan issues before reading the slots.
            fence(Ordering::SeqCst);

            let current = source.load_acquire();
            if current == ptr {
                return ptr;
            }
            ptr = current;
        }
    }

    /// Withdraws the current announcement.
    #[inline]
    pub fn unprotect(&self) {
        self.slot.clear();
    }

    /// The pointer this handle currently announces (null if none).
    #[inline]
    pub fn protected(&self) -> *mut T {
        self.slot.announced()
    }
}

impl<T> Drop for HazardPointer<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.unprotect();
        self.slot.release();
    }
}

impl<T> fmt::Debug for HazardPointer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HazardPointer")
            .field("protected", &self.protected())
            .finish()
    }
}
