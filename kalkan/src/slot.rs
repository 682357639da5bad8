//! Hazard slots and the grow-only pool that owns them.
//!
//! Each slot announces at most one pointer. A slot is owned by at most one
//! [`HazardPointer`](crate::HazardPointer) at a time (tracked by a TTAS
//! flag), but its announced pointer can be read by any thread scanning the
//! domain. Slots are never freed before their domain: the pool only grows.

use crate::atomic::AtomicCell;
use crate::reclaim::HazardSnapshot;
use crate::stack::AppendOnlyStack;
use crate::ttas::TTas;
use core::ptr;
use core::sync::atomic::{Ordering, fence};

/// One hazard slot: the announced pointer plus its ownership flag.
///
/// Aligned to its own cache line so that announcing threads do not
/// false-share with each other.
#[repr(align(128))]
pub(crate) struct Slot<T> {
    hazard: AtomicCell<*mut T>,
    owner: TTas,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            hazard: AtomicCell::null(),
            owner: TTas::new(),
        }
    }

    fn new_held() -> Self {
        Self {
            hazard: AtomicCell::null(),
            owner: TTas::held(),
        }
    }

    #[inline]
    pub(crate) fn try_acquire(&self) -> bool {
        self.owner.try_acquire()
    }

    #[inline]
    pub(crate) fn release(&self) {
        self.owner.release();
    }

    /// Publish `ptr` as in use. Only the owner may call this.
    #[inline]
    pub(crate) fn announce(&self, ptr: *mut T) {
        self.hazard.store_release(ptr);
    }

    /// Withdraw the announcement. Only the owner may call this.
    #[inline]
    pub(crate) fn clear(&self) {
        self.hazard.store_release(ptr::null_mut());
    }

    /// The currently announced pointer, from any thread.
    #[inline]
    pub(crate) fn announced(&self) -> *mut T {
        self.hazard.load_acquire()
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        self.owner.is_held()
    }
}

/// Grow-only registry of hazard slots.
pub(crate) struct ResourcePool<T> {
    slots: AppendOnlyStack<Slot<T>>,
    size: AtomicCell<usize>,
}

impl<T> ResourcePool<T> {
    /// Create a pool with `preallocated` free slots.
    pub(crate) fn new(preallocated: usize) -> Self {
        let pool = Self {
            slots: AppendOnlyStack::new(),
            size: AtomicCell::new(0),
        };
        for _ in 0..preallocated {
            pool.slots.push(Slot::new());
            pool.size.fetch_add_relaxed(1);
        }
        pool
    }

    /// Take ownership of a free slot, growing the pool if every slot is held.
    pub(crate) fn acquire(&self) -> &Slot<T> {
        if let Some(slot) = self.slots.iter().find(|slot| slot.try_acquire()) {
            return slot;
        }

        // Every slot is held: append one that is born held, so no other
        // thread can grab it between the push and our return.
        let size = self.size.fetch_add_relaxed(1) + 1;
        log::debug!("hazard slot pool grew to {size} slots");
        self.slots.push(Slot::new_held())
    }

    /// Collect every non-null announced pointer.
    pub(crate) fn snapshot(&self) -> HazardSnapshot<T> {
        // Pairs with the fence in `HazardPointer::protect`: either this scan
        // sees the announcement, or the protecting thread sees the unlink.
        fence(Ordering::SeqCst);

        let mut snapshot = HazardSnapshot::new();
        for slot in self.slots.iter() {
            let ptr = slot.announced();
            if !ptr.is_null() {
                snapshot.insert(ptr);
            }
        }
        snapshot
    }

    /// Number of slots ever created. Never decreases.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size.load_relaxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preallocated_slots_are_reused_before_growing() {
        let pool: ResourcePool<u32> = ResourcePool::new(2);
        assert_eq!(pool.size(), 2);

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.size(), 2);
        assert!(a.is_held() && b.is_held());

        let c = pool.acquire();
        assert_eq!(pool.size(), 3);
        assert!(c.is_held());

        b.release();
        let d = pool.acquire();
        assert!(ptr::eq(b, d));
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn snapshot_skips_cleared_slots() {
        let pool: ResourcePool<u32> = ResourcePool::new(0);
        let mut x = 1u32;
        let mut y = 2u32;

        let a = pool.acquire();
        let b = pool.acquire();
        a.announce(&mut x);
        b.announce(&mut y);
        b.clear();

        let snapshot = pool.snapshot();
        assert!(snapshot.contains(&mut x));
        assert!(!snapshot.contains(&mut y));
        assert_eq!(snapshot.len(), 1);
    }
}
