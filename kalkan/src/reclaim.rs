//! Memory reclamation: retired-list bookkeeping and the scan.
//!
//! - `ReclaimPool::retire`: pushes an entry, scans once the pending count
//!   crosses twice the number of hazard slots
//! - `ReclaimPool::scan`: detaches every pending entry, snapshots the slots
//!   once, frees what no slot announces and requeues the rest
//! - `HazardSnapshot`: the set of announced addresses seen by one scan

use crate::atomic::AtomicCell;
use crate::retired::RetiredEntry;
use crate::slot::ResourcePool;
use crate::stack::{AppendOnlyStack, StackNode};
use core::marker::PhantomData;
use core::ptr;
use foldhash::fast::FixedState;
use std::collections::HashSet;

/// Addresses announced by hazard slots at the time of one scan.
///
/// The snapshot may be stale as soon as it is built. That is fine: a pointer
/// announced after the snapshot was taken cannot be one of the retired
/// entries, since those were already unreachable when they were retired.
pub(crate) struct HazardSnapshot<T> {
    addrs: HashSet<usize, FixedState>,
    _marker: PhantomData<*mut T>,
}

impl<T> HazardSnapshot<T> {
    pub(crate) fn new() -> Self {
        Self {
            addrs: HashSet::with_hasher(FixedState::default()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn insert(&mut self, ptr: *mut T) {
        self.addrs.insert(ptr as usize);
    }

    #[inline]
    pub(crate) fn contains(&self, ptr: *mut T) -> bool {
        self.addrs.contains(&(ptr as usize))
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.addrs.len()
    }
}

/// Outcome of one reclamation scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scan {
    pub(crate) freed: usize,
    pub(crate) kept: usize,
}

/// Retired entries that have not been freed yet.
pub(crate) struct ReclaimPool<T> {
    retired: AppendOnlyStack<RetiredEntry<T>>,
    pending: AtomicCell<usize>,
    reclaimed: AtomicCell<usize>,
}

impl<T> ReclaimPool<T> {
    pub(crate) fn new() -> Self {
        Self {
            retired: AppendOnlyStack::new(),
            pending: AtomicCell::new(0),
            reclaimed: AtomicCell::new(0),
        }
    }

    /// Queue `entry` and scan if enough entries have piled up.
    pub(crate) fn retire(&self, entry: RetiredEntry<T>, resources: &ResourcePool<T>) {
        let threshold = Self::threshold(resources);
        if self.push(entry) <= threshold {
            return;
        }
        if self.drain_exceeds(threshold) {
            self.scan(resources);
        }
    }

    /// Scan regardless of the pending count.
    pub(crate) fn force_scan(&self, resources: &ResourcePool<T>) -> Scan {
        self.pending.swap_relaxed(0);
        self.scan(resources)
    }

    /// Approximate number of entries waiting to be freed.
    #[inline]
    pub(crate) fn pending(&self) -> usize {
        self.pending.load_relaxed()
    }

    /// Entries freed by scans so far.
    #[inline]
    pub(crate) fn reclaimed(&self) -> usize {
        self.reclaimed.load_relaxed()
    }

    #[inline]
    fn threshold(resources: &ResourcePool<T>) -> usize {
        let slots = resources.size();
        slots + slots
    }

    /// Returns the pending count observed before this push.
    fn push(&self, entry: RetiredEntry<T>) -> usize {
        self.retired.push(entry);
        self.pending.fetch_add_relaxed(1)
    }

    /// Claim the whole pending count. If it still exceeds `threshold`, the
    /// caller owns the next scan; otherwise the count is handed back.
    fn drain_exceeds(&self, threshold: usize) -> bool {
        let pending = self.pending.swap_relaxed(0);
        if pending > threshold {
            return true;
        }
        self.pending.fetch_add_relaxed(pending);
        false
    }

    fn scan(&self, resources: &ResourcePool<T>) -> Scan {
        let mut current = self.retired.take_all();
        if current.is_null() {
            return Scan::default();
        }
        let hazards = resources.snapshot();

        let mut kept_head: *mut StackNode<RetiredEntry<T>> = ptr::null_mut();
        let mut kept_tail: *mut StackNode<RetiredEntry<T>> = ptr::null_mut();
        let mut outcome = Scan::default();

        while !current.is_null() {
            // SAFETY: take_all made us the only owner of the detached list,
            // and nobody traverses the retired list.
            unsafe {
                let next = (*current).next();
                if hazards.contains((*current).value().addr()) {
                    StackNode::set_next(current, kept_head);
                    if kept_tail.is_null() {
                        kept_tail = current;
                    }
                    kept_head = current;
                    outcome.kept += 1;
                } else {
                    drop(StackNode::into_value(current));
                    outcome.freed += 1;
                }
                current = next;
            }
        }

        if !kept_head.is_null() {
            // SAFETY: kept_head reaches kept_tail, all nodes owned by us
            unsafe { self.retired.push_chain(kept_head, kept_tail) };
            self.pending.fetch_add_relaxed(outcome.kept);
        }
        self.reclaimed.fetch_add_relaxed(outcome.freed);

        log::trace!(
            "reclaim scan: freed {}, kept {} ({} hazards announced)",
            outcome.freed,
            outcome.kept,
            hazards.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use core::ptr::NonNull;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn entry(drops: &Arc<AtomicUsize>) -> (RetiredEntry<Tracked>, *mut Tracked) {
        let raw = Box::into_raw(Box::new(Tracked(drops.clone())));
        let entry = unsafe { RetiredEntry::new(NonNull::new_unchecked(raw)) };
        (entry, raw)
    }

    #[test]
    fn scan_keeps_only_announced_entries() {
        let drops = Arc::new(AtomicUsize::new(0));
        let resources = ResourcePool::new(0);
        let pool = ReclaimPool::new();

        let (first, first_raw) = entry(&drops);
        let (second, _) = entry(&drops);
        pool.push(first);
        pool.push(second);

        let slot = resources.acquire();
        slot.announce(first_raw);

        assert_eq!(pool.force_scan(&resources), Scan { freed: 1, kept: 1 });
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(pool.pending(), 1);

        slot.clear();
        assert_eq!(pool.force_scan(&resources), Scan { freed: 1, kept: 0 });
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        assert_eq!(pool.pending(), 0);
        assert_eq!(pool.reclaimed(), 2);
    }

    #[test]
    fn retire_scans_past_twice_the_slot_count() {
        let drops = Arc::new(AtomicUsize::new(0));
        let resources = ResourcePool::new(1);
        let pool = ReclaimPool::new();

        // threshold = 2; the push that observes 3 pending triggers the scan
        for _ in 0..3 {
            pool.retire(entry(&drops).0, &resources);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(pool.pending(), 3);

        pool.retire(entry(&drops).0, &resources);
        assert_eq!(drops.load(Ordering::SeqCst), 4);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn dropping_the_pool_frees_pending_entries() {
        let drops = Arc::new(AtomicUsize::new(0));
        let pool = ReclaimPool::new();
        for _ in 0..5 {
            pool.push(entry(&drops).0);
        }
        drop(pool);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }
}
