//! Hazard pointer domains.
//!
//! A domain pairs a grow-only pool of hazard slots with a pool of retired
//! nodes. Collections own one private domain per node type; there is no
//! global state.

use crate::guard::HazardPointer;
use crate::reclaim::ReclaimPool;
use crate::retired::RetiredEntry;
use crate::slot::ResourcePool;
use core::fmt;
use core::num::NonZeroUsize;
use core::ptr::NonNull;

/// Sizing hints for a [`HazardPointerDomain`].
///
/// `hazard_pointers_per_thread * expected_threads` slots are created up
/// front. This is not a cap: the domain creates more slots whenever every
/// existing one is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Hazard pointers a single operation holds at once.
    pub hazard_pointers_per_thread: usize,
    /// Threads expected to use the domain concurrently.
    pub expected_threads: usize,
}

impl Config {
    /// Creates a configuration expecting as many threads as the machine
    /// can run in parallel.
    pub fn new(hazard_pointers_per_thread: usize) -> Self {
        Self {
            hazard_pointers_per_thread,
            expected_threads: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Sets the number of threads expected to use the domain.
    pub fn expected_threads(mut self, threads: usize) -> Self {
        self.expected_threads = threads;
        self
    }

    /// Number of slots the domain creates at construction.
    pub fn preallocated_slots(&self) -> usize {
        self.hazard_pointers_per_thread
            .saturating_mul(self.expected_threads)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A hazard pointer domain for nodes of type `T`.
///
/// Readers call [`make_hazard_pointer`](Self::make_hazard_pointer) and
/// [`HazardPointer::protect`] before dereferencing a shared node; writers
/// unlink nodes and hand them to [`retire`](Self::retire). A retired node is
/// freed by a later reclamation scan once no hazard pointer of this domain
/// announces its address.
///
/// Scans are amortized: one runs when the number of pending retired nodes
/// exceeds twice the number of hazard slots. There is no upper bound on the
/// pending list if nodes are retired faster than scans can free them.
///
/// # Examples
///
/// ```rust
/// use kalkan::{AtomicCell, HazardPointerDomain};
///
/// let domain = HazardPointerDomain::new(1);
/// let shared = AtomicCell::new(Box::into_raw(Box::new(String::from("old"))));
///
/// let hp = domain.make_hazard_pointer();
/// let old = hp.protect(&shared);
///
/// // A writer swaps in a new value and retires the old one.
/// let prev = shared.swap_acq_rel(Box::into_raw(Box::new(String::from("new"))));
/// unsafe { domain.retire(prev) };
///
/// // Still protected: the reader can keep using it.
/// assert_eq!(unsafe { &*old }, "old");
/// drop(hp);
///
/// assert_eq!(domain.reclaim(), 1);
/// unsafe { drop(Box::from_raw(shared.load_relaxed())) };
/// ```
pub struct HazardPointerDomain<T> {
    resources: ResourcePool<T>,
    reclaim: ReclaimPool<T>,
}

// SAFETY: retired nodes may be freed by any thread using the domain, so `T`
// must be `Send`. Slots only hold addresses.
unsafe impl<T: Send> Send for HazardPointerDomain<T> {}
unsafe impl<T: Send> Sync for HazardPointerDomain<T> {}

impl<T> HazardPointerDomain<T> {
    /// Creates a domain sized for `hazard_pointers_per_thread` handles on
    /// each of the machine's hardware threads.
    pub fn new(hazard_pointers_per_thread: usize) -> Self {
        Self::with_config(Config::new(hazard_pointers_per_thread))
    }

    /// Creates a domain from explicit sizing hints.
    pub fn with_config(config: Config) -> Self {
        Self {
            resources: ResourcePool::new(config.preallocated_slots()),
            reclaim: ReclaimPool::new(),
        }
    }

    /// Returns a handle bound to a free slot, creating one if none is free.
    #[inline]
    pub fn make_hazard_pointer(&self) -> HazardPointer<'_, T> {
        HazardPointer::new(self.resources.acquire())
    }

    /// Hands `ptr` over to the domain, to be freed once unprotected.
    ///
    /// May run a reclamation scan on the calling thread. Retiring a null
    /// pointer does nothing.
    ///
    /// # Safety
    ///
    /// - `ptr` must come from `Box::into_raw`.
    /// - `ptr` must no longer be reachable from the shared structure, so no
    ///   new `protect` can return it.
    /// - `ptr` must be retired exactly once, and not freed by anyone else.
    #[inline]
    pub unsafe fn retire(&self, ptr: *mut T) {
        let Some(node) = NonNull::new(ptr) else {
            return;
        };
        // SAFETY: forwarded from the caller's contract
        let entry = unsafe { RetiredEntry::new(node) };
        self.reclaim.retire(entry, &self.resources);
    }

    /// Runs a reclamation scan now, returning how many nodes it freed.
    ///
    /// Nodes still announced by a hazard pointer stay pending.
    pub fn reclaim(&self) -> usize {
        self.reclaim.force_scan(&self.resources).freed
    }

    /// Number of hazard slots created so far. Never decreases.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.resources.size()
    }

    /// Approximate number of retired nodes not freed yet.
    #[inline]
    pub fn pending(&self) -> usize {
        self.reclaim.pending()
    }

    /// Total number of retired nodes freed by scans on this domain.
    ///
    /// Nodes freed when the domain itself is dropped are not counted.
    #[inline]
    pub fn reclaimed(&self) -> usize {
        self.reclaim.reclaimed()
    }
}

impl<T> Default for HazardPointerDomain<T> {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<T> fmt::Debug for HazardPointerDomain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HazardPointerDomain")
            .field("slots", &self.slot_count())
            .field("pending", &self.pending())
            .field("reclaimed", &self.reclaimed())
            .finish()
    }
}
