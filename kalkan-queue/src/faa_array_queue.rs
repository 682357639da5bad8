use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;

use crate::ConcurrentContainer;
use crate::utils::CacheAligned;
use crossbeam_utils::Backoff;
use kalkan::{AtomicCell, Config, HazardPointerDomain};

/// Number of slots per segment used by [`FaaArrayQueue::new`].
pub const DEFAULT_SEGMENT_CAPACITY: usize = 4096;

/// Slot state: no value yet, the producer owning the index may still write.
const SLOT_EMPTY: usize = 0;
/// Slot state: holds a published value.
const SLOT_FILLED: usize = 1;
/// Slot state: claimed by a consumer. Terminal.
const SLOT_TAKEN: usize = 2;

struct Slot<T> {
    state: AtomicCell<usize>,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Slot {
            state: AtomicCell::new(SLOT_EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

struct Segment<T> {
    id: usize,
    enqueue: CacheAligned<AtomicCell<usize>>,
    dequeue: CacheAligned<AtomicCell<usize>>,
    next: AtomicCell<*mut Segment<T>>,
    slots: Box<[Slot<T>]>,
}

impl<T> Segment<T> {
    fn boxed(id: usize, capacity: usize) -> *mut Self {
        Box::into_raw(Box::new(Segment {
            id,
            enqueue: CacheAligned::new(AtomicCell::new(0)),
            dequeue: CacheAligned::new(AtomicCell::new(0)),
            next: AtomicCell::null(),
            slots: (0..capacity).map(|_| Slot::empty()).collect(),
        }))
    }

    /// A segment whose first slot already holds `value`.
    fn seeded(id: usize, capacity: usize, value: T) -> *mut Self {
        let segment = Self::boxed(id, capacity);
        // SAFETY: not published yet
        unsafe {
            let first = &(*segment).slots[0];
            first.value.get().write(MaybeUninit::new(value));
            first.state.store_relaxed(SLOT_FILLED);
            (*segment).enqueue.store_relaxed(1);
        }
        segment
    }

    /// Frees a seeded segment that lost the link race, handing back its value.
    ///
    /// # Safety
    ///
    /// `segment` must come from [`Segment::seeded`] and never have been published.
    unsafe fn unseed(segment: *mut Self) -> T {
        let segment = unsafe { Box::from_raw(segment) };
        unsafe { (*segment.slots[0].value.get()).assume_init_read() }
    }

    fn is_drained(&self) -> bool {
        self.dequeue.load_acquire() >= self.enqueue.load_acquire()
    }
}

/// Unbounded MPMC FIFO queue of fixed-capacity segments.
///
/// Producers and consumers reserve slot indices with a fetch-and-add on the
/// segment's enqueue/dequeue counters, so contention on the same segment
/// turns into distinct slots instead of CAS retries. A consumer that reaches
/// an index before its producer marks the slot taken; the producer then
/// retries at a fresh index.
///
/// When the tail segment fills up, a producer links a new segment whose first
/// slot already holds its value. Exhausted head segments are retired through
/// the queue's hazard pointer domain.
pub struct FaaArrayQueue<T> {
    head: CacheAligned<AtomicCell<*mut Segment<T>>>,
    tail: CacheAligned<AtomicCell<*mut Segment<T>>>,
    capacity: usize,
    domain: HazardPointerDomain<Segment<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for FaaArrayQueue<T> {}
unsafe impl<T: Send> Sync for FaaArrayQueue<T> {}

impl<T> Default for FaaArrayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FaaArrayQueue<T> {
    /// Creates an empty queue with [`DEFAULT_SEGMENT_CAPACITY`] slots per segment.
    pub fn new() -> Self {
        Self::with_segment_capacity(DEFAULT_SEGMENT_CAPACITY)
    }

    /// Creates an empty queue with `capacity` slots per segment.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_segment_capacity(capacity: usize) -> Self {
        Self::with_domain(capacity, Config::new(1))
    }

    /// Like [`with_segment_capacity`](Self::with_segment_capacity), also
    /// pre-allocating one hazard slot for each of `threads` threads.
    pub fn with_expected_threads(capacity: usize, threads: usize) -> Self {
        Self::with_domain(capacity, Config::new(1).expected_threads(threads))
    }

    fn with_domain(capacity: usize, config: Config) -> Self {
        assert!(capacity > 0, "segment capacity must be non-zero");

        let segment = Segment::boxed(0, capacity);
        FaaArrayQueue {
            head: CacheAligned::new(AtomicCell::new(segment)),
            tail: CacheAligned::new(AtomicCell::new(segment)),
            capacity,
            domain: HazardPointerDomain::with_config(config),
            _marker: PhantomData,
        }
    }

    /// Slots per segment.
    pub fn segment_capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes an element to the back of the queue.
    pub fn push(&self, mut value: T) {
        let backoff = Backoff::new();
        let hp = self.domain.make_hazard_pointer();

        loop {
            let tail = hp.protect(&self.tail);
            // SAFETY: `tail` is protected and never null
            let segment = unsafe { &*tail };
            let index = segment.enqueue.fetch_add_relaxed(1);

            if index < self.capacity {
                let slot = &segment.slots[index];
                // SAFETY: the index was granted to this call only, and no
                // consumer reads the value before observing SLOT_FILLED.
                unsafe { slot.value.get().write(MaybeUninit::new(value)) };
                if slot.state.cas_strong_release(SLOT_EMPTY, SLOT_FILLED).is_ok() {
                    return;
                }
                // A consumer burnt this index first; take the value back
                value = unsafe { (*slot.value.get()).assume_init_read() };
                continue;
            }

            // Segment is full
            if self.tail.load_acquire() != tail {
                continue;
            }

            let next = segment.next.load_acquire();
            if !next.is_null() {
                let _ = self.tail.cas_strong_release(tail, next);
                continue;
            }

            let fresh = Segment::seeded(segment.id + 1, self.capacity, value);
            match segment.next.cas_strong_release(ptr::null_mut(), fresh) {
                Ok(_) => {
                    log::trace!("faa queue linked segment {}", segment.id + 1);
                    let _ = self.tail.cas_strong_release(tail, fresh);
                    return;
                }
                Err(_) => {
                    // SAFETY: lost the race, `fresh` was never published
                    value = unsafe { Segment::unseed(fresh) };
                }
            }

            backoff.snooze();
        }
    }

    /// Pushes the element produced by `f` to the back of the queue.
    pub fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        self.push(f());
    }

    /// Pops the front element, or returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let hp = self.domain.make_hazard_pointer();

        loop {
            let head = hp.protect(&self.head);
            // SAFETY: `head` is protected and never null
            let segment = unsafe { &*head };

            if segment.is_drained() && segment.next.load_acquire().is_null() {
                return None;
            }

            let index = segment.dequeue.fetch_add_relaxed(1);
            if index >= self.capacity {
                // Segment exhausted, move on to the next one
                let next = segment.next.load_acquire();
                if next.is_null() {
                    return None;
                }

                // Never let the head pass the tail
                let tail = self.tail.load_acquire();
                if tail == head {
                    let _ = self.tail.cas_strong_release(tail, next);
                }

                if self.head.cas_strong_acq_rel(head, next).is_ok() {
                    hp.unprotect();
                    // SAFETY: unlinked and retired exactly once
                    unsafe { self.domain.retire(head) };
                }
                continue;
            }

            let slot = &segment.slots[index];
            if slot.state.swap_acquire(SLOT_TAKEN) == SLOT_FILLED {
                // SAFETY: FILLED -> TAKEN transfers the value to this call
                return Some(unsafe { (*slot.value.get()).assume_init_read() });
            }

            // Outran the producer of this index
            backoff.spin();
        }
    }

    /// Returns `true` if the queue looked empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        let hp = self.domain.make_hazard_pointer();
        let head = hp.protect(&self.head);
        // SAFETY: `head` is protected
        let segment = unsafe { &*head };
        segment.is_drained() && segment.next.load_acquire().is_null()
    }

    /// Number of segments linked into the queue since it was created,
    /// including ones already retired.
    pub fn segment_count(&self) -> usize {
        let hp = self.domain.make_hazard_pointer();
        let tail = hp.protect(&self.tail);
        // SAFETY: `tail` is protected
        let segment = unsafe { &*tail };
        // The tail lags at most one segment behind the last link
        let lagging = !segment.next.load_acquire().is_null();
        segment.id + 1 + usize::from(lagging)
    }

    /// Frees every retired segment no hazard pointer still protects, returning
    /// how many were freed.
    pub fn reclaim(&self) -> usize {
        self.domain.reclaim()
    }

    /// Total number of retired segments freed so far.
    pub fn reclaimed_segments(&self) -> usize {
        self.domain.reclaimed()
    }
}

impl<T> ConcurrentContainer<T> for FaaArrayQueue<T> {
    fn push(&self, value: T) {
        FaaArrayQueue::push(self, value);
    }

    fn pop(&self) -> Option<T> {
        FaaArrayQueue::pop(self)
    }
}

impl<T> Drop for FaaArrayQueue<T> {
    fn drop(&mut self) {
        let mut current = self.head.load_relaxed();

        while !current.is_null() {
            // SAFETY: exclusive access; segments still linked are owned here,
            // retired ones belong to the domain.
            unsafe {
                let segment = Box::from_raw(current);
                current = segment.next.load_relaxed();

                for slot in segment.slots.iter() {
                    if slot.state.load_relaxed() == SLOT_FILLED {
                        (*slot.value.get()).assume_init_drop();
                    }
                }
            }
        }
    }
}

impl<T> fmt::Debug for FaaArrayQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaaArrayQueue")
            .field("segment_capacity", &self.capacity)
            .field("segment_count", &self.segment_count())
            .field("is_empty", &self.is_empty())
            .finish()
    }
}
