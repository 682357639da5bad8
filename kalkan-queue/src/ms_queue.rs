use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;

use crate::ConcurrentContainer;
use crate::utils::CacheAligned;
use crossbeam_utils::Backoff;
use kalkan::{AtomicCell, Config, HazardPointerDomain};

struct Node<T> {
    next: AtomicCell<*mut Node<T>>,
    // Uninitialized in the sentinel; moved out when a node becomes the sentinel
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Self {
        Box::into_raw(Box::new(Node {
            next: AtomicCell::null(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }))
    }

    fn boxed(value: T) -> *mut Self {
        Box::into_raw(Box::new(Node {
            next: AtomicCell::null(),
            value: UnsafeCell::new(MaybeUninit::new(value)),
        }))
    }
}

/// Michael–Scott lock-free FIFO queue.
///
/// `head` always points at a sentinel whose value has already been consumed
/// (or never existed); the first element lives in `head.next`. `tail` may lag
/// one node behind the real end, and every operation that notices helps it
/// forward.
///
/// Popping holds two hazard pointers at once: one on the sentinel and one on
/// its successor, whose value is read while it is still protected.
pub struct MichaelScottQueue<T> {
    head: CacheAligned<AtomicCell<*mut Node<T>>>,
    tail: CacheAligned<AtomicCell<*mut Node<T>>>,
    domain: HazardPointerDomain<Node<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for MichaelScottQueue<T> {}
unsafe impl<T: Send> Sync for MichaelScottQueue<T> {}

impl<T> Default for MichaelScottQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MichaelScottQueue<T> {
    /// Creates an empty queue sized for the machine's hardware threads.
    pub fn new() -> Self {
        Self::with_domain(Config::new(2))
    }

    /// Creates an empty queue that pre-allocates two hazard slots for each
    /// of `threads` threads.
    pub fn with_expected_threads(threads: usize) -> Self {
        Self::with_domain(Config::new(2).expected_threads(threads))
    }

    fn with_domain(config: Config) -> Self {
        let sentinel = Node::sentinel();
        MichaelScottQueue {
            head: CacheAligned::new(AtomicCell::new(sentinel)),
            tail: CacheAligned::new(AtomicCell::new(sentinel)),
            domain: HazardPointerDomain::with_config(config),
            _marker: PhantomData,
        }
    }

    /// Pushes an element to the back of the queue.
    pub fn push(&self, value: T) {
        self.push_node(Node::boxed(value));
    }

    /// Pushes the element produced by `f` to the back of the queue.
    pub fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        self.push_node(Node::boxed(f()));
    }

    fn push_node(&self, node: *mut Node<T>) {
        let backoff = Backoff::new();
        let hp = self.domain.make_hazard_pointer();

        loop {
            let tail = hp.protect(&self.tail);
            // SAFETY: `tail` is protected and the queue always holds a sentinel
            let tail_ref = unsafe { &*tail };
            let next = tail_ref.next.load_acquire();

            if !next.is_null() {
                // Someone linked a node but has not moved the tail yet
                let _ = self.tail.cas_strong_release(tail, next);
                continue;
            }

            if tail_ref.next.cas_strong_release(ptr::null_mut(), node).is_ok() {
                // Best effort, the next operation helps if this fails
                let _ = self.tail.cas_strong_release(tail, node);
                return;
            }

            backoff.spin();
        }
    }

    /// Pops the front element, or returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let hp_head = self.domain.make_hazard_pointer();
        let hp_next = self.domain.make_hazard_pointer();

        loop {
            let head = hp_head.protect(&self.head);
            // SAFETY: `head` is protected
            let next = hp_next.protect(unsafe { &(*head).next });

            // While `head` is still current, `next` has not been unlinked,
            // so the protection taken above is valid.
            if self.head.load_acquire() != head {
                continue;
            }

            if next.is_null() {
                return None;
            }

            let tail = self.tail.load_acquire();
            if head == tail {
                let _ = self.tail.cas_strong_release(tail, next);
                continue;
            }

            if self.head.cas_strong_acq_rel(head, next).is_ok() {
                // SAFETY: `next` is protected and became the sentinel through
                // our CAS, so its value is ours to move out.
                let value = unsafe { (*(*next).value.get()).assume_init_read() };
                hp_head.unprotect();
                hp_next.unprotect();
                // SAFETY: the old sentinel is unlinked and retired exactly once
                unsafe { self.domain.retire(head) };
                return Some(value);
            }

            backoff.spin();
        }
    }

    /// Returns `true` if the queue was empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        let hp = self.domain.make_hazard_pointer();
        let head = hp.protect(&self.head);
        // SAFETY: `head` is protected
        unsafe { (*head).next.load_acquire().is_null() }
    }

    /// Frees every retired node no hazard pointer still protects, returning
    /// how many were freed.
    pub fn reclaim(&self) -> usize {
        self.domain.reclaim()
    }

    /// Total number of retired nodes freed so far.
    pub fn reclaimed_nodes(&self) -> usize {
        self.domain.reclaimed()
    }
}

impl<T> ConcurrentContainer<T> for MichaelScottQueue<T> {
    fn push(&self, value: T) {
        MichaelScottQueue::push(self, value);
    }

    fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        MichaelScottQueue::emplace_with(self, f);
    }

    fn pop(&self) -> Option<T> {
        MichaelScottQueue::pop(self)
    }
}

impl<T> Drop for MichaelScottQueue<T> {
    fn drop(&mut self) {
        // The sentinel carries no value
        let sentinel = self.head.load_relaxed();
        // SAFETY: exclusive access
        let mut current = unsafe { Box::from_raw(sentinel) }.next.load_relaxed();

        while !current.is_null() {
            unsafe {
                let node = Box::from_raw(current);
                current = node.next.load_relaxed();
                (*node.value.get()).assume_init_drop();
            }
        }
    }
}

impl<T> fmt::Debug for MichaelScottQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MichaelScottQueue")
            .field("is_empty", &self.is_empty())
            .field("domain", &self.domain)
            .finish()
    }
}
