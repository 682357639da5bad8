use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr;

use crate::ConcurrentContainer;
use crate::utils::CacheAligned;
use crossbeam_utils::Backoff;
use kalkan::{AtomicCell, Config, HazardPointerDomain};

struct Node<T> {
    // Written once before the node is published, read-only afterwards
    next: *mut Node<T>,
    // Moved out by the popping thread before the node is retired
    value: ManuallyDrop<T>,
}

// SAFETY: a node carries a `T` between threads; `next` is only written by
// the thread that owns the unpublished node.
unsafe impl<T: Send> Send for Node<T> {}

impl<T> Node<T> {
    fn boxed(value: T) -> *mut Self {
        Box::into_raw(Box::new(Node {
            next: ptr::null_mut(),
            value: ManuallyDrop::new(value),
        }))
    }
}

/// Lock-free LIFO stack.
///
/// Pushing never dereferences a shared node, so it needs no hazard pointer.
/// Popping protects the head before reading its successor, which rules out
/// both use-after-free and ABA on the head CAS.
pub struct TreiberStack<T> {
    head: CacheAligned<AtomicCell<*mut Node<T>>>,
    domain: HazardPointerDomain<Node<T>>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for TreiberStack<T> {}
unsafe impl<T: Send> Sync for TreiberStack<T> {}

impl<T> Default for TreiberStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreiberStack<T> {
    /// Creates an empty stack sized for the machine's hardware threads.
    pub fn new() -> Self {
        Self::with_domain(Config::new(1))
    }

    /// Creates an empty stack that pre-allocates one hazard slot for each
    /// of `threads` threads.
    pub fn with_expected_threads(threads: usize) -> Self {
        Self::with_domain(Config::new(1).expected_threads(threads))
    }

    fn with_domain(config: Config) -> Self {
        TreiberStack {
            head: CacheAligned::new(AtomicCell::null()),
            domain: HazardPointerDomain::with_config(config),
            _marker: PhantomData,
        }
    }

    /// Pushes an element on top of the stack.
    pub fn push(&self, value: T) {
        self.push_node(Node::boxed(value));
    }

    /// Pushes the element produced by `f`.
    pub fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        self.push_node(Node::boxed(f()));
    }

    fn push_node(&self, node: *mut Node<T>) {
        let backoff = Backoff::new();
        let mut head = self.head.load_relaxed();

        loop {
            // SAFETY: the node is not published yet
            unsafe { (*node).next = head };

            match self.head.cas_weak_release(head, node) {
                Ok(_) => return,
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Pops the top element, or returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let hp = self.domain.make_hazard_pointer();

        loop {
            let head = hp.protect(&self.head);
            if head.is_null() {
                return None;
            }

            // SAFETY: `head` is protected, it cannot be freed under us
            let next = unsafe { (*head).next };

            if self.head.cas_strong_acq_rel(head, next).is_ok() {
                hp.unprotect();
                // SAFETY: winning the CAS makes this thread the only one that
                // touches the value; others may still read `next` only.
                let value = unsafe { ManuallyDrop::into_inner(ptr::read(&raw const (*head).value)) };
                // SAFETY: unlinked, allocated by `Node::boxed`, retired once
                unsafe { self.domain.retire(head) };
                return Some(value);
            }

            backoff.spin();
        }
    }

    /// Returns `true` if the stack was empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.head.load_acquire().is_null()
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

impl<T> ConcurrentContainer<T> for TreiberStack<T> {
    fn push(&self, value: T) {
        TreiberStack::push(self, value);
    }

    fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        TreiberStack::emplace_with(self, f);
    }

    fn pop(&self) -> Option<T> {
        TreiberStack::pop(self)
    }
}

impl<T> Drop for TreiberStack<T> {
    fn drop(&mut self) {
        let mut current = self.head.load_relaxed();

        while !current.is_null() {
            // SAFETY: exclusive access; every linked node still owns its value
            unsafe {
                let mut node = Box::from_raw(current);
                current = node.next;
                ManuallyDrop::drop(&mut node.value);
            }
        }
    }
}

impl<T> fmt::Debug for TreiberStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreiberStack")
            .field("is_empty", &self.is_empty())
            .field("domain", &self.domain)
            .finish()
    }
}
