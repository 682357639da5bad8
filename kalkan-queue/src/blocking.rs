//! Blocking adapter over the lock-free collections.

use core::fmt;
use core::marker::PhantomData;

use crate::ConcurrentContainer;
use crate::faa_array_queue::FaaArrayQueue;
use crate::semaphore::{CountingSemaphore, Semaphore};

/// Wraps a [`ConcurrentContainer`] so that `pop` waits for an element.
///
/// Every push releases one permit of the semaphore and every pop acquires
/// one first. The permit count is an upper bound on the elements available
/// to poppers, not a promise: once it holds a permit, a pop makes a single
/// attempt on the wrapped container and returns whatever that yields. A
/// container that lost an element to a racing consumer, or a `len` passed to
/// [`from_container`](Self::from_container) that overstates the contents,
/// surfaces as `None`.
///
/// # Examples
///
/// ```rust
/// use kalkan_queue::blocking::BlockingQueue;
/// use kalkan_queue::treiber_stack::TreiberStack;
///
/// let stack: BlockingQueue<&str, TreiberStack<&str>> = BlockingQueue::new();
/// stack.push("a");
/// stack.push("b");
/// assert_eq!(stack.pop(), Some("b"));
/// assert_eq!(stack.try_pop(), Some("a"));
/// assert_eq!(stack.try_pop(), None);
/// ```
pub struct BlockingQueue<T, C = FaaArrayQueue<T>, S = CountingSemaphore> {
    container: C,
    permits: S,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T, C, S> BlockingQueue<T, C, S>
where
    C: ConcurrentContainer<T>,
    S: Semaphore,
{
    /// Creates an adapter over an empty default container.
    pub fn new() -> Self
    where
        C: Default,
    {
        Self::from_container(C::default(), 0)
    }

    /// Wraps `container`, which already holds `len` elements.
    pub fn from_container(container: C, len: usize) -> Self {
        BlockingQueue {
            container,
            permits: S::with_permits(len),
            _marker: PhantomData,
        }
    }

    /// Pushes `value` and wakes one blocked popper.
    pub fn push(&self, value: T) {
        self.container.push(value);
        self.permits.release();
    }

    /// Pushes the value produced by `f` and wakes one blocked popper.
    pub fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        self.container.emplace_with(f);
        self.permits.release();
    }

    /// Waits for a permit, then pops once from the container.
    pub fn pop(&self) -> Option<T> {
        self.permits.acquire();
        self.container.pop()
    }

    /// Pops once from the container if a permit is available, without
    /// blocking.
    pub fn try_pop(&self) -> Option<T> {
        if self.permits.try_acquire() {
            self.container.pop()
        } else {
            None
        }
    }

    /// The wrapped container.
    pub fn container(&self) -> &C {
        &self.container
    }
}

impl<T, C, S> Default for BlockingQueue<T, C, S>
where
    C: ConcurrentContainer<T> + Default,
    S: Semaphore,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, S> fmt::Debug for BlockingQueue<T, C, S>
where
    C: fmt::Debug,
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("container", &self.container)
            .field("permits", &self.permits)
            .finish()
    }
}
