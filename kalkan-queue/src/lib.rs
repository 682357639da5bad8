//! Lock-free stacks and queues for Kalkan.
//!
//! Every collection owns a private [`kalkan::HazardPointerDomain`] for its
//! nodes, so popped nodes are only freed once no other thread can still be
//! reading them.
//!
//! ## Features
//!
//! - `TreiberStack`: Unbounded MPMC LIFO stack.
//! - `MichaelScottQueue`: Unbounded MPMC FIFO queue with a sentinel head.
//! - `FaaArrayQueue`: Unbounded MPMC FIFO queue of fetch-and-add indexed segments.
//! - `BlockingQueue`: Adapter that makes `pop` wait for an element.
//!
//! ## Usage
//!
//! ```rust
//! use kalkan_queue::blocking::BlockingQueue;
//! use kalkan_queue::faa_array_queue::FaaArrayQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue: Arc<BlockingQueue<u64, FaaArrayQueue<u64>>> = Arc::new(BlockingQueue::new());
//!
//! let consumer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || queue.pop())
//! };
//!
//! queue.push(42);
//! assert_eq!(consumer.join().unwrap(), Some(42));
//! ```

pub mod blocking;
pub mod faa_array_queue;
pub mod ms_queue;
pub mod semaphore;
pub mod treiber_stack;
pub mod utils;

/// A collection that many threads can push into and pop from concurrently.
///
/// [`BlockingQueue`](blocking::BlockingQueue) wraps any implementor.
pub trait ConcurrentContainer<T> {
    /// Inserts `value`.
    fn push(&self, value: T);

    /// Inserts the value produced by `f`.
    fn emplace_with<F>(&self, f: F)
    where
        F: FnOnce() -> T,
    {
        self.push(f());
    }

    /// Removes an element, or returns `None` if the container looked empty.
    fn pop(&self) -> Option<T>;
}
