//! Counting semaphores for [`BlockingQueue`](crate::blocking::BlockingQueue).

use core::fmt;
use parking_lot::{Condvar, Mutex};

/// A counting semaphore.
///
/// `release` adds a permit and wakes one waiter; `acquire` blocks until a
/// permit is available and takes it.
pub trait Semaphore {
    /// Creates a semaphore holding `permits` permits.
    fn with_permits(permits: usize) -> Self
    where
        Self: Sized;

    /// Adds one permit, waking a blocked `acquire` if there is one.
    fn release(&self);

    /// Takes one permit, blocking until one is available.
    fn acquire(&self);

    /// Takes one permit if one is available right now.
    fn try_acquire(&self) -> bool;
}

/// [`Semaphore`] backed by a mutex-protected counter and a condition variable.
pub struct CountingSemaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl CountingSemaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Permits currently available.
    pub fn permits(&self) -> usize {
        *self.permits.lock()
    }
}

impl Default for CountingSemaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Semaphore for CountingSemaphore {
    fn with_permits(permits: usize) -> Self {
        Self::new(permits)
    }

    fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }
}

impl fmt::Debug for CountingSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingSemaphore")
            .field("permits", &self.permits())
            .finish()
    }
}
