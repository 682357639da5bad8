//! Kalkan: hazard-pointer memory reclamation for lock-free data structures.
//!
//! Kalkan lets many threads read shared heap nodes while other threads
//! unlink and free them, without ever freeing a node that is still being
//! read. Readers *announce* a pointer in a hazard slot before dereferencing
//! it; writers *retire* unlinked nodes, and a periodic scan frees every
//! retired node no slot announces.
//!
//! # Key Features
//!
//! - **Per-structure domains**: each collection owns its own
//!   [`HazardPointerDomain`], no global registry or thread-local state
//! - **Grow-only slot pool**: slots are pre-created from a sizing hint and
//!   added on demand, never capped
//! - **Amortized scans**: reclamation runs once the retired list exceeds
//!   twice the number of slots
//! - **Explicit orderings**: every shared access goes through
//!   [`AtomicCell`], which names its memory ordering
//!
//! # Example
//!
//! ```rust
//! use kalkan::{AtomicCell, HazardPointerDomain};
//!
//! let domain = HazardPointerDomain::new(1);
//! let shared = AtomicCell::new(Box::into_raw(Box::new(42u32)));
//!
//! // Protect before dereferencing
//! let hp = domain.make_hazard_pointer();
//! let ptr = hp.protect(&shared);
//! assert_eq!(unsafe { *ptr }, 42);
//!
//! // Unlink and retire; freed once no hazard pointer announces it
//! let old = shared.swap_acq_rel(core::ptr::null_mut());
//! unsafe { domain.retire(old) };
//! drop(hp);
//! domain.reclaim();
//! ```

#![warn(missing_docs)]

extern crate alloc;

mod atomic;
mod domain;
mod guard;
mod reclaim;
mod retired;
mod slot;
mod stack;
mod ttas;

pub use atomic::{AtomicCell, Bitwise, Integer, Primitive};
pub use domain::{Config, HazardPointerDomain};
pub use guard::HazardPointer;
pub use stack::{AppendOnlyStack, Iter, StackNode};

// Re-export for convenience
pub use core::sync::atomic::Ordering;
