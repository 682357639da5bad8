//! Typed atomic cells with named memory orderings.
//!
//! This module provides `AtomicCell<T>`, a thin wrapper over the
//! `portable-atomic` primitives. Every structure in this workspace goes
//! through it, so the ordering of each access is spelled out at the call
//! site (`load_acquire`, `store_release`, `cas_strong_release`, ...).

use core::fmt;
use core::sync::atomic::Ordering;
use portable_atomic::{
    AtomicBool, AtomicI32, AtomicI64, AtomicIsize, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize,
};

mod sealed {
    pub trait Sealed {}
}

/// A value that has a lock-free atomic representation.
///
/// Implemented for the integer types, `bool` and raw mutable pointers.
/// This trait is sealed.
pub trait Primitive: Copy + sealed::Sealed {
    /// The atomic type backing an `AtomicCell<Self>`.
    #[doc(hidden)]
    type Atomic: Send + Sync;

    #[doc(hidden)]
    fn new_atomic(value: Self) -> Self::Atomic;

    #[doc(hidden)]
    fn into_value(atomic: Self::Atomic) -> Self;

    #[doc(hidden)]
    fn load(atomic: &Self::Atomic, order: Ordering) -> Self;

    #[doc(hidden)]
    fn store(atomic: &Self::Atomic, value: Self, order: Ordering);

    #[doc(hidden)]
    fn swap(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self;

    #[doc(hidden)]
    fn compare_exchange(
        atomic: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;

    #[doc(hidden)]
    fn compare_exchange_weak(
        atomic: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
}

/// A primitive supporting atomic bitwise read-modify-write.
pub trait Bitwise: Primitive {
    #[doc(hidden)]
    fn fetch_and(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self;

    #[doc(hidden)]
    fn fetch_or(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self;

    #[doc(hidden)]
    fn fetch_xor(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self;
}

/// An integer primitive supporting atomic arithmetic (wrapping on overflow).
pub trait Integer: Bitwise {
    #[doc(hidden)]
    fn fetch_add(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self;

    #[doc(hidden)]
    fn fetch_sub(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self;
}

macro_rules! impl_primitive {
    ($ty:ty, $atomic:ty) => {
        impl sealed::Sealed for $ty {}

        impl Primitive for $ty {
            type Atomic = $atomic;

            #[inline]
            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value)
            }

            #[inline]
            fn into_value(atomic: Self::Atomic) -> Self {
                atomic.into_inner()
            }

            #[inline]
            fn load(atomic: &Self::Atomic, order: Ordering) -> Self {
                atomic.load(order)
            }

            #[inline]
            fn store(atomic: &Self::Atomic, value: Self, order: Ordering) {
                atomic.store(value, order)
            }

            #[inline]
            fn swap(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
                atomic.swap(value, order)
            }

            #[inline]
            fn compare_exchange(
                atomic: &Self::Atomic,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                atomic.compare_exchange(current, new, success, failure)
            }

            #[inline]
            fn compare_exchange_weak(
                atomic: &Self::Atomic,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                atomic.compare_exchange_weak(current, new, success, failure)
            }
        }
    };
}

macro_rules! impl_bitwise {
    ($ty:ty) => {
        impl Bitwise for $ty {
            #[inline]
            fn fetch_and(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
                atomic.fetch_and(value, order)
            }

            #[inline]
            fn fetch_or(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
                atomic.fetch_or(value, order)
            }

            #[inline]
            fn fetch_xor(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
                atomic.fetch_xor(value, order)
            }
        }
    };
}

macro_rules! impl_integer {
    ($($ty:ty => $atomic:ty),* $(,)?) => {
        $(
            impl_primitive!($ty, $atomic);
            impl_bitwise!($ty);

            impl Integer for $ty {
                #[inline]
                fn fetch_add(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
                    atomic.fetch_add(value, order)
                }

                #[inline]
                fn fetch_sub(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
                    atomic.fetch_sub(value, order)
                }
            }
        )*
    };
}

impl_integer! {
    usize => AtomicUsize,
    isize => AtomicIsize,
    u32 => AtomicU32,
    i32 => AtomicI32,
    u64 => AtomicU64,
    i64 => AtomicI64,
}

impl_primitive!(bool, AtomicBool);
impl_bitwise!(bool);

impl<T> sealed::Sealed for *mut T {}

impl<T> Primitive for *mut T {
    type Atomic = AtomicPtr<T>;

    #[inline]
    fn new_atomic(value: Self) -> Self::Atomic {
        AtomicPtr::new(value)
    }

    #[inline]
    fn into_value(atomic: Self::Atomic) -> Self {
        atomic.into_inner()
    }

    #[inline]
    fn load(atomic: &Self::Atomic, order: Ordering) -> Self {
        atomic.load(order)
    }

    #[inline]
    fn store(atomic: &Self::Atomic, value: Self, order: Ordering) {
        atomic.store(value, order)
    }

    #[inline]
    fn swap(atomic: &Self::Atomic, value: Self, order: Ordering) -> Self {
        atomic.swap(value, order)
    }

    #[inline]
    fn compare_exchange(
        atomic: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self> {
        atomic.compare_exchange(current, new, success, failure)
    }

    #[inline]
    fn compare_exchange_weak(
        atomic: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self> {
        atomic.compare_exchange_weak(current, new, success, failure)
    }
}

/// Strong and weak CAS helpers, one pair per success/failure ordering.
macro_rules! cas_variants {
    ($($strong:ident, $weak:ident => $success:ident, $failure:ident;)*) => {
        $(
            #[doc = concat!(
                "Strong CAS, `", stringify!($success), "` on success, `",
                stringify!($failure), "` on failure."
            )]
            #[inline]
            pub fn $strong(&self, current: T, new: T) -> Result<T, T> {
                self.compare_exchange(current, new, Ordering::$success, Ordering::$failure)
            }

            #[doc = concat!(
                "Weak CAS, `", stringify!($success), "` on success, `",
                stringify!($failure), "` on failure."
            )]
            #[inline]
            pub fn $weak(&self, current: T, new: T) -> Result<T, T> {
                self.compare_exchange_weak(current, new, Ordering::$success, Ordering::$failure)
            }
        )*
    };
}

/// Read-modify-write helpers for `$base`, in the order
/// relaxed, acquire, release, acq_rel, seq_cst.
macro_rules! rmw_variants {
    ($base:ident: $relaxed:ident, $acquire:ident, $release:ident, $acq_rel:ident, $seq_cst:ident) => {
        rmw_variants!(@one $base, $relaxed, Relaxed);
        rmw_variants!(@one $base, $acquire, Acquire);
        rmw_variants!(@one $base, $release, Release);
        rmw_variants!(@one $base, $acq_rel, AcqRel);
        rmw_variants!(@one $base, $seq_cst, SeqCst);
    };
    (@one $base:ident, $name:ident, $order:ident) => {
        #[doc = concat!(
            "[`", stringify!($base), "`](AtomicCell::", stringify!($base),
            ") with `", stringify!($order), "` ordering."
        )]
        #[inline]
        pub fn $name(&self, value: T) -> T {
            self.$base(value, Ordering::$order)
        }
    };
}

/// An atomic cell holding a `T`, with one method per memory ordering.
///
/// The generic [`load`](AtomicCell::load)/[`store`](AtomicCell::store)/...
/// methods take an explicit [`Ordering`]; the suffixed variants fix it:
///
/// | suffix      | ordering                              |
/// |-------------|---------------------------------------|
/// | `_relaxed`  | `Relaxed`                             |
/// | `_acquire`  | `Acquire`                             |
/// | `_release`  | `Release`                             |
/// | `_acq_rel`  | `AcqRel`                              |
/// | `_seq_cst`  | `SeqCst`                              |
///
/// Every operation comes in every ordering it accepts: loads take
/// `_relaxed`/`_acquire`/`_seq_cst`, stores `_relaxed`/`_release`/`_seq_cst`,
/// and swaps, `fetch_*` and `cas_strong_*`/`cas_weak_*` all five. The `cas_*`
/// helpers use the named ordering on success and `Relaxed` on failure, except
/// `_seq_cst` which is `SeqCst` on both.
///
/// # Examples
///
/// ```rust
/// use kalkan::AtomicCell;
///
/// let counter = AtomicCell::new(0usize);
/// assert_eq!(counter.fetch_add_relaxed(2), 0);
/// assert_eq!(counter.cas_strong_acq_rel(2, 5), Ok(2));
/// assert_eq!(counter.load_acquire(), 5);
/// ```
#[repr(transparent)]
pub struct AtomicCell<T: Primitive> {
    inner: T::Atomic,
}

impl<T: Primitive> AtomicCell<T> {
    /// Creates a new cell holding `value`.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: T::new_atomic(value),
        }
    }

    /// Consumes the cell and returns the contained value.
    #[inline]
    pub fn into_inner(self) -> T {
        T::into_value(self.inner)
    }

    // ---- load ----

    /// Loads the value with the given ordering.
    #[inline]
    pub fn load(&self, order: Ordering) -> T {
        T::load(&self.inner, order)
    }

    /// Loads the value with `Relaxed` ordering.
    #[inline]
    pub fn load_relaxed(&self) -> T {
        self.load(Ordering::Relaxed)
    }

    /// Loads the value with `Acquire` ordering.
    #[inline]
    pub fn load_acquire(&self) -> T {
        self.load(Ordering::Acquire)
    }

    /// Loads the value with `SeqCst` ordering.
    #[inline]
    pub fn load_seq_cst(&self) -> T {
        self.load(Ordering::SeqCst)
    }

    // ---- store ----

    /// Stores `value` with the given ordering.
    #[inline]
    pub fn store(&self, value: T, order: Ordering) {
        T::store(&self.inner, value, order)
    }

    /// Stores `value` with `Relaxed` ordering.
    #[inline]
    pub fn store_relaxed(&self, value: T) {
        self.store(value, Ordering::Relaxed)
    }

    /// Stores `value` with `Release` ordering.
    #[inline]
    pub fn store_release(&self, value: T) {
        self.store(value, Ordering::Release)
    }

    /// Stores `value` with `SeqCst` ordering.
    #[inline]
    pub fn store_seq_cst(&self, value: T) {
        self.store(value, Ordering::SeqCst)
    }

    // ---- exchange ----

    /// Replaces the value, returning the previous one.
    #[inline]
    pub fn swap(&self, value: T, order: Ordering) -> T {
        T::swap(&self.inner, value, order)
    }

    /// [`swap`](AtomicCell::swap) with `Relaxed` ordering.
    #[inline]
    pub fn swap_relaxed(&self, value: T) -> T {
        self.swap(value, Ordering::Relaxed)
    }

    /// [`swap`](AtomicCell::swap) with `Acquire` ordering.
    #[inline]
    pub fn swap_acquire(&self, value: T) -> T {
        self.swap(value, Ordering::Acquire)
    }

    /// [`swap`](AtomicCell::swap) with `Release` ordering.
    #[inline]
    pub fn swap_release(&self, value: T) -> T {
        self.swap(value, Ordering::Release)
    }

    /// [`swap`](AtomicCell::swap) with `AcqRel` ordering.
    #[inline]
    pub fn swap_acq_rel(&self, value: T) -> T {
        self.swap(value, Ordering::AcqRel)
    }

    /// [`swap`](AtomicCell::swap) with `SeqCst` ordering.
    #[inline]
    pub fn swap_seq_cst(&self, value: T) -> T {
        self.swap(value, Ordering::SeqCst)
    }

    // ---- compare-and-swap ----

    /// Stores `new` if the current value equals `current`.
    ///
    /// Returns the previous value: `Ok` on success, `Err` holding the
    /// observed value on failure.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: T,
        new: T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<T, T> {
        T::compare_exchange(&self.inner, current, new, success, failure)
    }

    /// Like [`compare_exchange`](AtomicCell::compare_exchange), but may fail
    /// spuriously. Use inside retry loops.
    #[inline]
    pub fn compare_exchange_weak(
        &self,
        current: T,
        new: T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<T, T> {
        T::compare_exchange_weak(&self.inner, current, new, success, failure)
    }

    cas_variants! {
        cas_strong_relaxed, cas_weak_relaxed => Relaxed, Relaxed;
        cas_strong_acquire, cas_weak_acquire => Acquire, Relaxed;
        cas_strong_release, cas_weak_release => Release, Relaxed;
        cas_strong_acq_rel, cas_weak_acq_rel => AcqRel, Relaxed;
        cas_strong_seq_cst, cas_weak_seq_cst => SeqCst, SeqCst;
    }
}

impl<T: Bitwise> AtomicCell<T> {
    /// Bitwise "and" with `value`, returning the previous value.
    #[inline]
    pub fn fetch_and(&self, value: T, order: Ordering) -> T {
        T::fetch_and(&self.inner, value, order)
    }

    /// Bitwise "or" with `value`, returning the previous value.
    #[inline]
    pub fn fetch_or(&self, value: T, order: Ordering) -> T {
        T::fetch_or(&self.inner, value, order)
    }

    /// Bitwise "xor" with `value`, returning the previous value.
    #[inline]
    pub fn fetch_xor(&self, value: T, order: Ordering) -> T {
        T::fetch_xor(&self.inner, value, order)
    }

    rmw_variants!(fetch_and: fetch_and_relaxed, fetch_and_acquire, fetch_and_release, fetch_and_acq_rel, fetch_and_seq_cst);
    rmw_variants!(fetch_or: fetch_or_relaxed, fetch_or_acquire, fetch_or_release, fetch_or_acq_rel, fetch_or_seq_cst);
    rmw_variants!(fetch_xor: fetch_xor_relaxed, fetch_xor_acquire, fetch_xor_release, fetch_xor_acq_rel, fetch_xor_seq_cst);
}

impl<T: Integer> AtomicCell<T> {
    /// Wrapping add, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, value: T, order: Ordering) -> T {
        T::fetch_add(&self.inner, value, order)
    }

    /// Wrapping subtract, returning the previous value.
    #[inline]
    pub fn fetch_sub(&self, value: T, order: Ordering) -> T {
        T::fetch_sub(&self.inner, value, order)
    }

    rmw_variants!(fetch_add: fetch_add_relaxed, fetch_add_acquire, fetch_add_release, fetch_add_acq_rel, fetch_add_seq_cst);
    rmw_variants!(fetch_sub: fetch_sub_relaxed, fetch_sub_acquire, fetch_sub_release, fetch_sub_acq_rel, fetch_sub_seq_cst);
}

impl<T> AtomicCell<*mut T> {
    /// Creates a cell holding a null pointer.
    #[inline]
    pub fn null() -> Self {
        Self::new(core::ptr::null_mut())
    }
}

impl<T: Primitive + Default> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Primitive + fmt::Debug> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCell")
            .field(&self.load_relaxed())
            .finish()
    }
}

impl<T: Primitive> From<T> for AtomicCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
