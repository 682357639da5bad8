use core::fmt;
use core::ops::{Deref, DerefMut};

/// Pads and aligns a value to a cache line so hot words owned by different
/// threads (a queue's head and tail) do not share one.
///
/// Line sizes per architecture: s390x 256B, aarch64 128B (Apple M-series,
/// Neoverse), 64B everywhere else.
#[cfg_attr(target_arch = "s390x", repr(align(256)))]
#[cfg_attr(target_arch = "aarch64", repr(align(128)))]
#[cfg_attr(not(any(target_arch = "s390x", target_arch = "aarch64")), repr(align(64)))]
#[derive(Default)]
pub struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CacheAligned<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_and_tail_land_on_separate_lines() {
        struct Ends {
            head: CacheAligned<usize>,
            tail: CacheAligned<usize>,
        }

        let ends = Ends {
            head: CacheAligned::new(1),
            tail: CacheAligned::new(2),
        };
        let align = core::mem::align_of::<CacheAligned<usize>>();
        assert!(align >= 64);

        let head = &*ends.head as *const usize as usize;
        let tail = &*ends.tail as *const usize as usize;
        assert!(head.abs_diff(tail) >= align);
        assert_eq!(*ends.head + *ends.tail, 3);
    }
}
