//! Intrusive append-only lock-free stack.
//!
//! Nodes are inserted at the head with a CAS loop and can only be removed
//! all at once by swapping the head with null ([`AppendOnlyStack::take_all`]).
//! Since a node is never unlinked on its own, a reader that captured the head
//! may walk `next` links while other threads keep pushing: every node it can
//! reach stays linked for as long as nobody takes the whole list.
//!
//! The hazard slot registry and the retired list of a domain are both
//! built on this type.

use crate::atomic::AtomicCell;
use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::ptr;

/// A node of an [`AppendOnlyStack`].
pub struct StackNode<T> {
    next: *mut StackNode<T>,
    value: T,
}

impl<T> StackNode<T> {
    /// Allocate an unlinked node on the heap, returning a raw pointer.
    pub fn boxed(value: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: ptr::null_mut(),
            value,
        }))
    }

    /// The next node in the list, or null.
    #[inline]
    pub fn next(&self) -> *mut StackNode<T> {
        self.next
    }

    /// Relink this node.
    ///
    /// # Safety
    ///
    /// `node` must be valid and exclusively owned by the caller, i.e. either
    /// not yet pushed or detached with [`AppendOnlyStack::take_all`].
    #[inline]
    pub unsafe fn set_next(node: *mut Self, next: *mut StackNode<T>) {
        unsafe { (*node).next = next };
    }

    /// The value carried by this node.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Free a node, returning its value.
    ///
    /// # Safety
    ///
    /// `node` must come from [`StackNode::boxed`], be exclusively owned by
    /// the caller, and no thread may still be walking a list through it.
    #[inline]
    pub unsafe fn into_value(node: *mut Self) -> T {
        let node = unsafe { Box::from_raw(node) };
        node.value
    }
}

/// Lock-free LIFO list with push and take-everything as its only mutations.
pub struct AppendOnlyStack<T> {
    head: AtomicCell<*mut StackNode<T>>,
    _marker: PhantomData<Box<StackNode<T>>>,
}

unsafe impl<T: Send> Send for AppendOnlyStack<T> {}
unsafe impl<T: Send + Sync> Sync for AppendOnlyStack<T> {}

impl<T> AppendOnlyStack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            head: AtomicCell::null(),
            _marker: PhantomData,
        }
    }

    /// Allocates a node holding `value` and pushes it.
    ///
    /// The returned reference stays valid until the node is detached with
    /// [`take_all`](AppendOnlyStack::take_all) and freed, or until the stack
    /// is dropped.
    pub fn push(&self, value: T) -> &T {
        let node = StackNode::boxed(value);
        // SAFETY: freshly allocated, not shared with anyone yet
        unsafe {
            self.push_node(node);
            &(*node).value
        }
    }

    /// Pushes a single node.
    ///
    /// # Safety
    ///
    /// `node` must come from [`StackNode::boxed`], be exclusively owned by
    /// the caller and must not be linked into any list.
    pub unsafe fn push_node(&self, node: *mut StackNode<T>) {
        unsafe { self.push_chain(node, node) }
    }

    /// Splices the pre-linked chain `head ..= tail` onto the stack in one step.
    ///
    /// # Safety
    ///
    /// `head` must reach `tail` through `next` links, and every node of the
    /// chain must be exclusively owned by the caller.
    pub unsafe fn push_chain(&self, head: *mut StackNode<T>, tail: *mut StackNode<T>) {
        let mut current = self.head.load_relaxed();
        loop {
            unsafe { StackNode::set_next(tail, current) };
            // Release publishes the chain's links to readers that acquire the head
            match self.head.cas_weak_release(current, head) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically detaches the whole list, leaving the stack empty.
    ///
    /// The caller becomes the owner of every returned node. They may be
    /// freed with [`StackNode::into_value`] once no thread can still be
    /// traversing them through [`iter`](AppendOnlyStack::iter).
    pub fn take_all(&self) -> *mut StackNode<T> {
        self.head.swap_acquire(ptr::null_mut())
    }

    /// The current head, for lock-free traversal.
    #[inline]
    pub fn head(&self) -> *mut StackNode<T> {
        self.head.load_acquire()
    }

    /// Returns `true` if the stack held no nodes at the time of the call.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load_relaxed().is_null()
    }

    /// Walks the list from a snapshot of the head.
    ///
    /// Nodes pushed after the snapshot are not visited.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.head(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for AppendOnlyStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AppendOnlyStack<T> {
    fn drop(&mut self) {
        let mut current = self.head.load_relaxed();
        while !current.is_null() {
            // SAFETY: we have exclusive access; every linked node is owned by us
            unsafe {
                let next = (*current).next;
                drop(Box::from_raw(current));
                current = next;
            }
        }
    }
}

impl<T> fmt::Debug for AppendOnlyStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppendOnlyStack")
            .field("head", &self.head.load_relaxed())
            .finish()
    }
}

/// Iterator over the values of an [`AppendOnlyStack`], newest first.
pub struct Iter<'a, T> {
    current: *mut StackNode<T>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.current.is_null() {
            return None;
        }
        // SAFETY: nodes reachable from a head snapshot stay linked while the
        // stack is borrowed (only take_all detaches them)
        let node = unsafe { &*self.current };
        self.current = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn push_then_iterate_newest_first() {
        let stack = AppendOnlyStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        let seen: Vec<_> = stack.iter().copied().collect();
        assert_eq!(seen, [3, 2, 1]);
    }

    #[test]
    fn take_all_empties_the_stack() {
        let stack = AppendOnlyStack::new();
        stack.push(7);
        stack.push(8);

        let mut head = stack.take_all();
        assert!(stack.is_empty());
        assert_eq!(stack.iter().count(), 0);

        let mut values = Vec::new();
        while !head.is_null() {
            unsafe {
                let next = (*head).next();
                values.push(StackNode::into_value(head));
                head = next;
            }
        }
        assert_eq!(values, [8, 7]);
    }

    #[test]
    fn push_chain_splices_in_order() {
        let stack = AppendOnlyStack::new();
        stack.push(0);

        let a = StackNode::boxed(1);
        let b = StackNode::boxed(2);
        unsafe {
            StackNode::set_next(a, b);
            stack.push_chain(a, b);
        }

        let seen: Vec<_> = stack.iter().copied().collect();
        assert_eq!(seen, [1, 2, 0]);
    }
}
