use kalkan::{AppendOnlyStack, StackNode};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[test]
fn test_push_returns_stable_reference() {
    let stack = AppendOnlyStack::new();
    let first = stack.push(String::from("first"));
    for i in 0..100 {
        stack.push(i.to_string());
    }
    assert_eq!(first, "first");
    assert_eq!(stack.iter().count(), 101);
}

#[test]
fn test_take_all_transfers_ownership() {
    let stack = AppendOnlyStack::new();
    for i in 0..5 {
        stack.push(i);
    }

    let mut node = stack.take_all();
    assert!(stack.is_empty());

    let mut values = vec![];
    while !node.is_null() {
        let next = unsafe { (*node).next() };
        values.push(unsafe { StackNode::into_value(node) });
        node = next;
    }
    assert_eq!(values, vec![4, 3, 2, 1, 0]);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_push_while_iterating() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 2_000;

    let stack = Arc::new(AppendOnlyStack::new());
    let done = Arc::new(AtomicBool::new(false));

    // Walks the list the whole time pushes are in flight
    let reader = {
        let stack = stack.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut longest = 0;
            while !done.load(Ordering::Acquire) {
                let seen = stack.iter().count();
                assert!(seen >= longest, "list lost nodes during traversal");
                longest = seen;
            }
        })
    };

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = stack.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    stack.push(t * PER_THREAD + i);
                }
            })
        })
        .collect();

    for w in writers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    reader.join().unwrap();

    let values: HashSet<usize> = stack.iter().copied().collect();
    assert_eq!(values.len(), THREADS * PER_THREAD);
}
