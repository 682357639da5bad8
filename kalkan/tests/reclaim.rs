use kalkan::{AtomicCell, Config, HazardPointerDomain};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

struct CountedNode {
    drop_count: Arc<AtomicUsize>,
}

impl CountedNode {
    fn new(drop_count: &Arc<AtomicUsize>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            drop_count: drop_count.clone(),
        }))
    }
}

impl Drop for CountedNode {
    fn drop(&mut self) {
        self.drop_count.fetch_add(1, Ordering::SeqCst);
    }
}

fn single_thread_domain() -> HazardPointerDomain<CountedNode> {
    HazardPointerDomain::with_config(Config::new(1).expected_threads(1))
}

#[test]
fn test_protected_nodes_survive_scans() {
    const K: usize = 10;
    const J: usize = 2;

    let drops = Arc::new(AtomicUsize::new(0));
    let filler_drops = Arc::new(AtomicUsize::new(0));
    let domain = single_thread_domain();

    let sources: Vec<AtomicCell<*mut CountedNode>> = (0..K)
        .map(|_| AtomicCell::new(CountedNode::new(&drops)))
        .collect();

    // Protect the first J nodes
    let hazards: Vec<_> = sources[..J]
        .iter()
        .map(|source| {
            let hp = domain.make_hazard_pointer();
            hp.protect(source);
            hp
        })
        .collect();
    assert_eq!(domain.slot_count(), J);

    // Unlink and retire all K
    for source in &sources {
        let node = source.swap_acq_rel(std::ptr::null_mut());
        unsafe { domain.retire(node) };
    }

    // Push well past the 2 * slots threshold
    for _ in 0..4 * domain.slot_count() + 1 {
        unsafe { domain.retire(CountedNode::new(&filler_drops)) };
    }
    domain.reclaim();

    assert_eq!(drops.load(Ordering::SeqCst), K - J);
    assert_eq!(domain.pending(), J);

    drop(hazards);
    assert_eq!(domain.reclaim(), J);
    assert_eq!(drops.load(Ordering::SeqCst), K);
    assert_eq!(domain.pending(), 0);
}

#[test]
fn test_scan_triggers_on_threshold() {
    let drops = Arc::new(AtomicUsize::new(0));
    let domain = single_thread_domain();
    assert_eq!(domain.slot_count(), 1);

    // threshold = 2: the retire that observes 3 pending scans
    for _ in 0..3 {
        unsafe { domain.retire(CountedNode::new(&drops)) };
    }
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(domain.pending(), 3);

    unsafe { domain.retire(CountedNode::new(&drops)) };
    assert_eq!(drops.load(Ordering::SeqCst), 4);
    assert_eq!(domain.pending(), 0);
    assert_eq!(domain.reclaimed(), 4);
}

#[test]
fn test_retire_null_is_noop() {
    let domain = single_thread_domain();
    unsafe { domain.retire(std::ptr::null_mut()) };
    assert_eq!(domain.pending(), 0);
}

#[test]
fn test_drop_domain_frees_pending() {
    let drops = Arc::new(AtomicUsize::new(0));
    let domain = HazardPointerDomain::with_config(Config::new(8).expected_threads(8));

    for _ in 0..20 {
        unsafe { domain.retire(CountedNode::new(&drops)) };
    }
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(domain);
    assert_eq!(drops.load(Ordering::SeqCst), 20);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_retire() {
    let drops = Arc::new(AtomicUsize::new(0));
    let domain = Arc::new(HazardPointerDomain::with_config(
        Config::new(1).expected_threads(4),
    ));

    let mut handles = vec![];
    for _ in 0..8 {
        let d = drops.clone();
        let domain = domain.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                let hp = domain.make_hazard_pointer();
                let source = AtomicCell::new(CountedNode::new(&d));
                let node = hp.protect(&source);
                source.store_relaxed(std::ptr::null_mut());
                hp.unprotect();
                unsafe { domain.retire(node) };
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // Some scans ran while the threads were retiring
    assert!(drops.load(Ordering::SeqCst) > 0);

    domain.reclaim();
    assert_eq!(drops.load(Ordering::SeqCst), 8 * 500);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_pool_size_never_decreases() {
    let domain: Arc<HazardPointerDomain<CountedNode>> = Arc::new(HazardPointerDomain::with_config(
        Config::new(1).expected_threads(1),
    ));
    let observed_max = Arc::new(AtomicUsize::new(domain.slot_count()));

    let mut handles = vec![];
    for _ in 0..4 {
        let domain = domain.clone();
        let observed_max = observed_max.clone();
        handles.push(thread::spawn(move || {
            let mut last = 0;
            for i in 0..2_000 {
                let _a = domain.make_hazard_pointer();
                let _b = (i % 3 == 0).then(|| domain.make_hazard_pointer());
                let size = domain.slot_count();
                assert!(size >= last, "slot pool shrank from {last} to {size}");
                last = size;
                observed_max.fetch_max(size, Ordering::Relaxed);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // An acquirer that races a release may append instead of reusing, so
    // the final size has no tighter bound than what was observed
    assert!(domain.slot_count() >= 1);
    assert_eq!(domain.slot_count(), observed_max.load(Ordering::Relaxed));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_random_protect_and_replace() {
    const THREADS: usize = 4;
    const CELLS: usize = 8;
    const OPS: usize = 5_000;

    let drops = Arc::new(AtomicUsize::new(0));
    let allocated = Arc::new(AtomicUsize::new(CELLS));
    let domain = Arc::new(HazardPointerDomain::with_config(
        Config::new(1).expected_threads(THREADS),
    ));
    let cells: Arc<Vec<AtomicCell<*mut CountedNode>>> = Arc::new(
        (0..CELLS)
            .map(|_| AtomicCell::new(CountedNode::new(&drops)))
            .collect(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let drops = drops.clone();
            let allocated = allocated.clone();
            let domain = domain.clone();
            let cells = cells.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                let hp = domain.make_hazard_pointer();
                for _ in 0..OPS {
                    let cell = &cells[rng.random_range(0..CELLS)];
                    if rng.random_bool(0.3) {
                        let old = cell.swap_acq_rel(CountedNode::new(&drops));
                        allocated.fetch_add(1, Ordering::SeqCst);
                        unsafe { domain.retire(old) };
                    } else {
                        let node = hp.protect(cell);
                        // Still allocated: its Arc is readable
                        assert!(Arc::strong_count(unsafe { &(*node).drop_count }) >= 1);
                        hp.unprotect();
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    domain.reclaim();
    assert_eq!(domain.pending(), 0);
    assert_eq!(
        drops.load(Ordering::SeqCst),
        allocated.load(Ordering::SeqCst) - CELLS
    );

    for cell in cells.iter() {
        unsafe { drop(Box::from_raw(cell.load_relaxed())) };
    }
    assert_eq!(drops.load(Ordering::SeqCst), allocated.load(Ordering::SeqCst));
}
