use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::utils::Memoizer;

#[test]
fn test_get_or_compute_caches_per_key() {
    let memo: Memoizer<String, Arc<String>> = Memoizer::new();
    let calls = AtomicUsize::new(0);

    let first = memo.get_or_compute("a".to_string(), |k| {
        calls.fetch_add(1, Ordering::SeqCst);
        Arc::new(k.to_uppercase())
    });
    let second = memo.get_or_compute("a".to_string(), |k| {
        calls.fetch_add(1, Ordering::SeqCst);
        Arc::new(k.to_uppercase())
    });

    assert_eq!(*first, "A");
    assert!(Arc::ptr_eq(&first, &second), "Same key should return the cached instance");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    memo.get_or_compute("b".to_string(), |k| Arc::new(k.clone()));
    assert_eq!(memo.len(), 2);
    assert_eq!(memo.get(&"b".to_string()).as_deref().map(String::as_str), Some("b"));
    assert!(memo.get(&"c".to_string()).is_none());
}

#[test]
fn test_concurrent_requests_compute_once() {
    let memo: Arc<Memoizer<u32, Arc<u32>>> = Arc::new(Memoizer::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let memo = Arc::clone(&memo);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                memo.get_or_compute(7, |k| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(20));
                    Arc::new(*k * 6)
                })
            })
        })
        .collect();

    let results: Vec<Arc<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "Computation should run exactly once");
    for result in &results {
        assert_eq!(**result, 42);
        assert!(Arc::ptr_eq(result, &results[0]));
    }
}

#[test]
fn test_clear_forgets_values() {
    let memo: Memoizer<u8, u8> = Memoizer::default();
    memo.get_or_compute(1, |k| *k);
    assert!(!memo.is_empty());
    memo.clear();
    assert!(memo.is_empty());
}
