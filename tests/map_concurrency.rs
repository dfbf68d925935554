// ==============================================
// HASH MAP CONCURRENCY TESTS (integration)
// ==============================================
//
// Puts, removes and lookups racing each other and a background resize.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use lockweave::builder::MapBuilder;
use lockweave::store::{ConcurrentHashMap, ResizeMode};

const THREADS: usize = 8;

// ==============================================
// Growth
// ==============================================

mod growth {
    use super::*;

    #[test]
    fn twenty_five_puts_into_four_buckets_grow_the_table() {
        common::initialize_logger();
        let map = ConcurrentHashMap::new(4);
        for i in 0..25 {
            map.put(format!("key-{i}"), i);
        }
        map.wait_for_resize();

        assert!(map.capacity() > 4, "capacity stayed at {}", map.capacity());
        assert_eq!(map.len(), 25);
        map.check_invariants().unwrap();
    }

    #[test]
    fn resize_preserves_key_set() {
        common::initialize_logger();
        let map = MapBuilder::new(1)
            .resize_mode(ResizeMode::Inline)
            .build::<u64, u64>()
            .unwrap();
        for i in 0..6 {
            map.put(i, i * i);
        }
        let before: HashSet<_> = map.entries().into_iter().collect();
        let capacity = map.capacity();

        // the seventh put sees 6 / 1 > 5 and grows first
        map.put(100, 0);
        map.remove(&100);
        assert!(map.capacity() > capacity);

        let after: HashSet<_> = map.entries().into_iter().collect();
        assert_eq!(before, after);
        map.check_invariants().unwrap();
    }

    #[test]
    fn repeated_growth_under_concurrent_puts() {
        common::initialize_logger();
        let per_thread = 2_000u64;
        let map = Arc::new(ConcurrentHashMap::new(2));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS as u64)
            .map(|t| {
                let map = Arc::clone(&map);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..per_thread {
                        let key = t * per_thread + i;
                        assert_eq!(map.put(key, key), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        map.wait_for_resize();

        let total = THREADS as u64 * per_thread;
        assert_eq!(map.len() as u64, total);
        assert!(map.capacity() > 2);
        for key in (0..total).step_by(97) {
            assert_eq!(map.get(&key), Some(key));
        }
        map.check_invariants().unwrap();
    }

    #[test]
    fn dropping_map_with_resize_in_flight_is_clean() {
        for _ in 0..20 {
            let map = ConcurrentHashMap::new(1);
            for i in 0..200u32 {
                map.put(i, i);
            }
            drop(map);
        }
    }
}

// ==============================================
// Racing mutations
// ==============================================

mod racing_mutations {
    use super::*;

    #[test]
    fn racing_puts_of_same_key_never_duplicate() {
        for _ in 0..50 {
            let map = Arc::new(ConcurrentHashMap::new(4));
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let map = Arc::clone(&map);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        map.put("shared", t);
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(map.len(), 1);
            assert_eq!(map.keys(), vec!["shared"]);
            map.check_invariants().unwrap();
        }
    }

    #[test]
    fn concurrent_put_and_remove_keep_len_exact() {
        common::initialize_logger();
        let map = Arc::new(ConcurrentHashMap::new(8));
        let keys_per_thread = 1_000usize;
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let map = Arc::clone(&map);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let base = t * keys_per_thread;
                    for i in 0..keys_per_thread {
                        map.put(base + i, i);
                    }
                    // remove the odd half of this thread's keys
                    for i in (1..keys_per_thread).step_by(2) {
                        assert_eq!(map.remove(&(base + i)), Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        map.wait_for_resize();

        assert_eq!(map.len(), THREADS * keys_per_thread / 2);
        for t in 0..THREADS {
            let base = t * keys_per_thread;
            assert!(map.contains_key(&base));
            assert!(!map.contains_key(&(base + 1)));
        }
        map.check_invariants().unwrap();
    }

    #[test]
    fn readers_see_values_while_writers_update() {
        let map = Arc::new(ConcurrentHashMap::new(16));
        for key in 0..64u32 {
            map.put(key, 0u32);
        }
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let map = Arc::clone(&map);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for round in 0..500u32 {
                        let key = round % 64;
                        if t % 2 == 0 {
                            map.put(key, round);
                        } else {
                            assert!(map.get(&key).is_some(), "key {key} vanished");
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), 64);
        map.check_invariants().unwrap();
    }
}
