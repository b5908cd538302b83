//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check counters, capacity and eviction order against a
//! simple model of the store.

use proptest::prelude::*;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::CacheStore;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_MAX_MEMORY: usize = 1024 * 1024;
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Small key space so sequences revisit keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

fn new_store(max_entries: usize) -> CacheStore<String> {
    CacheStore::new(max_entries, TEST_MAX_MEMORY, TEST_DEFAULT_TTL)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses match what the caller observed
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut store = new_store(TEST_MAX_ENTRIES);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => store.set(key, value),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Invalidate { key } => {
                    store.invalidate(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.size, store.len(), "Size mismatch");
    }

    // Most recent write wins
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let mut store = new_store(TEST_MAX_ENTRIES);

        store.set(key.clone(), value1);
        store.set(key.clone(), value2.clone());

        prop_assert_eq!(store.get(&key), Some(value2));
        prop_assert_eq!(store.len(), 1);
    }

    // Size never exceeds the cap, and each eviction removes the least
    // recently accessed key according to a reference model
    #[test]
    fn prop_capacity_and_lru_order(
        ops in prop::collection::vec(cache_op_strategy(), 1..200),
        max_entries in 1usize..8
    ) {
        let mut store = new_store(max_entries);
        // keys ordered oldest access first
        let mut model: Vec<String> = Vec::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    if let Some(pos) = model.iter().position(|k| *k == key) {
                        model.remove(pos);
                    } else if model.len() >= max_entries {
                        let evicted = model.remove(0);
                        store.set(key.clone(), value);
                        prop_assert!(!store.contains_key(&evicted), "expected {} evicted", evicted);
                        model.push(key);
                        prop_assert!(store.len() <= max_entries);
                        continue;
                    }
                    store.set(key.clone(), value);
                    model.push(key);
                }
                CacheOp::Get { key } => {
                    let found = store.get(&key).is_some();
                    let pos = model.iter().position(|k| *k == key);
                    prop_assert_eq!(found, pos.is_some());
                    if let Some(pos) = pos {
                        let k = model.remove(pos);
                        model.push(k);
                    }
                }
                CacheOp::Invalidate { key } => {
                    store.invalidate(&key);
                    model.retain(|k| *k != key);
                }
            }
            prop_assert!(store.len() <= max_entries);
            prop_assert_eq!(store.len(), model.len());
        }
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // Entries are readable before their TTL and gone after it
    #[test]
    fn prop_ttl_expiration_behavior(key in key_strategy(), value in value_strategy()) {
        let mut store = new_store(TEST_MAX_ENTRIES);

        store.set_with_ttl(key.clone(), value.clone(), Duration::from_millis(40));
        prop_assert_eq!(store.get(&key), Some(value));

        sleep(Duration::from_millis(70));

        prop_assert_eq!(store.get(&key), None);
        prop_assert!(!store.contains_key(&key));
    }
}
