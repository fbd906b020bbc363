/*
 * Created on Sun Apr 09 2023
 *
 * This file is a part of Bramble
 * Bramble is a free and open-source in-memory cache server written by
 * Sayan Nandan ("the Author") that keeps keys in a prefix tree so that
 * entire families of keys can be read, rewritten and expired together.
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use super::{Corestore, Item, Limits, StoreError};
use bytes::Bytes;
use rand::{seq::SliceRandom, Rng};
use std::collections::BTreeMap;

pub(crate) fn test_limits() -> Limits {
    Limits {
        max_idletime: 30,
        max_clients: 16,
        max_request_size: 1024 * 1024,
        max_response_size: 1024 * 1024,
        max_memory: 64 * 1024 * 1024,
        max_item_ttl: 0,
        max_key_size: 255,
        max_value_size: 1024 * 1024,
    }
}

pub(crate) fn test_store() -> Corestore {
    Corestore::new(test_limits(), 0, 600, 1000, usize::MAX)
}

fn put(store: &mut Corestore, key: &[u8], value: &[u8]) {
    let now = store.now();
    let item = Item::new(Bytes::copy_from_slice(value), store.compression, now);
    store.insert(key, item).unwrap();
}

#[test]
fn test_item_count_tracks_inserts_and_removes() {
    let mut store = test_store();
    put(&mut store, b"a", b"1");
    put(&mut store, b"b", b"2");
    put(&mut store, b"a", b"3"); // replace, not a new item
    assert_eq!(store.stats.item_count, 2);
    assert!(store.remove(b"a").is_some());
    assert_eq!(store.stats.item_count, 1);
    assert!(store.remove(b"a").is_none());
    assert_eq!(store.stats.item_count, 1);
}

#[test]
fn test_memory_accounting_returns_to_zero() {
    let mut store = test_store();
    assert_eq!(store.stats.mem_used, 0);
    put(&mut store, b"a", b"payload");
    put(&mut store, b"bb", b"more payload");
    assert!(store.stats.mem_used > 0);
    store.remove(b"a");
    store.remove(b"bb");
    assert_eq!(store.stats.mem_used, 0);
    assert_eq!(store.stats.item_count, 0);
}

#[test]
fn test_replace_destroys_old_accounting() {
    let mut store = test_store();
    put(&mut store, b"k", &[b'x'; 1000]);
    let big = store.stats.mem_used;
    put(&mut store, b"k", b"small");
    assert!(store.stats.mem_used < big);
    assert_eq!(store.stats.item_count, 1);
}

#[test]
fn test_budget_refusal_changes_nothing() {
    let mut limits = test_limits();
    limits.max_memory = Item::cost_of(1, 8) + 8;
    let mut store = Corestore::new(limits, 0, 600, 1000, usize::MAX);
    put(&mut store, b"a", b"12345678");
    let used = store.stats.mem_used;
    let item = Item::new(Bytes::from(vec![b'x'; 512]), 0, store.now());
    assert_eq!(store.insert(b"b", item), Err(StoreError::OutOfMemory));
    assert_eq!(store.stats.mem_used, used);
    assert_eq!(store.stats.item_count, 1);
    assert!(store.lookup(b"b").is_none());
}

#[test]
fn test_replace_within_budget_is_admitted() {
    // replacing a large value with another large value must account for the
    // bytes being released, not just the bytes arriving
    let mut limits = test_limits();
    limits.max_memory = Item::cost_of(1, 1000) + 100;
    let mut store = Corestore::new(limits, 0, 600, 1000, usize::MAX);
    put(&mut store, b"k", &[b'a'; 1000]);
    let item = Item::new(Bytes::from(vec![b'b'; 900]), 0, store.now());
    assert!(store.insert(b"k", item).is_ok());
}

#[test]
fn test_lazy_expiry_on_lookup() {
    let mut store = test_store();
    put(&mut store, b"tmp", b"v");
    store.lookup(b"tmp").unwrap().set_ttl(1000, 10);
    store.set_time(1005);
    assert!(store.lookup(b"tmp").is_some());
    store.set_time(1010);
    assert!(store.lookup(b"tmp").is_none());
    // the expired item is gone for real, accounting included
    assert_eq!(store.stats.item_count, 0);
    assert_eq!(store.stats.mem_used, 0);
}

#[test]
fn test_expire_tick_frees_only_lapsed() {
    let mut store = test_store();
    put(&mut store, b"keep", b"v");
    put(&mut store, b"dead:1", b"v");
    put(&mut store, b"dead:2", b"v");
    store.lookup(b"dead:1").unwrap().set_ttl(1000, 5);
    store.lookup(b"dead:2").unwrap().set_ttl(1000, 5);
    store.set_time(1006);
    let freed = store.expire_tick();
    assert!(freed > 0);
    assert_eq!(store.stats.item_count, 1);
    assert!(store.lookup(b"keep").is_some());
}

#[test]
fn test_eviction_spares_fresh_items() {
    let mut store = test_store();
    put(&mut store, b"fresh", b"v");
    store.set_time(1100); // idle 100 < gc_ratio 600
    assert_eq!(store.evict_tick(), 0);
    assert_eq!(store.stats.item_count, 1);
}

#[test]
fn test_eviction_strictly_reduces_memory_with_stale_items() {
    let mut store = test_store();
    put(&mut store, b"stale", b"v");
    put(&mut store, b"fresh", b"v");
    store.set_time(1700);
    store.lookup(b"fresh").unwrap().touch(1700);
    let before = store.stats.mem_used;
    let freed = store.evict_tick();
    assert!(freed > 0);
    assert!(store.stats.mem_used < before);
    assert!(store.lookup(b"fresh").is_some());
    assert!(store.lookup(b"stale").is_none());
}

#[test]
fn test_renumber_keeps_lifecycle_state() {
    let mut store = test_store();
    put(&mut store, b"n", b"10");
    store.lookup(b"n").unwrap().set_ttl(1000, 500);
    store.renumber(b"n", 11).unwrap();
    let item = store.lookup(b"n").unwrap();
    assert_eq!(&item.materialize().unwrap()[..], b"11");
    assert_eq!(item.ttl(), 500);
}

#[test]
fn test_delete_prefix_respects_locks() {
    let mut store = test_store();
    put(&mut store, b"a:1", b"v");
    put(&mut store, b"a:2", b"v");
    put(&mut store, b"b:1", b"v");
    store.lookup(b"a:1").unwrap().lock(1000, 0);
    assert_eq!(store.delete_prefix(b"a:"), 1);
    assert!(store.lookup(b"a:1").is_some());
    assert!(store.lookup(b"a:2").is_none());
    assert!(store.lookup(b"b:1").is_some());
}

#[test]
fn test_count_prefix_sees_live_only() {
    let mut store = test_store();
    put(&mut store, b"a:1", b"v");
    put(&mut store, b"a:2", b"v");
    store.lookup(b"a:2").unwrap().set_ttl(1000, 5);
    store.set_time(1010);
    assert_eq!(store.count_prefix(b"a:"), 1);
}

#[test]
fn test_random_ops_agree_with_model() {
    // drive the store and a BTreeMap model through the same random command
    // sequence; item_count, membership and prefix scans must agree
    let mut rng = rand::thread_rng();
    let mut store = test_store();
    let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    let prefixes: [&[u8]; 3] = [b"user:", b"sess:", b"cfg:"];
    for _ in 0..2000 {
        let prefix = *prefixes.choose(&mut rng).unwrap();
        let mut key = prefix.to_vec();
        key.extend_from_slice(rng.gen_range(0..50u32).to_string().as_bytes());
        match rng.gen_range(0..3) {
            0 | 1 => {
                let value: Vec<u8> = (0..rng.gen_range(1..32)).map(|_| rng.gen()).collect();
                let item = Item::new(Bytes::from(value.clone()), 0, store.now());
                store.insert(&key, item).unwrap();
                model.insert(key, value);
            }
            _ => {
                let in_store = store.remove(&key).is_some();
                let in_model = model.remove(&key).is_some();
                assert_eq!(in_store, in_model);
            }
        }
    }
    assert_eq!(store.stats.item_count, model.len());
    for (key, value) in &model {
        let item = store.lookup(key).unwrap();
        assert_eq!(&item.materialize().unwrap()[..], &value[..]);
    }
    for prefix in prefixes {
        let expected = model.keys().filter(|k| k.starts_with(prefix)).count();
        assert_eq!(store.count_prefix(prefix), expected, "prefix {prefix:?}");
    }
}

#[test]
fn test_random_churn_accounting_returns_to_zero() {
    let mut rng = rand::thread_rng();
    let mut store = test_store();
    let mut live: Vec<Vec<u8>> = Vec::new();
    for i in 0..500u32 {
        let key = format!("churn:{}", i % 100).into_bytes();
        let value: Vec<u8> = (0..rng.gen_range(1..256)).map(|_| rng.gen()).collect();
        let item = Item::new(Bytes::from(value), 0, store.now());
        store.insert(&key, item).unwrap();
        if !live.contains(&key) {
            live.push(key);
        }
    }
    for key in live {
        store.remove(&key);
    }
    assert_eq!(store.stats.item_count, 0);
    assert_eq!(store.stats.mem_used, 0);
    assert_eq!(store.stats.compressed_count, 0);
}
