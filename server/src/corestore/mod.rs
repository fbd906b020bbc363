/*
 * Created on Sat Apr 08 2023
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

//! # The in-memory engine
//!
//! [`Corestore`] owns the key index, the statistics and the limits, and is
//! the single object the dispatcher and the maintenance cron share. The
//! whole core is single-threaded, so the shared handle is an
//! `Rc<RefCell<_>>`: borrows live for the length of one command or one
//! cron tick and are never held across an await point

pub mod item;
#[cfg(test)]
pub mod tests;
pub mod trie;

pub use item::{Item, ITEM_OVERHEAD};
pub use trie::{Trie, Verdict};

use std::{cell::RefCell, rc::Rc};

/// The shared handle to the engine
pub type CoreHandle = Rc<RefCell<Corestore>>;

#[derive(Debug, PartialEq)]
/// Engine-level write failures
pub enum StoreError {
    /// The write would push `mem_used` past the budget; nothing was changed
    OutOfMemory,
}

#[derive(Debug, Clone)]
/// Operational bounds, fixed at startup from the configuration
pub struct Limits {
    pub max_idletime: u64,
    pub max_clients: usize,
    pub max_request_size: usize,
    pub max_response_size: usize,
    pub max_memory: usize,
    pub max_item_ttl: u64,
    pub max_key_size: usize,
    pub max_value_size: usize,
}

#[derive(Debug, Default)]
/// Server statistics. `time` is the engine's clock: refreshed by the cron
/// every tick and read by every command, so commands never syscall for it
pub struct Stats {
    pub started: u64,
    pub time: u64,
    pub mem_used: usize,
    pub mem_peak: usize,
    pub mem_available: usize,
    pub item_count: usize,
    pub compressed_count: usize,
    pub client_count: usize,
    pub cron_runs: u64,
    pub first_query_at: u64,
    pub last_query_at: u64,
}

#[derive(Debug)]
pub struct Corestore {
    tree: Trie,
    pub stats: Stats,
    pub limits: Limits,
    /// byte threshold above which values are handed to the compressor
    pub compression: usize,
    /// idle seconds after which an item becomes evictable under pressure
    pub gc_ratio: u64,
}

impl Corestore {
    pub fn new(
        limits: Limits,
        compression: usize,
        gc_ratio: u64,
        now: u64,
        mem_available: usize,
    ) -> Self {
        Corestore {
            tree: Trie::new(),
            stats: Stats {
                started: now,
                time: now,
                mem_available,
                ..Stats::default()
            },
            limits,
            compression,
            gc_ratio,
        }
    }

    pub const fn now(&self) -> u64 {
        self.stats.time
    }
    pub fn set_time(&mut self, now: u64) {
        self.stats.time = now;
    }
    pub fn key_ok(&self, key: &[u8]) -> bool {
        !key.is_empty() && key.len() <= self.limits.max_key_size
    }
    pub fn clamp_ttl(&self, ttl: u64) -> u64 {
        if self.limits.max_item_ttl > 0 {
            ttl.min(self.limits.max_item_ttl)
        } else {
            ttl
        }
    }

    fn account_insert(&mut self, cost: usize, compressed: bool) {
        self.stats.mem_used += cost;
        self.stats.mem_peak = self.stats.mem_peak.max(self.stats.mem_used);
        self.stats.item_count += 1;
        self.stats.compressed_count += compressed as usize;
    }
    fn account_remove(&mut self, cost: usize, compressed: bool) {
        self.stats.mem_used = self.stats.mem_used.saturating_sub(cost);
        self.stats.item_count = self.stats.item_count.saturating_sub(1);
        self.stats.compressed_count -= compressed as usize;
    }

    /// Find the live item for an exact key. An item whose TTL has lapsed is
    /// dropped on the spot and reported as absent: the cron is the eventual
    /// guarantee, this is the immediate one
    pub fn lookup(&mut self, key: &[u8]) -> Option<&mut Item> {
        let now = self.stats.time;
        if self.tree.get(key).is_some_and(|it| it.is_expired(now)) {
            self.remove(key);
            return None;
        }
        self.tree.get_mut(key)
    }

    /// Insert or replace, enforcing the memory budget before anything is
    /// touched (so a refusal needs no rollback)
    pub fn insert(&mut self, key: &[u8], item: Item) -> Result<(), StoreError> {
        let new_cost = item.cost(key.len());
        let old_cost = self
            .tree
            .get(key)
            .map(|old| old.cost(key.len()))
            .unwrap_or(0);
        if self.stats.mem_used.saturating_sub(old_cost) + new_cost > self.limits.max_memory {
            return Err(StoreError::OutOfMemory);
        }
        let compressed = item.is_compressed();
        if let Some(old) = self.tree.insert(key, item) {
            self.account_remove(old.cost(key.len()), old.is_compressed());
        }
        self.account_insert(new_cost, compressed);
        Ok(())
    }

    /// Detach a key, settling the accounting
    pub fn remove(&mut self, key: &[u8]) -> Option<Item> {
        let item = self.tree.remove(key)?;
        self.account_remove(item.cost(key.len()), item.is_compressed());
        Some(item)
    }

    /// Re-store an existing key's value as a number (the INC/DEC path),
    /// keeping its TTL baseline and lock state. Absent keys are a no-op
    pub fn renumber(&mut self, key: &[u8], value: i64) -> Result<(), StoreError> {
        let now = self.stats.time;
        let max_memory = self.limits.max_memory;
        let mem_used = self.stats.mem_used;
        let new_cost = Item::cost_of(key.len(), value.to_string().len());
        let Some(item) = self.tree.get_mut(key) else {
            return Ok(());
        };
        let old_cost = item.cost(key.len());
        if mem_used.saturating_sub(old_cost) + new_cost > max_memory {
            return Err(StoreError::OutOfMemory);
        }
        let was_compressed = item.is_compressed();
        item.store_number(value, now);
        self.stats.mem_used = mem_used.saturating_sub(old_cost) + new_cost;
        self.stats.mem_peak = self.stats.mem_peak.max(self.stats.mem_used);
        self.stats.compressed_count -= was_compressed as usize;
        Ok(())
    }

    /// Number of live items under a prefix
    pub fn count_prefix(&self, prefix: &[u8]) -> usize {
        let now = self.stats.time;
        let mut n = 0;
        self.tree.for_each(prefix, |_, item| {
            n += !item.is_expired(now) as usize;
        });
        n
    }

    /// Visit every live item under a prefix with mutable access; the
    /// visitor reports whether it modified the item and the count of
    /// modifications is returned. Expired items encountered on the way are
    /// dropped, not shown
    pub fn visit_prefix_mut<F>(&mut self, prefix: &[u8], mut visit: F) -> usize
    where
        F: FnMut(&[u8], &mut Item) -> bool,
    {
        let now = self.stats.time;
        let mut modified = 0;
        let mut dead: Vec<Vec<u8>> = Vec::new();
        self.tree.for_each_mut(prefix, |key, item| {
            if item.is_expired(now) {
                dead.push(key.to_vec());
            } else if visit(key, item) {
                modified += 1;
            }
        });
        for key in dead {
            self.remove(&key);
        }
        modified
    }

    /// Delete every live, unlocked item under a prefix. Returns how many
    /// went (expired stragglers are reclaimed but not counted)
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let now = self.stats.time;
        let dropped = self.tree.sweep(prefix, |_, item| {
            if item.is_locked(now) {
                Verdict::Keep
            } else {
                Verdict::Drop
            }
        });
        let mut deleted = 0;
        for (key, item) in dropped {
            deleted += !item.is_expired(now) as usize;
            self.account_remove(item.cost(key.len()), item.is_compressed());
        }
        deleted
    }

    /// One full TTL pass: drop everything whose window has lapsed. Returns
    /// the number of bytes freed
    pub fn expire_tick(&mut self) -> usize {
        let now = self.stats.time;
        let dropped = self.tree.sweep(&[], |_, item| {
            if item.is_expired(now) {
                Verdict::Drop
            } else {
                Verdict::Keep
            }
        });
        self.settle(dropped)
    }

    /// One memory-pressure pass: drop everything idle for at least
    /// `gc_ratio` seconds. Fresh items are never touched, even if the
    /// budget stays blown. Returns the number of bytes freed
    pub fn evict_tick(&mut self) -> usize {
        let now = self.stats.time;
        let stale_after = self.gc_ratio;
        let dropped = self.tree.sweep(&[], |_, item| {
            let idle = now.saturating_sub(item.last_access());
            if idle > 0 && idle >= stale_after {
                Verdict::Drop
            } else {
                Verdict::Keep
            }
        });
        self.settle(dropped)
    }

    fn settle(&mut self, dropped: Vec<(Vec<u8>, Item)>) -> usize {
        let mut freed = 0;
        for (key, item) in dropped {
            let cost = item.cost(key.len());
            freed += cost;
            self.account_remove(cost, item.is_compressed());
        }
        freed
    }
}
