/*
 * Created on Sun Apr 16 2023
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

//! # The maintenance cron
//!
//! A single timer task on the same thread as everything else. Every tick
//! refreshes the engine clock; the heavier jobs run on coarse multiples of
//! the base period. Because the whole core is cooperatively scheduled, a
//! cron pass and a command can never observe each other half-done

use crate::corestore::CoreHandle;
use crate::dbnet::Terminator;
use libbramble::util::{format_duration, format_memory};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// TTL sweep cadence (ms)
const EXPIRY_EVERY_MS: u64 = 15_000;
/// Memory pressure check cadence (ms)
const PRESSURE_EVERY_MS: u64 = 5_000;
/// Stats line cadence (ms)
const REPORT_EVERY_MS: u64 = 15_000;

/// Drive the maintenance loop until the termination signal
pub async fn cron_scheduler(store: CoreHandle, period_ms: u64, mut terminator: Terminator) {
    let period_ms = period_ms.max(1);
    let mut interval = time::interval(Duration::from_millis(period_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while !terminator.is_termination_signal() {
        tokio::select! {
            _ = interval.tick() => run_tick(&store, period_ms),
            _ = terminator.receive_signal() => break,
        }
    }
    log::info!("Maintenance service has exited");
}

fn run_tick(store: &CoreHandle, period_ms: u64) {
    let mut store = store.borrow_mut();
    store.set_time(crate::util::os::unix_now());
    let ticks_done = store.stats.cron_runs;

    cron_every!(EXPIRY_EVERY_MS, period_ms, ticks_done, {
        let freed = store.expire_tick();
        if freed > 0 {
            log::info!(
                "Freed {} of expired data, {} items left.",
                format_memory(freed),
                store.stats.item_count
            );
        }
    });

    cron_every!(PRESSURE_EVERY_MS, period_ms, ticks_done, {
        if store.stats.mem_used > store.limits.max_memory {
            log::warn!(
                "Max memory exhausted, trying to free data that was not accessed in the last {}s.",
                store.gc_ratio
            );
            let freed = store.evict_tick();
            log::info!(
                "Freed {}, left {} items.",
                format_memory(freed),
                store.stats.item_count
            );
        }
    });

    cron_every!(REPORT_EVERY_MS, period_ms, ticks_done, {
        let stats = &store.stats;
        log::info!(
            "MEM {}/{} - CLIENTS {} - OBJECTS {} ( {} COMPRESSED ) - UPTIME {}",
            format_memory(stats.mem_used),
            format_memory(store.limits.max_memory),
            stats.client_count,
            stats.item_count,
            stats.compressed_count,
            format_duration(stats.time.saturating_sub(stats.started))
        );
    });

    store.stats.cron_runs += 1;
}

#[cfg(test)]
mod tests {
    use crate::corestore::tests::test_store;
    use crate::corestore::Item;
    use bytes::Bytes;

    #[test]
    fn test_expiry_pass_reclaims_lapsed_items() {
        let mut store = test_store();
        let now = store.now();
        let mut item = Item::new(Bytes::from_static(b"v"), 0, now);
        item.set_ttl(now, 2);
        store.insert(b"tmp", item).unwrap();
        store
            .insert(b"perm", Item::new(Bytes::from_static(b"v"), 0, now))
            .unwrap();
        store.set_time(now + 3);
        assert!(store.expire_tick() > 0);
        assert_eq!(store.stats.item_count, 1);
    }

    #[test]
    fn test_pressure_pass_is_stale_only() {
        let mut store = test_store();
        store.limits.max_memory = 1; // force pressure
        let now = store.now();
        store
            .insert(b"fresh", Item::new(Bytes::from_static(b"v"), 0, now))
            .unwrap_err();
        // over budget with nothing stored: the pass has nothing to free
        assert_eq!(store.evict_tick(), 0);
    }
}
