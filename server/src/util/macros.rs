/*
 * Created on Tue Apr 04 2023
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

#[macro_export]
/// Evaluate an expression returning a `Result`; on `Err`, `continue` the
/// enclosing loop instead of propagating the error
macro_rules! skip_loop_err {
    ($expr:expr) => {
        match $expr {
            Ok(ret) => ret,
            Err(_) => continue,
        }
    };
}

#[macro_export]
/// Run a cron sub-task on a coarse multiple of the base tick. Sub-tasks with
/// a target period at or below the base period run on every tick
macro_rules! cron_every {
    ($every_ms:expr, $period_ms:expr, $ticks_done:expr, $block:block) => {
        if $every_ms <= $period_ms || $ticks_done % ($every_ms / $period_ms) == 0 $block
    };
}
