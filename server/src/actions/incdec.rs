/*
 * Created on Tue Apr 11 2023
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

//! # `INC`/`DEC` and their subtree forms
//!
//! A plain value that parses as an integer is pulled into the numeric
//! encoding domain by its first increment and stays there

use super::{ensure_length, ActionIter, ActionError, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::Response;

pub fn inc(store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    step(store, act, 1)
}

pub fn dec(store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    step(store, act, -1)
}

pub fn minc(store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    mstep(store, act, 1)
}

pub fn mdec(store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    mstep(store, act, -1)
}

fn step(store: &mut Corestore, mut act: ActionIter, delta: i64) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let key = act.next_arg()?;
    let now = store.now();
    let current = match store.lookup(&key) {
        None => return Err(ActionError::NotFound),
        Some(item) if item.is_locked(now) => return Err(ActionError::Locked),
        Some(item) => item.parse_number().ok_or(ActionError::NotANumber)?,
    };
    let next = current.checked_add(delta).ok_or(ActionError::NotANumber)?;
    store.renumber(&key, next)?;
    Ok(Response::number(next))
}

fn mstep(store: &mut Corestore, mut act: ActionIter, delta: i64) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let prefix = act.next_arg()?;
    let now = store.now();
    // first pass collects the numeric, unlocked keys; the second applies
    // the delta through the accounting-aware path
    let mut targets: Vec<(Vec<u8>, i64)> = Vec::new();
    store.visit_prefix_mut(&prefix, |key, item| {
        if !item.is_locked(now) {
            if let Some(n) = item.parse_number() {
                targets.push((key.to_vec(), n));
            }
        }
        false
    });
    let mut modified = 0i64;
    for (key, current) in targets {
        if let Some(next) = current.checked_add(delta) {
            if store.renumber(&key, next).is_ok() {
                modified += 1;
            }
        }
    }
    Ok(Response::number(modified))
}
