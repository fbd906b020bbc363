/*
 * Created on Wed Apr 12 2023
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

//! Administrative one-liners: `PING`, `TIME` and `END`

use super::{ensure_length, ActionIter, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::Response;

pub fn ping(_store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 0)?;
    Ok(Response::Okay)
}

pub fn time(store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 0)?;
    Ok(Response::number(store.now() as i64))
}

/// `END` acknowledges and asks the session to close once the reply has
/// drained; the dispatcher carries the flag
pub fn end(_store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 0)?;
    Ok(Response::Okay)
}
