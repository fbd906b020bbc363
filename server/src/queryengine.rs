/*
 * Created on Thu Apr 13 2023
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

//! # The Query Engine

use crate::actions::{self, ActionError, ActionIter};
use crate::corestore::Corestore;
use crate::protocol::{opcode, responses::Response, Query};

#[derive(Debug, PartialEq)]
/// A reply and what to do with the session afterwards
pub struct Reply {
    pub response: Response,
    /// drain the reply, then close (the `END` opcode)
    pub close: bool,
}

#[derive(Debug, PartialEq)]
/// The query was structurally unacceptable: unknown opcode or an argument
/// count no opcode takes. No reply is owed; the connection goes away
pub struct ProtocolViolation;

/// A match generator for the opcode table: pairs of `opcode => action`
/// expand to the dispatch arms, and anything unmatched is a protocol
/// violation
macro_rules! gen_match {
    ($opc:expr, $store:expr, $act:expr, $($x:path => $y:path),* $(,)?) => {
        match $opc {
            $($x => $y($store, $act),)*
            _ => Err(ActionError::Malformed),
        }
    };
}

/// Execute one parsed query against the engine
pub fn execute(store: &mut Corestore, query: Query) -> Result<Reply, ProtocolViolation> {
    let now = store.stats.time;
    if store.stats.first_query_at == 0 {
        store.stats.first_query_at = now;
    }
    store.stats.last_query_at = now;
    let opc = query.opcode();
    let act = ActionIter::new(query.into_args());
    let result = gen_match!(
        opc,
        store,
        act,
        opcode::SET => actions::set::set,
        opcode::TTL => actions::ttl::ttl,
        opcode::GET => actions::get::get,
        opcode::DEL => actions::del::del,
        opcode::INC => actions::incdec::inc,
        opcode::DEC => actions::incdec::dec,
        opcode::LOCK => actions::lock::lock,
        opcode::UNLOCK => actions::lock::unlock,
        opcode::MSET => actions::set::mset,
        opcode::MTTL => actions::ttl::mttl,
        opcode::MGET => actions::get::mget,
        opcode::MDEL => actions::del::mdel,
        opcode::MINC => actions::incdec::minc,
        opcode::MDEC => actions::incdec::mdec,
        opcode::MLOCK => actions::lock::mlock,
        opcode::MUNLOCK => actions::lock::munlock,
        opcode::COUNT => actions::count::count,
        opcode::STATS => actions::stats::stats,
        opcode::PING => actions::sys::ping,
        opcode::META => actions::meta::meta,
        opcode::KEYS => actions::keys::keys,
        opcode::TIME => actions::sys::time,
        opcode::END => actions::sys::end,
    );
    match result {
        Ok(response) => Ok(Reply {
            response,
            close: opc == opcode::END,
        }),
        Err(ActionError::Malformed) => Err(ProtocolViolation),
        Err(e) => Ok(Reply {
            response: e.as_response(),
            close: false,
        }),
    }
}
