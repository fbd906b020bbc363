/*
 * Created on Mon Apr 10 2023
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

//! # Actions
//!
//! One module per opcode family. Every action takes the engine and its
//! parsed arguments and produces a [`Response`] or an [`ActionError`];
//! actions are plain synchronous functions because command execution never
//! suspends -- only the connection's I/O does

pub mod count;
pub mod del;
pub mod get;
pub mod incdec;
pub mod keys;
pub mod lock;
pub mod meta;
pub mod set;
pub mod stats;
pub mod sys;
pub mod ttl;

use crate::corestore::StoreError;
use crate::protocol::responses::Response;
use bytes::Bytes;

#[derive(Debug, PartialEq)]
pub enum ActionError {
    NotFound,
    NotANumber,
    Locked,
    OutOfMemory,
    /// Well-formed frame, unacceptable arguments (bounds, unknown field).
    /// Becomes a generic error reply
    Invalid,
    /// Argument count not matching the opcode. The framing itself is
    /// broken, so the connection is torn down without a reply
    Malformed,
}

impl ActionError {
    /// The reply for every error that gets one. [`ActionError::Malformed`]
    /// never reaches serialization -- the dispatcher drops the client first
    pub const fn as_response(&self) -> Response {
        match self {
            ActionError::NotFound => Response::NotFound,
            ActionError::NotANumber => Response::NotANumber,
            ActionError::Locked => Response::Locked,
            ActionError::OutOfMemory => Response::OutOfMemory,
            ActionError::Invalid | ActionError::Malformed => Response::Err,
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OutOfMemory => ActionError::OutOfMemory,
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

/// Bail out with [`ActionError::Malformed`] unless the argument count
/// satisfies the predicate
pub fn ensure_length(len: usize, is_valid: fn(usize) -> bool) -> ActionResult<()> {
    if is_valid(len) {
        Ok(())
    } else {
        Err(ActionError::Malformed)
    }
}

/// An iterator over a query's argument blobs
pub struct ActionIter {
    inner: std::vec::IntoIter<Bytes>,
}

impl ActionIter {
    pub fn new(args: Vec<Bytes>) -> Self {
        Self {
            inner: args.into_iter(),
        }
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
    /// The next argument; running dry here means the arity check upstream
    /// was wrong, which is a framing violation
    pub fn next_arg(&mut self) -> ActionResult<Bytes> {
        self.inner.next().ok_or(ActionError::Malformed)
    }
}

impl Iterator for ActionIter {
    type Item = Bytes;
    fn next(&mut self) -> Option<Bytes> {
        self.inner.next()
    }
}

/// Parse a decimal argument (TTL windows, lock windows)
pub fn parse_seconds(raw: &[u8]) -> ActionResult<u64> {
    core::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or(ActionError::NotANumber)
}
