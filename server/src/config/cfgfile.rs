/*
 * Created on Mon Apr 17 2023
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

use serde::Deserialize;
use std::net::IpAddr;

/// The _object representation_ of the YAML configuration file. Every key
/// is optional; whatever is missing falls back to the defaults in the
/// parent module
#[derive(Deserialize, Debug, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Unix socket path; when set it wins over address/port
    pub(super) unix_socket: Option<String>,
    pub(super) address: Option<IpAddr>,
    pub(super) port: Option<u16>,
    pub(super) logfile: Option<String>,
    pub(super) loglevel: Option<String>,
    /// flush the logfile sink every this many records
    pub(super) logflushrate: Option<usize>,
    pub(super) max_idletime: Option<u64>,
    pub(super) max_clients: Option<usize>,
    pub(super) max_request_size: Option<usize>,
    pub(super) max_response_size: Option<usize>,
    pub(super) max_memory: Option<usize>,
    pub(super) max_item_ttl: Option<u64>,
    pub(super) max_key_size: Option<usize>,
    pub(super) max_value_size: Option<usize>,
    pub(super) compression: Option<usize>,
    pub(super) gc_ratio: Option<u64>,
    pub(super) cron_period: Option<u64>,
    pub(super) daemonize: Option<bool>,
    pub(super) pidfile: Option<String>,
}
