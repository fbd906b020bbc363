/*
 * Created on Tue Apr 18 2023
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

//! Logger wiring: stderr by default, a file sink when `logfile` is set.
//! The `BRAMBLE_LOG` environment variable overrides the configured level

use crate::config::ConfigurationSet;
use env_logger::{Builder, Target};
use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};

/// A writer that flushes after every `every` records rather than on each
/// one; `logflushrate` trades durability of the tail for throughput
struct FlushRate<W: Write> {
    inner: W,
    every: usize,
    pending: usize,
}

impl<W: Write> FlushRate<W> {
    fn new(inner: W, every: usize) -> Self {
        Self {
            inner,
            every: every.max(1),
            pending: 0,
        }
    }
}

impl<W: Write> Write for FlushRate<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        // env_logger hands over one record per write call
        self.pending += 1;
        if self.pending >= self.every {
            self.inner.flush()?;
            self.pending = 0;
        }
        Ok(written)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.pending = 0;
        self.inner.flush()
    }
}

pub fn init(cfg: &ConfigurationSet) {
    let mut builder = Builder::new();
    builder.parse_filters(&env::var("BRAMBLE_LOG").unwrap_or_else(|_| cfg.loglevel.clone()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });
    if let Some(path) = &cfg.logfile {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(FlushRate::new(
                    file,
                    cfg.logflushrate,
                ))));
            }
            Err(e) => {
                eprintln!("Failed to open logfile '{path}': {e}; logging to stderr instead");
            }
        }
    }
    builder.init();
}
