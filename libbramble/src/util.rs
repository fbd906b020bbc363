/*
 * Created on Wed Mar 15 2023
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

/// Render a byte count with a binary-scaled suffix, `1.5KB` style
pub fn format_memory(bytes: usize) -> String {
    const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut scaled = bytes as f64;
    let mut idx = 0;
    while idx < SUFFIXES.len() - 1 && scaled >= 1024.0 {
        scaled /= 1024.0;
        idx += 1;
    }
    format!("{:.1}{}", scaled, SUFFIXES[idx])
}

/// Render a second count as `1d 2h 3m 4s`, omitting leading zero fields
pub fn format_duration(mut secs: u64) -> String {
    let days = secs / 86400;
    secs %= 86400;
    let hours = secs / 3600;
    secs %= 3600;
    let mins = secs / 60;
    secs %= 60;
    if days > 0 {
        format!("{days}d {hours}h {mins}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

pub mod terminal {
    //! Colored writes for the few lines the server prints directly to the
    //! terminal (startup goodbyes, pre-logger configuration failures)
    use std::fmt;
    use std::io::Write;
    use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

    fn write_with_col<T: fmt::Display>(item: T, color: Color) -> fmt::Result {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        stdout
            .set_color(ColorSpec::new().set_fg(Some(color)))
            .map_err(|_| fmt::Error)?;
        write!(&mut stdout, "{}", item).map_err(|_| fmt::Error)?;
        stdout.reset().map_err(|_| fmt::Error)
    }
    pub fn write_info<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Color::Cyan)
    }
    pub fn write_error<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Color::Red)
    }
}
