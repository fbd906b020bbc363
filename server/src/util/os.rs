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

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds. Clocks before the epoch collapse to 0
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(unix)]
pub use unix::*;

#[cfg(unix)]
mod unix {
    use crate::IoResult;
    use std::io::Error as IoError;
    use std::os::unix::io::RawFd;

    /// Total physical memory visible to the process, per `sysconf`. Returns
    /// `usize::MAX` when the probe is unavailable so that callers never
    /// clamp against a bogus zero
    pub fn available_memory() -> usize {
        unsafe {
            let pages = libc::sysconf(libc::_SC_PHYS_PAGES);
            let page_size = libc::sysconf(libc::_SC_PAGE_SIZE);
            if pages <= 0 || page_size <= 0 {
                usize::MAX
            } else {
                (pages as usize).saturating_mul(page_size as usize)
            }
        }
    }

    fn setsockopt(fd: RawFd, level: i32, option: i32, value: i32) -> IoResult<()> {
        let ret = unsafe {
            libc::setsockopt(
                fd,
                level,
                option,
                &value as *const i32 as *const libc::c_void,
                core::mem::size_of::<i32>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            Err(IoError::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Arm TCP keepalive probes on the socket, starting after `idle_secs`
    /// of silence
    pub fn set_tcp_keepalive(fd: RawFd, idle_secs: u64) -> IoResult<()> {
        setsockopt(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;
        #[cfg(target_os = "linux")]
        {
            let idle = idle_secs.min(i32::MAX as u64) as i32;
            setsockopt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, idle.max(1))?;
            // probe at a third of the idle window
            let interval = (idle / 3).max(1);
            setsockopt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, interval)?;
            setsockopt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 3)?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = idle_secs;
        Ok(())
    }

    /// Dead clients are reaped by the server itself, so `SIGHUP` and
    /// `SIGPIPE` carry no information for us
    pub fn ignore_termination_noise() {
        unsafe {
            libc::signal(libc::SIGHUP, libc::SIG_IGN);
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }
    }

    /// Fork into the background: the parent exits, the child gets a fresh
    /// session and its standard streams pointed at `/dev/null`.
    ///
    /// Must run before the async runtime is built
    pub fn daemonize() -> IoResult<()> {
        unsafe {
            match libc::fork() {
                -1 => return Err(IoError::last_os_error()),
                0 => (),
                _ => libc::_exit(0),
            }
            if libc::setsid() == -1 {
                return Err(IoError::last_os_error());
            }
            let fd = libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_RDWR);
            if fd != -1 {
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::dup2(fd, libc::STDOUT_FILENO);
                libc::dup2(fd, libc::STDERR_FILENO);
                if fd > libc::STDERR_FILENO {
                    libc::close(fd);
                }
            }
        }
        Ok(())
    }
}

#[cfg(not(unix))]
pub fn available_memory() -> usize {
    usize::MAX
}

#[cfg(not(unix))]
pub fn ignore_termination_noise() {}
