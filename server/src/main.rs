/*
 * Created on Wed Apr 19 2023
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

//! # Bramble
//!
//! The `brambled` crate is the Bramble cache server: an in-memory key/value
//! store whose keys live in a prefix tree, so any operation can address a
//! single key or a whole key family at once. See the modules for their
//! respective documentation

#[macro_use]
mod util;
mod actions;
mod config;
mod corestore;
mod dbnet;
mod logging;
mod protocol;
mod queryengine;
mod services;
#[cfg(test)]
mod tests;

use config::{ConfigType, ConfigurationSet};
use libbramble::util::terminal;
use libbramble::{URL, VERSION};
use std::fs;
use std::io::Write;
use std::process;

pub type IoResult<T> = std::io::Result<T>;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    let cfg = check_args_and_get_cfg();
    logging::init(&cfg);
    println!("Bramble v{} | {}", VERSION, URL);
    let cfg = clamp_memory(cfg);
    log_startup_settings(&cfg);

    if cfg.daemonize {
        #[cfg(unix)]
        if let Err(e) = util::os::daemonize() {
            log::error!("Startup failure: failed to daemonize: {}", e);
            process::exit(0x100);
        }
        #[cfg(not(unix))]
        log::warn!("daemonize is not available on this platform, staying in the foreground");
    }
    util::os::ignore_termination_noise();
    let pidfile = cfg.pidfile.clone();
    write_pidfile(pidfile.as_deref());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    // every task the server spawns is thread-local; this is what keeps the
    // engine single-threaded by construction
    let local = tokio::task::LocalSet::new();
    let result = local.block_on(&runtime, dbnet::run(cfg));
    drop(local);
    drop(runtime);

    match result {
        Ok(store) => {
            let store = store.borrow();
            log::info!("Stopped accepting incoming connections");
            log::info!(
                "Parting with {} items, peak memory {}",
                store.stats.item_count,
                libbramble::util::format_memory(store.stats.mem_peak)
            );
        }
        Err(e) => {
            log::error!("Server failed with: {}", e);
            process::exit(0x100);
        }
    }
    if let Some(path) = pidfile {
        if let Err(e) = fs::remove_file(&path) {
            log::error!("Shutdown failure: Failed to remove pid file: {}", e);
        }
    }
    let _ = terminal::write_info("Goodbye :)\n");
}

/// Read the command line and the configuration file, or print something
/// helpful to stderr and stop
fn check_args_and_get_cfg() -> ConfigurationSet {
    match config::get_config_file_or_return_cfg() {
        Ok(ConfigType::Custom(cfg, path)) => {
            println!("Using settings from {path}");
            cfg
        }
        Ok(ConfigType::Def(cfg)) => {
            println!("No configuration file supplied. Using default settings");
            cfg
        }
        Err(config::ConfigError::HelpRequested) => {
            println!("Bramble cache server v{}\n", VERSION);
            println!("brambled [-h|--help] [-c|--config FILE]\n");
            println!("  -h, --help          Print this help and exit.");
            println!("  -c, --config FILE   Set configuration file to load.");
            process::exit(0);
        }
        Err(e) => {
            let _ = terminal::write_error(format!("{e}\n"));
            process::exit(0x100);
        }
    }
}

/// A memory budget beyond what the machine has would make the eviction
/// pass meaningless, so drop an over-enthusiastic setting to half of what
/// is actually there
fn clamp_memory(mut cfg: ConfigurationSet) -> ConfigurationSet {
    let available = util::os::available_memory();
    if cfg.max_memory > available {
        let clamped = available / 2;
        log::warn!(
            "max_memory setting is higher than total available memory, dropping to {}.",
            libbramble::util::format_memory(clamped)
        );
        cfg.max_memory = clamped;
    }
    cfg
}

fn log_startup_settings(cfg: &ConfigurationSet) {
    use libbramble::util::format_memory;
    log::info!("Server starting ...");
    log::info!("Listener         : {}", cfg.bind.description());
    log::info!("Max idle time    : {}s", cfg.max_idletime);
    log::info!("Max clients      : {}", cfg.max_clients);
    log::info!("Max request size : {}", format_memory(cfg.max_request_size));
    log::info!("Max resp. size   : {}", format_memory(cfg.max_response_size));
    log::info!("Max memory       : {}", format_memory(cfg.max_memory));
    log::info!("GC ratio         : {}s", cfg.gc_ratio);
    log::info!("Max key size     : {}", format_memory(cfg.max_key_size));
    log::info!("Max value size   : {}", format_memory(cfg.max_value_size));
    log::info!("LZF compression  : {}", format_memory(cfg.compression));
    log::info!("Cron period      : {}ms", cfg.cron_period);
}

/// Drop our PID where the configuration asks for it. Failing to write the
/// pidfile is loud but not fatal
fn write_pidfile(path: Option<&str>) {
    let Some(path) = path else { return };
    let attempt = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .and_then(|mut file| file.write_all(process::id().to_string().as_bytes()));
    if let Err(e) = attempt {
        log::warn!("Error creating pid file {}: {}", path, e);
    }
}
