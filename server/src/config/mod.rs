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

mod cfgfile;

use crate::corestore::Limits;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};

// server defaults
const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 10128;
const DEFAULT_CONFIGURATION: &str = "bramble.yml";
// logging defaults
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FLUSH_RATE: usize = 1;
// session defaults
const DEFAULT_MAX_IDLETIME: u64 = 30;
const DEFAULT_MAX_CLIENTS: usize = 255;
// framing defaults
const DEFAULT_MAX_REQUEST_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_RESPONSE_SIZE: usize = 25 * 1024 * 1024;
// item and memory defaults
const DEFAULT_MAX_MEMORY: usize = 128 * 1024 * 1024;
const DEFAULT_MAX_ITEM_TTL: u64 = 0;
const DEFAULT_MAX_KEY_SIZE: usize = 255;
const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;
const DEFAULT_COMPRESSION: usize = 4096;
// maintenance defaults
const DEFAULT_GC_RATIO: u64 = 600;
const DEFAULT_CRON_PERIOD: u64 = 100;

#[derive(Debug)]
pub enum ConfigError {
    Io(String, std::io::Error),
    Parse(serde_yaml::Error),
    BadValue(String),
    /// `-h` on the command line; not an error, but main should stop
    HelpRequested,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "failed to read '{path}': {e}"),
            Self::Parse(e) => write!(f, "bad configuration file: {e}"),
            Self::BadValue(what) => write!(f, "{what}"),
            Self::HelpRequested => write!(f, "help requested"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
/// Listener selection. The two are mutually exclusive and the socket path
/// takes precedence when both appear in the file
pub enum BindConfig {
    Unix { path: String },
    Tcp { host: IpAddr, port: u16 },
}

impl BindConfig {
    pub fn description(&self) -> String {
        match self {
            Self::Unix { path } => format!("unix://{path}"),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
/// The complete runtime configuration, defaults applied
pub struct ConfigurationSet {
    pub bind: BindConfig,
    pub logfile: Option<String>,
    pub loglevel: String,
    pub logflushrate: usize,
    pub max_idletime: u64,
    pub max_clients: usize,
    pub max_request_size: usize,
    pub max_response_size: usize,
    pub max_memory: usize,
    pub max_item_ttl: u64,
    pub max_key_size: usize,
    pub max_value_size: usize,
    pub compression: usize,
    pub gc_ratio: u64,
    pub cron_period: u64,
    pub daemonize: bool,
    pub pidfile: Option<String>,
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        ConfigurationSet {
            bind: BindConfig::Tcp {
                host: DEFAULT_IPV4,
                port: DEFAULT_PORT,
            },
            logfile: None,
            loglevel: DEFAULT_LOG_LEVEL.to_owned(),
            logflushrate: DEFAULT_LOG_FLUSH_RATE,
            max_idletime: DEFAULT_MAX_IDLETIME,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            max_memory: DEFAULT_MAX_MEMORY,
            max_item_ttl: DEFAULT_MAX_ITEM_TTL,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            compression: DEFAULT_COMPRESSION,
            gc_ratio: DEFAULT_GC_RATIO,
            cron_period: DEFAULT_CRON_PERIOD,
            daemonize: false,
            pidfile: None,
        }
    }
}

impl ConfigurationSet {
    /// The slice of the configuration the engine enforces
    pub fn limits(&self) -> Limits {
        Limits {
            max_idletime: self.max_idletime,
            max_clients: self.max_clients,
            max_request_size: self.max_request_size,
            max_response_size: self.max_response_size,
            max_memory: self.max_memory,
            max_item_ttl: self.max_item_ttl,
            max_key_size: self.max_key_size,
            max_value_size: self.max_value_size,
        }
    }

    fn from_file(file: cfgfile::Config) -> Result<Self, ConfigError> {
        let mut cfg = ConfigurationSet::default();
        cfg.bind = match (file.unix_socket, file.address, file.port) {
            (Some(path), _, _) => BindConfig::Unix { path },
            (None, address, port) => BindConfig::Tcp {
                host: address.unwrap_or(DEFAULT_IPV4),
                port: port.unwrap_or(DEFAULT_PORT),
            },
        };
        cfg.logfile = file.logfile;
        if let Some(level) = file.loglevel {
            if !matches!(
                level.as_str(),
                "off" | "error" | "warn" | "info" | "debug" | "trace"
            ) {
                return Err(ConfigError::BadValue(format!(
                    "loglevel '{level}' is not one of off/error/warn/info/debug/trace"
                )));
            }
            cfg.loglevel = level;
        }
        if let Some(rate) = file.logflushrate {
            cfg.logflushrate = rate.max(1);
        }
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = file.$field { cfg.$field = value; })*
            };
        }
        take!(
            max_idletime,
            max_clients,
            max_request_size,
            max_response_size,
            max_memory,
            max_item_ttl,
            max_key_size,
            max_value_size,
            compression,
            gc_ratio,
            cron_period,
            daemonize
        );
        cfg.pidfile = file.pidfile;
        if cfg.max_request_size < crate::protocol::MIN_REQUEST_SIZE {
            return Err(ConfigError::BadValue(
                "max_request_size cannot fit a single opcode".to_owned(),
            ));
        }
        if cfg.max_clients == 0 {
            return Err(ConfigError::BadValue(
                "max_clients must be at least 1".to_owned(),
            ));
        }
        if cfg.cron_period == 0 {
            return Err(ConfigError::BadValue(
                "cron_period must be at least 1ms".to_owned(),
            ));
        }
        Ok(cfg)
    }

    /// Parse the YAML text of a configuration file. An empty (or
    /// comment-only) file means "all defaults", which serde would
    /// otherwise reject as a missing document
    pub fn from_str(raw: &str) -> Result<Self, ConfigError> {
        let file: cfgfile::Config = match serde_yaml::from_str::<Option<cfgfile::Config>>(raw)
            .map_err(ConfigError::Parse)?
        {
            Some(file) => file,
            None => cfgfile::Config::default(),
        };
        Self::from_file(file)
    }
}

#[derive(Debug)]
/// Where the configuration came from, so main can log it honestly
pub enum ConfigType {
    /// From the file at the given path
    Custom(ConfigurationSet, String),
    /// Nothing supplied and no default file on disk
    Def(ConfigurationSet),
}

/// Scan the command line (`-c/--config FILE`, `-h/--help`) and load the
/// configuration. A missing *explicit* file is an error; a missing
/// *default* file just means defaults
pub fn get_config_file_or_return_cfg() -> Result<ConfigType, ConfigError> {
    let mut args = std::env::args().skip(1);
    let mut explicit: Option<String> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(ConfigError::HelpRequested),
            "-c" | "--config" => match args.next() {
                Some(path) => explicit = Some(path),
                None => {
                    return Err(ConfigError::BadValue(
                        "-c/--config requires a file argument".to_owned(),
                    ))
                }
            },
            unknown => {
                return Err(ConfigError::BadValue(format!(
                    "unknown argument '{unknown}'"
                )))
            }
        }
    }
    match explicit {
        Some(path) => {
            let raw =
                fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
            Ok(ConfigType::Custom(ConfigurationSet::from_str(&raw)?, path))
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIGURATION) {
                Ok(ConfigType::Custom(
                    ConfigurationSet::from_str(&raw)?,
                    DEFAULT_CONFIGURATION.to_owned(),
                ))
            } else {
                Ok(ConfigType::Def(ConfigurationSet::default()))
            }
        }
    }
}
