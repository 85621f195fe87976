//! Capture settings.
//!
//! Settings are layered: built-in defaults, then an optional
//! `key = value` config file, then `NETSCOPE_*` environment variables,
//! then command line flags (applied by the binary through [`Settings::set`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{OpenOptions, DEFAULT_POLL_INTERVAL, DEFAULT_SNAPLEN};
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/netscope.conf";
const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variables and the setting each overrides.
const ENV_OVERRIDES: [(&str, &str); 9] = [
    ("NETSCOPE_INTERFACES", "interfaces"),
    ("NETSCOPE_FILTER", "filter"),
    ("NETSCOPE_WRITE_TO", "write_to"),
    ("NETSCOPE_SAVE_TO", "save_to"),
    ("NETSCOPE_VERBOSE", "verbose"),
    ("NETSCOPE_HTTP_PRINT", "http_print"),
    ("NETSCOPE_SNAPLEN", "snaplen"),
    ("NETSCOPE_PROMISCUOUS", "promiscuous"),
    ("NETSCOPE_LOG", "log"),
];

/// Everything one worker needs. Each worker owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub interface: String,
    pub filter: Option<String>,
    pub verbose: bool,
    pub http_print: bool,
    /// Raw pcap sink
    pub raw_sink: Option<PathBuf>,
    /// JSON lines record sink
    pub record_sink: Option<PathBuf>,
    pub open: OpenOptions,
}

impl CaptureConfig {
    /// A config for `interface` with nothing but defaults.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            filter: None,
            verbose: false,
            http_print: false,
            raw_sink: None,
            record_sink: None,
            open: OpenOptions::default(),
        }
    }
}

/// Process-wide settings, before they are split per interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Interfaces to capture; empty means every interface that is up
    pub interfaces: Vec<String>,
    pub filter: Option<String>,
    pub write_to: Option<PathBuf>,
    pub save_to: Option<PathBuf>,
    pub verbose: bool,
    pub http_print: bool,
    pub snaplen: u32,
    pub promiscuous: bool,
    pub poll_interval: Duration,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            filter: None,
            write_to: None,
            save_to: None,
            verbose: false,
            http_print: false,
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    /// Load defaults, the config file and environment overrides.
    ///
    /// Without an explicit path the default file is read if it exists;
    /// an explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        if required || path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            settings.apply_file(&content)?;
        }

        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Apply every `key = value` line of a config file.
    pub fn apply_file(&mut self, content: &str) -> Result<(), ConfigError> {
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::Invalid(format!("line {}: expected key = value", number + 1))
            })?;
            self.set(key.trim(), value.trim())?;
        }
        Ok(())
    }

    /// Apply overrides from environment variables found by `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                self.set(key, &value)
                    .map_err(|e| ConfigError::Invalid(format!("{}: {}", var, e)))?;
            }
        }
        Ok(())
    }

    /// Set one setting by key. Empty strings clear optional values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "interfaces" => {
                self.interfaces = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "filter" => self.filter = non_empty(value),
            "write_to" => self.write_to = non_empty(value).map(PathBuf::from),
            "save_to" => self.save_to = non_empty(value).map(PathBuf::from),
            "verbose" => self.verbose = parse_bool(key, value)?,
            "http_print" => self.http_print = parse_bool(key, value)?,
            "promiscuous" => self.promiscuous = parse_bool(key, value)?,
            "snaplen" => {
                self.snaplen = value
                    .parse()
                    .ok()
                    .filter(|&n: &u32| n > 0)
                    .ok_or_else(|| ConfigError::Invalid(format!("Invalid snaplen: {}", value)))?;
            }
            "log" => self.log_filter = value.to_string(),
            _ => return Err(ConfigError::Invalid(format!("Unknown setting: {}", key))),
        }
        Ok(())
    }

    /// One config per interface.
    ///
    /// With several interfaces, sink paths get the interface name
    /// inserted so that no two workers share a file.
    pub fn capture_configs(&self, interfaces: &[String]) -> Vec<CaptureConfig> {
        let shared = interfaces.len() > 1;
        let per_interface = |path: &Option<PathBuf>, interface: &str| {
            path.as_ref().map(|p| {
                if shared {
                    sink_path_for(p, interface)
                } else {
                    p.clone()
                }
            })
        };

        interfaces
            .iter()
            .map(|interface| CaptureConfig {
                interface: interface.clone(),
                filter: self.filter.clone(),
                verbose: self.verbose,
                http_print: self.http_print,
                raw_sink: per_interface(&self.write_to, interface),
                record_sink: per_interface(&self.save_to, interface),
                open: OpenOptions {
                    snaplen: self.snaplen,
                    promiscuous: self.promiscuous,
                    poll_interval: self.poll_interval,
                },
            })
            .collect()
    }
}

/// Insert the interface name before the extension: `cap.pcap` -> `cap-eth0.pcap`.
pub fn sink_path_for(path: &Path, interface: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, interface, ext.to_string_lossy()),
        None => format!("{}-{}", stem, interface),
    };
    path.with_file_name(name)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "Invalid boolean for {}: {}",
            key, value
        ))),
    }
}
