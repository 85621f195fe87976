//! Error types for the capture pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors opening or reading a live capture source.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Insufficient permissions to capture on {0} (try running as root)")]
    InsufficientPermissions(String),

    #[error("Failed to create capture channel on {interface}: {reason}")]
    ChannelCreation { interface: String, reason: String },

    #[error("Unsupported channel type on {0}")]
    UnsupportedChannel(String),
}

/// Errors compiling a filter expression.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Filter expression is empty")]
    Empty,

    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("Unexpected end of filter expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Invalid length: {0}")]
    InvalidLength(String),

    #[error("Filter nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Errors creating or writing a persistence sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to create sink file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Pcap write error: {0}")]
    Pcap(#[from] pcap_file::PcapError),

    #[error("Record encoding error: {0}")]
    Record(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors parsing an embedded protocol message.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Name of {0} bytes exceeds the 255 byte limit")]
    NameTooLong(usize),

    #[error("Compression pointer loop in name")]
    PointerLoop,

    #[error("Reserved label type {0:#04x}")]
    ReservedLabelType(u8),
}

/// Errors loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Invalid(String),

    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Terminal errors for a single interface worker.
///
/// Each of these stops only the worker that raised it.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Open error: {0}")]
    Open(#[from] CaptureError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Sink open error: {0}")]
    SinkOpen(#[source] SinkError),

    #[error("Worker thread panicked")]
    Panicked,
}
