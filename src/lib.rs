//! Netscope - multi-interface live packet observer.
//!
//! Captures frames on one or more interfaces, renders each frame as a
//! line of a live table, and optionally records frames to a pcap file
//! and to a JSON-lines file.

pub mod capture;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod filter;
pub mod parser;
pub mod reporter;
pub mod sink;
pub mod supervisor;
pub mod worker;

pub use capture::{CaptureOpener, FrameSource, PnetOpener, RawFrame, SourceEvent};
pub use config::{CaptureConfig, Settings};
pub use error::{CaptureError, ConfigError, FilterError, SinkError, WorkerError};
pub use reporter::{ConsoleReporter, PacketReporter, RenderOptions};
pub use supervisor::{StopSignal, Supervisor, SupervisorEvent, WorkerReport};
pub use worker::{InterfaceWorker, WorkerState, WorkerStats};
