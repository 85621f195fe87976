//! Packet capture abstraction.
//!
//! This module defines the `FrameSource` and `CaptureOpener` traits and
//! provides a pnet-based implementation. Workers depend only on the
//! traits, so they can be driven by scripted sources in tests.

mod pnet_capture;

pub use pnet_capture::{list_interfaces, up_interfaces, PnetCapture, PnetOpener};

use std::time::{Duration, SystemTime};

use pcap_file::DataLink;

use crate::error::{CaptureError, FilterError};

/// Default maximum number of bytes kept per frame.
pub const DEFAULT_SNAPLEN: u32 = 1600;

/// Default interval at which an idle source reports back to its worker.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Captured bytes, truncated to the snapshot length
    pub data: Vec<u8>,
    /// Length of the frame on the wire
    pub orig_len: u32,
    /// Capture timestamp
    pub timestamp: SystemTime,
    /// How to interpret `data`
    pub link_type: DataLink,
}

impl RawFrame {
    /// Create an untruncated Ethernet frame captured now.
    pub fn ethernet(data: Vec<u8>) -> Self {
        Self {
            orig_len: data.len() as u32,
            data,
            timestamp: SystemTime::now(),
            link_type: DataLink::ETHERNET,
        }
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Timestamp as an offset from the Unix epoch.
    pub fn since_epoch(&self) -> Duration {
        self.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// What a source produced when asked for the next frame.
#[derive(Debug)]
pub enum SourceEvent {
    /// A frame that passed the filter
    Frame(RawFrame),
    /// Nothing arrived within the poll interval
    Idle,
    /// The handle closed or the link went away; no more frames will come
    Closed,
}

/// Options for opening a live capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    pub snaplen: u32,
    pub promiscuous: bool,
    /// How long a read may block before the source reports `Idle`
    pub poll_interval: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// An open live capture on one interface.
///
/// The frame sequence is not restartable: once `Closed` is returned
/// the source is exhausted. Resources are released on drop.
pub trait FrameSource: Send {
    /// Compile and install a filter; frames that do not match are dropped
    /// before they are returned.
    fn set_filter(&mut self, expression: &str) -> Result<(), FilterError>;

    /// Wait for the next frame, at most one poll interval.
    fn next_event(&mut self) -> SourceEvent;

    /// Link type of every frame this source yields.
    fn link_type(&self) -> DataLink;

    /// Name of the interface being captured.
    fn interface_name(&self) -> &str;
}

/// Factory for frame sources, shared by all workers.
pub trait CaptureOpener: Send + Sync {
    fn open(
        &self,
        interface: &str,
        options: &OpenOptions,
    ) -> Result<Box<dyn FrameSource>, CaptureError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethernet_frame_defaults() {
        let frame = RawFrame::ethernet(vec![0u8; 64]);
        assert_eq!(frame.orig_len, 64);
        assert_eq!(frame.link_type, DataLink::ETHERNET);
    }

    #[test]
    fn test_since_epoch() {
        let ts = SystemTime::UNIX_EPOCH + Duration::from_micros(1_500_000);
        let frame = RawFrame::ethernet(vec![]).with_timestamp(ts);
        assert_eq!(frame.since_epoch(), Duration::from_micros(1_500_000));
    }

    #[test]
    fn test_default_open_options() {
        let options = OpenOptions::default();
        assert_eq!(options.snaplen, 1600);
        assert!(options.promiscuous);
    }
}
