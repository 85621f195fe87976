//! Raw packet capture (pcap) sink.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::DataLink;

use crate::capture::RawFrame;
use crate::error::SinkError;

/// Appends frames to a pcap file, one record per frame.
///
/// The writer is unbuffered, so every record reaches the file as soon
/// as it is written and nothing needs flushing on exit.
pub struct PcapSink {
    writer: PcapWriter<Box<dyn Write + Send>>,
}

impl PcapSink {
    /// Create the file and write the pcap file header.
    pub fn create(path: &Path, snaplen: u32, link_type: DataLink) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_writer(Box::new(file), snaplen, link_type)
    }

    /// Write the pcap file header to an arbitrary writer.
    pub fn from_writer(
        writer: Box<dyn Write + Send>,
        snaplen: u32,
        link_type: DataLink,
    ) -> Result<Self, SinkError> {
        let header = PcapHeader {
            snaplen,
            datalink: link_type,
            ..PcapHeader::default()
        };
        let writer = PcapWriter::with_header(writer, header)?;
        Ok(Self { writer })
    }

    /// Append one frame with its original timestamp and wire length.
    pub fn write(&mut self, frame: &RawFrame) -> Result<(), SinkError> {
        let packet = PcapPacket::new(frame.since_epoch(), frame.orig_len, &frame.data);
        self.writer.write_packet(&packet)?;
        Ok(())
    }
}
