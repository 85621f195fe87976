//! Persistence sinks.
//!
//! A worker owns one [`SinkSet`] holding no sink, the raw pcap sink, the
//! JSON record sink, or both. Only opening is fail-fast; once open, a failed
//! write is logged and counted and the sink keeps receiving every later
//! frame.

mod json_sink;
mod pcap_sink;

pub use json_sink::{JsonSink, PacketRecord};
pub use pcap_sink::PcapSink;

use std::path::Path;

use pcap_file::DataLink;
use tracing::warn;

use crate::capture::RawFrame;
use crate::domain::ClassifiedPacket;
use crate::error::SinkError;

/// Write failures seen by each sink of a set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkFailures {
    pub raw: u64,
    pub record: u64,
}

/// The sinks enabled for one worker.
pub enum EnabledSinks {
    None,
    Raw(PcapSink),
    Record(JsonSink),
    Both { raw: PcapSink, record: JsonSink },
}

/// The enabled sinks of one worker together with their failure counters.
///
/// The record sink is flushed when the set is dropped, on every worker
/// exit path. The raw sink writes through and needs no flush.
pub struct SinkSet {
    sinks: EnabledSinks,
    failures: SinkFailures,
}

impl SinkSet {
    /// Open the configured sinks; the raw sink is created first.
    pub fn open(
        raw_path: Option<&Path>,
        record_path: Option<&Path>,
        snaplen: u32,
        link_type: DataLink,
    ) -> Result<Self, SinkError> {
        let raw = raw_path
            .map(|path| PcapSink::create(path, snaplen, link_type))
            .transpose()?;
        let record = record_path.map(JsonSink::create).transpose()?;

        let sinks = match (raw, record) {
            (None, None) => EnabledSinks::None,
            (Some(raw), None) => EnabledSinks::Raw(raw),
            (None, Some(record)) => EnabledSinks::Record(record),
            (Some(raw), Some(record)) => EnabledSinks::Both { raw, record },
        };
        Ok(Self::new(sinks))
    }

    pub fn new(sinks: EnabledSinks) -> Self {
        Self {
            sinks,
            failures: SinkFailures::default(),
        }
    }

    pub fn is_raw_enabled(&self) -> bool {
        matches!(self.sinks, EnabledSinks::Raw(_) | EnabledSinks::Both { .. })
    }

    pub fn is_record_enabled(&self) -> bool {
        matches!(self.sinks, EnabledSinks::Record(_) | EnabledSinks::Both { .. })
    }

    /// Persist one frame to every enabled sink.
    ///
    /// A failure on one sink never skips the other.
    pub fn write(&mut self, frame: &RawFrame, packet: &ClassifiedPacket) {
        let (raw, record) = match &mut self.sinks {
            EnabledSinks::None => (None, None),
            EnabledSinks::Raw(raw) => (Some(raw), None),
            EnabledSinks::Record(record) => (None, Some(record)),
            EnabledSinks::Both { raw, record } => (Some(raw), Some(record)),
        };

        if let Some(raw) = raw {
            if let Err(e) = raw.write(frame) {
                self.failures.raw += 1;
                warn!("Failed to write pcap record: {}", e);
            }
        }
        if let Some(record) = record {
            if let Err(e) = record.write(packet, &frame.data) {
                self.failures.record += 1;
                warn!("Failed to write packet record: {}", e);
            }
        }
    }

    pub fn failures(&self) -> SinkFailures {
        self.failures
    }

    fn flush(&mut self) {
        let record = match &mut self.sinks {
            EnabledSinks::Record(record) | EnabledSinks::Both { record, .. } => record,
            EnabledSinks::None | EnabledSinks::Raw(_) => return,
        };
        if let Err(e) = record.flush() {
            warn!("Failed to flush record sink: {}", e);
        }
    }
}

impl Drop for SinkSet {
    fn drop(&mut self) {
        self.flush();
    }
}


#[cfg(test)]
mod tests {
    use super::flaky::FlakyWriter;
    use super::*;
    use crate::domain::DecodedPacket;
    use std::sync::atomic::Ordering;

    fn packet() -> ClassifiedPacket {
        ClassifiedPacket::unlabeled("00:00:00.000000".into(), DecodedPacket::new(4))
    }

    fn record_lines(writer: &FlakyWriter) -> Vec<PacketRecord> {
        let buffer = writer.buffer.lock().unwrap();
        String::from_utf8(buffer.clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_open_none() {
        let sinks = SinkSet::open(None, None, 1600, DataLink::ETHERNET).unwrap();
        assert!(matches!(sinks.sinks, EnabledSinks::None));
        assert!(!sinks.is_raw_enabled());
        assert!(!sinks.is_record_enabled());
    }

    #[test]
    fn test_open_both() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("a.pcap");
        let record = dir.path().join("a.json");
        let sinks = SinkSet::open(Some(&raw), Some(&record), 1600, DataLink::ETHERNET).unwrap();
        assert!(sinks.is_raw_enabled());
        assert!(sinks.is_record_enabled());
        assert!(raw.exists());
        assert!(record.exists());
    }

    #[test]
    fn test_open_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("a.pcap");
        let record = dir.path().join("missing").join("a.json");
        let result = SinkSet::open(Some(&raw), Some(&record), 1600, DataLink::ETHERNET);
        assert!(matches!(result, Err(SinkError::Open { path, .. }) if path == record));
    }

    #[test]
    fn test_raw_failure_does_not_block_record() {
        let raw_writer = FlakyWriter::default();
        let record_writer = FlakyWriter::default();
        let raw = PcapSink::from_writer(Box::new(raw_writer.clone()), 1600, DataLink::ETHERNET).unwrap();
        let record = JsonSink::from_writer(Box::new(record_writer.clone()));
        let mut sinks = SinkSet::new(EnabledSinks::Both { raw, record });

        let frame = RawFrame::ethernet(vec![0xaa; 4]);

        raw_writer.failing.store(true, Ordering::SeqCst);
        sinks.write(&frame, &packet());
        assert_eq!(sinks.failures(), SinkFailures { raw: 1, record: 0 });
        assert_eq!(record_lines(&record_writer).len(), 1);

        // Every later frame is still attempted on both sinks
        raw_writer.failing.store(false, Ordering::SeqCst);
        let before = raw_writer.buffer.lock().unwrap().len();
        sinks.write(&frame, &packet());
        assert_eq!(sinks.failures(), SinkFailures { raw: 1, record: 0 });
        assert!(raw_writer.buffer.lock().unwrap().len() > before);
        assert_eq!(record_lines(&record_writer).len(), 2);
    }

    #[test]
    fn test_record_failure_does_not_block_raw() {
        let raw_writer = FlakyWriter::default();
        let record_writer = FlakyWriter::default();
        let raw = PcapSink::from_writer(Box::new(raw_writer.clone()), 1600, DataLink::ETHERNET).unwrap();
        let record = JsonSink::from_writer(Box::new(record_writer.clone()));
        let mut sinks = SinkSet::new(EnabledSinks::Both { raw, record });

        record_writer.failing.store(true, Ordering::SeqCst);
        let before = raw_writer.buffer.lock().unwrap().len();
        sinks.write(&RawFrame::ethernet(vec![1, 2, 3]), &packet());

        assert_eq!(sinks.failures(), SinkFailures { raw: 0, record: 1 });
        // 16 byte record header + 3 bytes of data
        assert_eq!(raw_writer.buffer.lock().unwrap().len(), before + 19);

        // Dropping must not panic even though the record flush fails
        drop(sinks);
    }
}
