//! Newline-delimited JSON record sink.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ClassifiedPacket;
use crate::error::SinkError;

/// One structured record per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub time: String,
    pub src: String,
    pub dst: String,
    pub proto: String,
    pub length: String,
    pub info: String,
    /// Lowercase hex of the entire frame
    pub payload_hex: String,
}

impl PacketRecord {
    pub fn new(packet: &ClassifiedPacket, frame: &[u8]) -> Self {
        Self {
            time: packet.time.clone(),
            src: packet.source.clone(),
            dst: packet.destination.clone(),
            proto: packet.protocol.clone(),
            length: packet.length.clone(),
            info: packet.info.clone(),
            payload_hex: encode_hex(frame),
        }
    }

    /// Decode `payload_hex` back into frame bytes.
    pub fn frame_bytes(&self) -> Option<Vec<u8>> {
        decode_hex(&self.payload_hex)
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Appends one JSON object per line.
pub struct JsonSink {
    writer: Box<dyn Write + Send>,
}

impl JsonSink {
    /// Create (truncate) the record file.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }

    /// Append the record for one frame.
    ///
    /// The line is encoded in full before anything is written.
    pub fn write(&mut self, packet: &ClassifiedPacket, frame: &[u8]) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&PacketRecord::new(packet, frame))?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DecodedPacket;
    use std::io::{BufRead, BufReader};

    fn classified() -> ClassifiedPacket {
        let mut packet = ClassifiedPacket::unlabeled("08:00:00.000001".into(), DecodedPacket::new(4));
        packet.source = "10.0.0.1".into();
        packet.destination = "10.0.0.2".into();
        packet.protocol = "UDP".into();
        packet.length = "4".into();
        packet.info = "1->2".into();
        packet
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(encode_hex(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(decode_hex("00abff"), Some(vec![0x00, 0xab, 0xff]));
        assert_eq!(decode_hex("abc"), None);
        assert_eq!(decode_hex("zz"), None);
        assert_eq!(decode_hex(""), Some(vec![]));
    }

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let frame = vec![0xde, 0xad, 0xbe, 0xef];
        let packet = classified();

        {
            let mut sink = JsonSink::create(&path).unwrap();
            sink.write(&packet, &frame).unwrap();
            sink.write(&packet, &[]).unwrap();
            sink.flush().unwrap();
        }

        let lines: Vec<String> = BufReader::new(File::open(&path).unwrap())
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        let record: PacketRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record.time, packet.time);
        assert_eq!(record.src, packet.source);
        assert_eq!(record.dst, packet.destination);
        assert_eq!(record.proto, packet.protocol);
        assert_eq!(record.length, packet.length);
        assert_eq!(record.info, packet.info);
        assert_eq!(record.payload_hex, "deadbeef");
        assert_eq!(record.frame_bytes(), Some(frame));
    }

    #[test]
    fn test_record_field_names() {
        let value = serde_json::to_value(PacketRecord::new(&classified(), &[1])).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["dst", "info", "length", "payload_hex", "proto", "src", "time"]
        );
    }
}
