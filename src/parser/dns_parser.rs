//! DNS message parser implementation.
//!
//! Parses the header and question section according to RFC 1035.

use crate::domain::{DnsMessage, DnsQuestion, DnsType};
use crate::error::ParseError;

/// DNS header size
const HEADER_SIZE: usize = 12;

/// Maximum encoded name length
const MAX_NAME_LENGTH: usize = 255;

/// Compression pointers followed before a name is rejected as looping
const MAX_POINTER_HOPS: usize = 16;

/// QR flag in the header flags word
const FLAG_QR: u16 = 0x8000;

/// Parser for DNS messages.
pub struct DnsParser;

impl DnsParser {
    /// Create a new DNS parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a DNS message from raw bytes.
    ///
    /// The input is the DNS message itself (for TCP, without the
    /// two-byte length prefix).
    pub fn parse(&self, data: &[u8]) -> Result<DnsMessage, ParseError> {
        if data.len() < HEADER_SIZE {
            return Err(ParseError::PacketTooShort {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let flags = u16::from_be_bytes([data[2], data[3]]);
        let qdcount = u16::from_be_bytes([data[4], data[5]]);

        let mut offset = HEADER_SIZE;
        let mut questions = Vec::with_capacity(usize::from(qdcount).min(16));
        for _ in 0..qdcount {
            let (name, next) = Self::read_name(data, offset)?;
            if data.len() < next + 4 {
                return Err(ParseError::PacketTooShort {
                    expected: next + 4,
                    actual: data.len(),
                });
            }
            // QTYPE then QCLASS; only the type is reported
            let qtype = u16::from_be_bytes([data[next], data[next + 1]]);
            questions.push(DnsQuestion {
                name,
                qtype: DnsType::from_u16(qtype),
            });
            offset = next + 4;
        }

        Ok(DnsMessage {
            is_response: flags & FLAG_QR != 0,
            questions,
        })
    }

    /// Read a possibly compressed name starting at `offset`.
    ///
    /// Returns the dotted name and the offset just past the name as it
    /// appears at `offset` (not past any pointer target).
    fn read_name(data: &[u8], offset: usize) -> Result<(String, usize), ParseError> {
        let mut labels: Vec<String> = Vec::new();
        let mut encoded_len = 0;
        let mut pos = offset;
        let mut resume_at = None;
        let mut hops = 0;

        loop {
            let len = *data.get(pos).ok_or(ParseError::PacketTooShort {
                expected: pos + 1,
                actual: data.len(),
            })?;

            match len & 0xc0 {
                0x00 => {
                    if len == 0 {
                        pos += 1;
                        break;
                    }
                    let start = pos + 1;
                    let end = start + usize::from(len);
                    if data.len() < end {
                        return Err(ParseError::PacketTooShort {
                            expected: end,
                            actual: data.len(),
                        });
                    }
                    encoded_len += usize::from(len) + 1;
                    if encoded_len > MAX_NAME_LENGTH {
                        return Err(ParseError::NameTooLong(encoded_len));
                    }
                    labels.push(String::from_utf8_lossy(&data[start..end]).into_owned());
                    pos = end;
                }
                0xc0 => {
                    let low = *data.get(pos + 1).ok_or(ParseError::PacketTooShort {
                        expected: pos + 2,
                        actual: data.len(),
                    })?;
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(ParseError::PointerLoop);
                    }
                    if resume_at.is_none() {
                        resume_at = Some(pos + 2);
                    }
                    pos = usize::from(u16::from_be_bytes([len & 0x3f, low]));
                }
                other => return Err(ParseError::ReservedLabelType(other)),
            }
        }

        Ok((labels.join("."), resume_at.unwrap_or(pos)))
    }
}

impl Default for DnsParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn build_query(id: u16, is_response: bool, questions: &[(&str, u16)]) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(&id.to_be_bytes());
    let flags: u16 = if is_response { 0x8180 } else { 0x0100 };
    msg.extend_from_slice(&flags.to_be_bytes());
    msg.extend_from_slice(&(questions.len() as u16).to_be_bytes());
    msg.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    for (name, qtype) in questions {
        for label in name.split('.').filter(|l| !l.is_empty()) {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&qtype.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_query() {
        let parser = DnsParser::new();
        let data = build_query(0xabcd, false, &[("example.com", 1)]);

        let msg = parser.parse(&data).unwrap();
        assert!(!msg.is_response);
        assert_eq!(msg.questions.len(), 1);
        assert_eq!(msg.questions[0].name, "example.com");
        assert_eq!(msg.questions[0].qtype, DnsType::A);
    }

    #[test]
    fn test_parse_response_flag() {
        let data = build_query(1, true, &[("example.com", 28)]);
        let msg = DnsParser::new().parse(&data).unwrap();
        assert!(msg.is_response);
        assert_eq!(msg.questions[0].qtype, DnsType::Aaaa);
    }

    #[test]
    fn test_parse_multiple_questions() {
        let data = build_query(7, false, &[("a.example", 1), ("b.example", 15)]);
        let msg = DnsParser::new().parse(&data).unwrap();
        let names: Vec<_> = msg.questions.iter().map(|q| q.to_string()).collect();
        assert_eq!(names, ["a.example (A)", "b.example (MX)"]);
    }

    #[test]
    fn test_compressed_name() {
        let mut data = build_query(9, false, &[("example.com", 1)]);
        // Second question "www" + pointer to offset 12 ("example.com")
        data[5] = 2;
        data.extend_from_slice(&[3, b'w', b'w', b'w', 0xc0, 12]);
        data.extend_from_slice(&[0, 5, 0, 1]);

        let msg = DnsParser::new().parse(&data).unwrap();
        assert_eq!(msg.questions[1].name, "www.example.com");
        assert_eq!(msg.questions[1].qtype, DnsType::Cname);
    }

    #[test]
    fn test_pointer_loop_rejected() {
        let mut data = build_query(9, false, &[]);
        data[5] = 1;
        // Pointer to itself at offset 12
        data.extend_from_slice(&[0xc0, 12, 0, 1, 0, 1]);

        assert_eq!(DnsParser::new().parse(&data), Err(ParseError::PointerLoop));
    }

    #[test]
    fn test_truncated_question() {
        let mut data = build_query(1, false, &[("example.com", 1)]);
        data.truncate(data.len() - 2);
        assert!(matches!(
            DnsParser::new().parse(&data),
            Err(ParseError::PacketTooShort { .. })
        ));
    }

    #[test]
    fn test_packet_too_short() {
        let result = DnsParser::new().parse(&[0u8; 5]);
        assert_eq!(
            result,
            Err(ParseError::PacketTooShort {
                expected: 12,
                actual: 5
            })
        );
    }

    #[test]
    fn test_reserved_label_type() {
        let mut data = build_query(1, false, &[]);
        data[5] = 1;
        data.extend_from_slice(&[0x40, 0, 0, 1, 0, 1]);
        assert_eq!(
            DnsParser::new().parse(&data),
            Err(ParseError::ReservedLabelType(0x40))
        );
    }
}
