//! Classified packets: the renderable fields derived from a decoded frame.

use super::{DecodedPacket, DnsQuestion};

/// Placeholder for any field the frame did not provide.
pub const SENTINEL: &str = "-";

/// Direction of a recognised HTTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpDirection {
    Request,
    Response,
}

impl std::fmt::Display for HttpDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "Request"),
            Self::Response => write!(f, "Response"),
        }
    }
}

/// An HTTP request or response recognised from a single payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    pub direction: HttpDirection,
    /// Non-empty CRLF separated lines of the payload
    pub lines: Vec<String>,
}

/// The fields rendered for one frame, plus the decoded view they came from.
///
/// Every string field holds either a real value or [`SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub time: String,
    pub source: String,
    pub destination: String,
    pub source_port: String,
    pub destination_port: String,
    pub protocol: String,
    pub length: String,
    pub info: String,
    /// DNS questions to report, empty unless the frame carried a query
    pub dns_queries: Vec<DnsQuestion>,
    /// Set only when HTTP printing is enabled and the payload matched
    pub http: Option<HttpMessage>,
    pub decoded: DecodedPacket,
}

impl ClassifiedPacket {
    /// Create a packet with every field set to the sentinel.
    pub fn unlabeled(time: String, decoded: DecodedPacket) -> Self {
        Self {
            time,
            source: SENTINEL.to_string(),
            destination: SENTINEL.to_string(),
            source_port: SENTINEL.to_string(),
            destination_port: SENTINEL.to_string(),
            protocol: SENTINEL.to_string(),
            length: SENTINEL.to_string(),
            info: SENTINEL.to_string(),
            dns_queries: Vec::new(),
            http: None,
            decoded,
        }
    }

    /// Application payload of the underlying frame.
    pub fn payload(&self) -> &[u8] {
        self.decoded.payload_bytes()
    }
}
