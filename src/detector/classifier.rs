//! Derivation of the rendered fields of a frame.

use std::time::SystemTime;

use chrono::{DateTime, Local};

use super::HttpDetector;
use crate::domain::{ClassifiedPacket, DecodedPacket};

/// Timestamp layout: wall clock time with microseconds
const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// Format a capture timestamp in local time, e.g. `14:03:07.123456`.
pub fn format_timestamp(timestamp: SystemTime) -> String {
    DateTime::<Local>::from(timestamp).format(TIME_FORMAT).to_string()
}

/// Turns decoded frames into classified packets.
///
/// Field rules:
/// - addresses and length come from the network layer
/// - protocol and info come from the transport layer, falling back to
///   the network layer name
/// - DNS questions are reported for queries only
/// - HTTP detection runs only when enabled
pub struct Classifier {
    http: Option<HttpDetector>,
}

impl Classifier {
    /// Create a classifier with HTTP detection disabled.
    pub fn new() -> Self {
        Self { http: None }
    }

    /// Enable or disable HTTP request/response detection.
    pub fn with_http_print(mut self, enabled: bool) -> Self {
        self.http = enabled.then(HttpDetector::new);
        self
    }

    pub fn classify(&self, timestamp: SystemTime, decoded: DecodedPacket) -> ClassifiedPacket {
        let mut packet = ClassifiedPacket::unlabeled(format_timestamp(timestamp), decoded);

        if let Some(network) = packet.decoded.network {
            packet.source = network.source().to_string();
            packet.destination = network.destination().to_string();
            packet.length = packet.decoded.length.to_string();
        }

        match (packet.decoded.transport, packet.decoded.network) {
            (Some(transport), _) => {
                packet.protocol = transport.layer_name().to_string();
                packet.info = transport.summary();
                if let Some((src, dst)) = transport.ports() {
                    packet.source_port = src.to_string();
                    packet.destination_port = dst.to_string();
                }
            }
            (None, Some(network)) => packet.protocol = network.layer_name().to_string(),
            (None, None) => {}
        }

        if let Some(dns) = &packet.decoded.dns {
            packet.dns_queries = dns.queries().to_vec();
        }

        if let (Some(detector), Some(payload)) = (&self.http, &packet.decoded.payload) {
            packet.http = detector.detect(payload);
        }

        packet
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
