//! Layered view over a decoded frame.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::DnsMessage;

/// Network layer of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ipv4 { source: Ipv4Addr, destination: Ipv4Addr },
    Ipv6 { source: Ipv6Addr, destination: Ipv6Addr },
}

impl NetworkLayer {
    pub fn source(&self) -> IpAddr {
        match self {
            NetworkLayer::Ipv4 { source, .. } => IpAddr::V4(*source),
            NetworkLayer::Ipv6 { source, .. } => IpAddr::V6(*source),
        }
    }

    pub fn destination(&self) -> IpAddr {
        match self {
            NetworkLayer::Ipv4 { destination, .. } => IpAddr::V4(*destination),
            NetworkLayer::Ipv6 { destination, .. } => IpAddr::V6(*destination),
        }
    }

    /// Layer type name used as the protocol label.
    pub fn layer_name(&self) -> &'static str {
        match self {
            NetworkLayer::Ipv4 { .. } => "IPv4",
            NetworkLayer::Ipv6 { .. } => "IPv6",
        }
    }
}

/// Transport layer of a decoded frame.
///
/// TCP and UDP carry ports; ICMP variants do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLayer {
    Tcp { source_port: u16, destination_port: u16 },
    Udp { source_port: u16, destination_port: u16 },
    Icmpv4 { icmp_type: u8, code: u8 },
    Icmpv6 { icmp_type: u8, code: u8 },
}

impl TransportLayer {
    /// Layer type name used as the protocol label.
    pub fn layer_name(&self) -> &'static str {
        match self {
            TransportLayer::Tcp { .. } => "TCP",
            TransportLayer::Udp { .. } => "UDP",
            TransportLayer::Icmpv4 { .. } => "ICMPv4",
            TransportLayer::Icmpv6 { .. } => "ICMPv6",
        }
    }

    /// Source and destination ports, for port-bearing transports.
    pub fn ports(&self) -> Option<(u16, u16)> {
        match *self {
            TransportLayer::Tcp {
                source_port,
                destination_port,
            }
            | TransportLayer::Udp {
                source_port,
                destination_port,
            } => Some((source_port, destination_port)),
            TransportLayer::Icmpv4 { .. } | TransportLayer::Icmpv6 { .. } => None,
        }
    }

    /// Compact summary of the layer, e.g. `54321->80`.
    pub fn summary(&self) -> String {
        match *self {
            TransportLayer::Tcp {
                source_port,
                destination_port,
            }
            | TransportLayer::Udp {
                source_port,
                destination_port,
            } => format!("{}->{}", source_port, destination_port),
            TransportLayer::Icmpv4 { icmp_type, code } | TransportLayer::Icmpv6 { icmp_type, code } => {
                format!("type={} code={}", icmp_type, code)
            }
        }
    }
}

/// A decoded frame: every layer the decoder could make sense of.
///
/// Missing or truncated layers leave the matching field `None`;
/// decoding never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedPacket {
    /// Captured byte count of the whole frame
    pub length: usize,
    /// EtherType of the link layer, when the frame had one
    pub ethertype: Option<u16>,
    pub network: Option<NetworkLayer>,
    pub transport: Option<TransportLayer>,
    /// Application payload (non-empty transport payload)
    pub payload: Option<Vec<u8>>,
    /// Embedded DNS message
    pub dns: Option<DnsMessage>,
}

impl DecodedPacket {
    /// Create an empty view for a frame of `length` bytes.
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    pub fn with_network(mut self, network: NetworkLayer) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_transport(mut self, transport: TransportLayer) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_dns(mut self, dns: DnsMessage) -> Self {
        self.dns = Some(dns);
        self
    }

    /// Application payload bytes, empty when there are none.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_summary_and_ports() {
        let tcp = TransportLayer::Tcp {
            source_port: 54321,
            destination_port: 80,
        };
        assert_eq!(tcp.layer_name(), "TCP");
        assert_eq!(tcp.ports(), Some((54321, 80)));
        assert_eq!(tcp.summary(), "54321->80");
    }

    #[test]
    fn test_icmp_has_no_ports() {
        let icmp = TransportLayer::Icmpv4 {
            icmp_type: 8,
            code: 0,
        };
        assert_eq!(icmp.ports(), None);
        assert_eq!(icmp.layer_name(), "ICMPv4");
        assert_eq!(icmp.summary(), "type=8 code=0");
    }

    #[test]
    fn test_network_endpoints() {
        let net = NetworkLayer::Ipv6 {
            source: Ipv6Addr::LOCALHOST,
            destination: "fe80::1".parse().unwrap(),
        };
        assert_eq!(net.source().to_string(), "::1");
        assert_eq!(net.destination().to_string(), "fe80::1");
        assert_eq!(net.layer_name(), "IPv6");
    }

    #[test]
    fn test_payload_bytes_defaults_to_empty() {
        let packet = DecodedPacket::new(60);
        assert!(packet.payload_bytes().is_empty());

        let packet = packet.with_payload(b"abc".to_vec());
        assert_eq!(packet.payload_bytes(), b"abc");
    }
}
