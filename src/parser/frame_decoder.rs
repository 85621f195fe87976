//! pnet-based frame decoder.

use pcap_file::DataLink;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::icmpv6::Icmpv6Packet;
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use super::{DnsParser, PacketDecoder};
use crate::capture::RawFrame;
use crate::domain::{DecodedPacket, NetworkLayer, TransportLayer};

/// DNS port
const DNS_PORT: u16 = 53;

/// Size of an 802.1Q tag following the outer EtherType
const VLAN_TAG_SIZE: usize = 4;

/// Decodes Ethernet and raw IP frames down to the application payload.
pub struct FrameDecoder {
    dns: DnsParser,
}

impl FrameDecoder {
    /// Create a new frame decoder.
    pub fn new() -> Self {
        Self {
            dns: DnsParser::new(),
        }
    }

    fn decode_ethernet(&self, data: &[u8], packet: &mut DecodedPacket) {
        let Some(ethernet) = EthernetPacket::new(data) else {
            return;
        };

        let mut ethertype = ethernet.get_ethertype();
        let mut payload = ethernet.payload();
        if ethertype == EtherTypes::Vlan {
            if payload.len() < VLAN_TAG_SIZE {
                packet.ethertype = Some(ethertype.0);
                return;
            }
            ethertype = pnet::packet::ethernet::EtherType(u16::from_be_bytes([payload[2], payload[3]]));
            payload = &payload[VLAN_TAG_SIZE..];
        }
        packet.ethertype = Some(ethertype.0);

        match ethertype {
            EtherTypes::Ipv4 => self.decode_ipv4(payload, packet),
            EtherTypes::Ipv6 => self.decode_ipv6(payload, packet),
            _ => {}
        }
    }

    fn decode_raw_ip(&self, data: &[u8], packet: &mut DecodedPacket) {
        match data.first().map(|b| b >> 4) {
            Some(4) => self.decode_ipv4(data, packet),
            Some(6) => self.decode_ipv6(data, packet),
            _ => {}
        }
    }

    fn decode_ipv4(&self, data: &[u8], packet: &mut DecodedPacket) {
        let Some(ipv4) = Ipv4Packet::new(data) else {
            return;
        };
        if ipv4.get_version() != 4 || ipv4.get_header_length() < 5 {
            return;
        }

        packet.network = Some(NetworkLayer::Ipv4 {
            source: ipv4.get_source(),
            destination: ipv4.get_destination(),
        });

        // Only the first fragment carries the transport header
        if ipv4.get_fragment_offset() != 0 {
            return;
        }
        self.decode_transport(ipv4.get_next_level_protocol(), ipv4.payload(), packet);
    }

    fn decode_ipv6(&self, data: &[u8], packet: &mut DecodedPacket) {
        let Some(ipv6) = Ipv6Packet::new(data) else {
            return;
        };
        if ipv6.get_version() != 6 {
            return;
        }

        packet.network = Some(NetworkLayer::Ipv6 {
            source: ipv6.get_source(),
            destination: ipv6.get_destination(),
        });
        self.decode_transport(ipv6.get_next_header(), ipv6.payload(), packet);
    }

    fn decode_transport(&self, protocol: IpNextHeaderProtocol, data: &[u8], packet: &mut DecodedPacket) {
        match protocol {
            IpNextHeaderProtocols::Tcp => {
                let Some(tcp) = TcpPacket::new(data) else {
                    return;
                };
                let (source_port, destination_port) = (tcp.get_source(), tcp.get_destination());
                packet.transport = Some(TransportLayer::Tcp {
                    source_port,
                    destination_port,
                });
                let payload = tcp.payload();
                if is_dns_port(source_port, destination_port) && payload.len() > 2 {
                    // DNS over TCP is prefixed with a two-byte message length
                    packet.dns = self.dns.parse(&payload[2..]).ok();
                }
                set_payload(packet, payload);
            }
            IpNextHeaderProtocols::Udp => {
                let Some(udp) = UdpPacket::new(data) else {
                    return;
                };
                let (source_port, destination_port) = (udp.get_source(), udp.get_destination());
                packet.transport = Some(TransportLayer::Udp {
                    source_port,
                    destination_port,
                });
                let payload = udp.payload();
                if is_dns_port(source_port, destination_port) {
                    packet.dns = self.dns.parse(payload).ok();
                }
                set_payload(packet, payload);
            }
            IpNextHeaderProtocols::Icmp => {
                if let Some(icmp) = IcmpPacket::new(data) {
                    packet.transport = Some(TransportLayer::Icmpv4 {
                        icmp_type: icmp.get_icmp_type().0,
                        code: icmp.get_icmp_code().0,
                    });
                }
            }
            IpNextHeaderProtocols::Icmpv6 => {
                if let Some(icmp) = Icmpv6Packet::new(data) {
                    packet.transport = Some(TransportLayer::Icmpv6 {
                        icmp_type: icmp.get_icmpv6_type().0,
                        code: icmp.get_icmpv6_code().0,
                    });
                }
            }
            _ => {}
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketDecoder for FrameDecoder {
    fn decode(&self, frame: &RawFrame) -> DecodedPacket {
        let mut packet = DecodedPacket::new(frame.data.len());
        match frame.link_type {
            DataLink::ETHERNET => self.decode_ethernet(&frame.data, &mut packet),
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => {
                self.decode_raw_ip(&frame.data, &mut packet)
            }
            _ => {}
        }
        packet
    }
}

fn is_dns_port(source: u16, destination: u16) -> bool {
    source == DNS_PORT || destination == DNS_PORT
}

fn set_payload(packet: &mut DecodedPacket, payload: &[u8]) {
    if !payload.is_empty() {
        packet.payload = Some(payload.to_vec());
    }
}
