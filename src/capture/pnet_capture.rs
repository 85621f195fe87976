//! pnet-based live capture implementation.

use std::io;
use std::time::SystemTime;

use pcap_file::DataLink;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, NetworkInterface};
use tracing::{debug, warn};

use super::{CaptureOpener, FrameSource, OpenOptions, RawFrame, SourceEvent};
use crate::error::{CaptureError, FilterError};
use crate::filter::FilterProgram;
use crate::parser::{FrameDecoder, PacketDecoder};

/// Consecutive read errors after which the link is considered gone.
const MAX_CONSECUTIVE_ERRORS: u32 = 64;

/// Live capture on one interface using a pnet datalink channel.
pub struct PnetCapture {
    interface: NetworkInterface,
    rx: Box<dyn DataLinkReceiver>,
    link_type: DataLink,
    snaplen: usize,
    filter: Option<FilterProgram>,
    decoder: FrameDecoder,
    consecutive_errors: u32,
    closed: bool,
}

impl PnetCapture {
    /// Open a capture on the specified interface.
    pub fn open(interface_name: &str, options: &OpenOptions) -> Result<Self, CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| CaptureError::InterfaceNotFound(interface_name.to_string()))?;

        let config = Config {
            read_timeout: Some(options.poll_interval),
            promiscuous: options.promiscuous,
            ..Config::default()
        };

        let rx = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            Ok(_) => return Err(CaptureError::UnsupportedChannel(interface.name.clone())),
            Err(e) => {
                let msg = e.to_string();
                if e.kind() == io::ErrorKind::PermissionDenied
                    || msg.contains("Operation not permitted")
                {
                    return Err(CaptureError::InsufficientPermissions(interface.name.clone()));
                }
                return Err(CaptureError::ChannelCreation {
                    interface: interface.name.clone(),
                    reason: msg,
                });
            }
        };

        let link_type = link_type_for(&interface);
        debug!(interface = %interface.name, ?link_type, "Capture opened");

        Ok(Self {
            interface,
            rx,
            link_type,
            snaplen: options.snaplen as usize,
            filter: None,
            decoder: FrameDecoder::new(),
            consecutive_errors: 0,
            closed: false,
        })
    }

    fn accept(&self, frame: &RawFrame) -> bool {
        match &self.filter {
            Some(filter) => filter.matches(&self.decoder.decode(frame)),
            None => true,
        }
    }
}

impl FrameSource for PnetCapture {
    fn set_filter(&mut self, expression: &str) -> Result<(), FilterError> {
        self.filter = Some(FilterProgram::compile(expression)?);
        Ok(())
    }

    fn next_event(&mut self) -> SourceEvent {
        if self.closed {
            return SourceEvent::Closed;
        }

        match self.rx.next() {
            Ok(packet) => {
                self.consecutive_errors = 0;
                let captured = packet.len().min(self.snaplen);
                let frame = RawFrame {
                    data: packet[..captured].to_vec(),
                    orig_len: packet.len() as u32,
                    timestamp: SystemTime::now(),
                    link_type: self.link_type,
                };
                if self.accept(&frame) {
                    SourceEvent::Frame(frame)
                } else {
                    SourceEvent::Idle
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                SourceEvent::Idle
            }
            Err(e) => {
                self.consecutive_errors += 1;
                if is_link_gone(&e) || self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    warn!(interface = %self.interface.name, "Capture closed: {}", e);
                    self.closed = true;
                    return SourceEvent::Closed;
                }
                debug!(interface = %self.interface.name, "Capture error: {}", e);
                SourceEvent::Idle
            }
        }
    }

    fn link_type(&self) -> DataLink {
        self.link_type
    }

    fn interface_name(&self) -> &str {
        &self.interface.name
    }
}

/// Opens [`PnetCapture`] sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct PnetOpener;

impl CaptureOpener for PnetOpener {
    fn open(
        &self,
        interface: &str,
        options: &OpenOptions,
    ) -> Result<Box<dyn FrameSource>, CaptureError> {
        Ok(Box::new(PnetCapture::open(interface, options)?))
    }
}

/// Point-to-point and MAC-less interfaces (tun, wireguard, ppp) deliver
/// bare IP packets with no Ethernet header.
fn link_type_for(interface: &NetworkInterface) -> DataLink {
    if interface.is_point_to_point() || interface.mac.is_none() {
        DataLink::RAW
    } else {
        DataLink::ETHERNET
    }
}

#[cfg(target_os = "linux")]
fn is_link_gone(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENETDOWN) | Some(libc::ENODEV) | Some(libc::ENXIO)
    )
}

#[cfg(not(target_os = "linux"))]
fn is_link_gone(_err: &io::Error) -> bool {
    false
}

/// Names of all interfaces that are currently up.
pub fn up_interfaces() -> Vec<String> {
    datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up())
        .map(|iface| iface.name)
        .collect()
}

/// List all available network interfaces as printable rows, header first.
pub fn list_interfaces() -> Vec<String> {
    format_interface_rows(&datalink::interfaces())
}

fn format_interface_rows(interfaces: &[NetworkInterface]) -> Vec<String> {
    let row = |name: &str, ips: &str, description: &str| {
        format!("{:<16} {:<40} {}", name, ips, description)
    };

    let mut rows = vec![row("Name", "IP(s)", "Description")];
    for iface in interfaces {
        let ips: Vec<_> = iface.ips.iter().map(|ip| ip.ip().to_string()).collect();
        let ips = if ips.is_empty() { "-".to_string() } else { ips.join(", ") };
        let description = if iface.description.is_empty() {
            "-"
        } else {
            iface.description.as_str()
        };
        rows.push(row(&iface.name, &ips, description));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::util::MacAddr;

    #[test]
    fn test_open_unknown_interface() {
        let result = PnetCapture::open("netscope-does-not-exist0", &OpenOptions::default());
        assert!(matches!(result, Err(CaptureError::InterfaceNotFound(_))));
    }

    #[test]
    fn test_opener_reports_missing_interface() {
        let result = PnetOpener.open("netscope-does-not-exist0", &OpenOptions::default());
        assert!(matches!(result, Err(CaptureError::InterfaceNotFound(name)) if name == "netscope-does-not-exist0"));
    }

    fn interface(name: &str, mac: Option<MacAddr>, flags: u32) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            description: String::new(),
            index: 5,
            mac,
            ips: vec![],
            flags,
        }
    }

    #[test]
    fn test_link_type_without_mac_is_raw() {
        assert_eq!(link_type_for(&interface("wg0", None, 0)), DataLink::RAW);
    }

    #[test]
    fn test_link_type_with_mac_is_ethernet() {
        let mac = Some(MacAddr::new(2, 0, 0, 0, 0, 1));
        assert_eq!(link_type_for(&interface("eth0", mac, 0)), DataLink::ETHERNET);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_link_type_point_to_point_is_raw() {
        let mac = Some(MacAddr::new(2, 0, 0, 0, 0, 1));
        let flags = libc::IFF_POINTOPOINT as u32;
        assert_eq!(link_type_for(&interface("ppp0", mac, flags)), DataLink::RAW);
    }

    #[test]
    fn test_interface_rows() {
        let mut eth0 = interface("eth0", Some(MacAddr::new(2, 0, 0, 0, 0, 1)), 0);
        eth0.description = "Intel Ethernet".to_string();
        eth0.ips = vec!["10.0.0.1/24".parse().unwrap(), "fe80::1/64".parse().unwrap()];
        let wg0 = interface("wg0", None, 0);

        let rows = format_interface_rows(&[eth0, wg0]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], format!("{:<16} {:<40} {}", "Name", "IP(s)", "Description"));
        assert_eq!(
            rows[1],
            format!("{:<16} {:<40} {}", "eth0", "10.0.0.1, fe80::1", "Intel Ethernet")
        );
        assert_eq!(rows[2], format!("{:<16} {:<40} {}", "wg0", "-", "-"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_link_gone_errno() {
        assert!(is_link_gone(&io::Error::from_raw_os_error(libc::ENETDOWN)));
        assert!(!is_link_gone(&io::Error::from_raw_os_error(libc::EINTR)));
    }
}
