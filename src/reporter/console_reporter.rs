//! Console-based packet reporter.

use std::io::{self, Write};

use super::{hex_dump, RenderOptions};
use crate::domain::ClassifiedPacket;
use crate::reporter::PacketReporter;

/// Reports packets to stdout as a fixed-width table.
///
/// Each packet renders as a summary row optionally followed by DNS
/// query lines, HTTP header lines and a payload dump. Which optional
/// lines appear is decided per packet by the worker's [`RenderOptions`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Create a new console reporter.
    pub fn new() -> Self {
        Self
    }

    /// The column header shared by every summary row.
    pub fn format_header(&self) -> String {
        format_row("Time", "Source", "Destination", "Proto", "Length", "Info")
    }

    /// Render every line of one packet, newline terminated.
    pub fn format_packet(&self, packet: &ClassifiedPacket, options: RenderOptions) -> String {
        let mut output = format_row(
            &packet.time,
            &packet.source,
            &packet.destination,
            &packet.protocol,
            &packet.length,
            &packet.info,
        );

        for question in &packet.dns_queries {
            output.push_str(&format!("[DNS] Query: {}\n", question));
        }

        if options.http_print {
            if let Some(http) = &packet.http {
                output.push_str(&format!(
                    "[HTTP] {}-[{}:{}->{}:{}]\n",
                    http.direction,
                    packet.source,
                    packet.source_port,
                    packet.destination,
                    packet.destination_port
                ));
                for line in &http.lines {
                    output.push_str(&format!("        {}\n", line));
                }
            }
        }

        if options.verbose {
            for row in hex_dump(packet.payload()) {
                output.push_str(&row);
                output.push('\n');
            }
        }

        output
    }

    fn emit(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

fn format_row(time: &str, src: &str, dst: &str, proto: &str, length: &str, info: &str) -> String {
    format!(
        "{:<20} {:<15} {:<15} {:<7} {:<7} {:<7}\n",
        time, src, dst, proto, length, info
    )
}

impl PacketReporter for ConsoleReporter {
    fn on_start(&self, interface: &str) {
        tracing::info!(interface = %interface, "Streaming started");
        self.emit(&self.format_header());
    }

    fn report(&self, packet: &ClassifiedPacket, options: RenderOptions) {
        self.emit(&self.format_packet(packet, options));
    }

    fn on_stop(&self, interface: &str) {
        tracing::info!(interface = %interface, "Streaming stopped");
    }
}
