//! Live output module.
//!
//! This module defines the `PacketReporter` trait and the console
//! implementation that renders the live packet table.

mod console_reporter;
mod hexdump;

pub use console_reporter::ConsoleReporter;
pub use hexdump::{hex_dump, BYTES_PER_ROW};

use crate::domain::ClassifiedPacket;

/// Per-worker rendering switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Dump each payload as hex and ASCII
    pub verbose: bool,
    /// Show recognised HTTP messages
    pub http_print: bool,
}

/// Trait for rendering classified packets.
///
/// One reporter is shared by every worker, so implementations must
/// emit each packet's lines as one block.
pub trait PacketReporter: Send + Sync {
    /// Called once per worker before its first packet.
    fn on_start(&self, interface: &str);

    /// Render one classified packet with the reporting worker's options.
    fn report(&self, packet: &ClassifiedPacket, options: RenderOptions);

    /// Called when a worker stops streaming.
    fn on_stop(&self, interface: &str);
}

#[cfg(test)]
pub(crate) mod memory {
    //! Reporter that keeps rendered blocks in memory.

    use std::sync::Mutex;

    use super::{ConsoleReporter, PacketReporter, RenderOptions};
    use crate::domain::ClassifiedPacket;

    #[derive(Default)]
    pub struct MemoryReporter {
        pub started: Mutex<Vec<String>>,
        pub stopped: Mutex<Vec<String>>,
        pub packets: Mutex<Vec<ClassifiedPacket>>,
        pub output: Mutex<String>,
        console: ConsoleReporter,
    }

    impl MemoryReporter {
        pub fn packet_count(&self) -> usize {
            self.packets.lock().unwrap().len()
        }
    }

    impl PacketReporter for MemoryReporter {
        fn on_start(&self, interface: &str) {
            self.started.lock().unwrap().push(interface.to_string());
            self.output.lock().unwrap().push_str(&self.console.format_header());
        }

        fn report(&self, packet: &ClassifiedPacket, options: RenderOptions) {
            self.output
                .lock()
                .unwrap()
                .push_str(&self.console.format_packet(packet, options));
            self.packets.lock().unwrap().push(packet.clone());
        }

        fn on_stop(&self, interface: &str) {
            self.stopped.lock().unwrap().push(interface.to_string());
        }
    }
}
