//! Domain models for live packet observation.
//!
//! These types are independent of the capture backend and of the
//! output formats, so classification and rendering can be driven
//! from synthetic fixtures.

mod classified;
mod dns;
mod packet;

pub use classified::{ClassifiedPacket, HttpDirection, HttpMessage, SENTINEL};
pub use dns::{DnsMessage, DnsQuestion, DnsType};
pub use packet::{DecodedPacket, NetworkLayer, TransportLayer};
