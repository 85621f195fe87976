//! Frame decoding module.
//!
//! This module turns raw frames into layered [`DecodedPacket`] views and
//! parses the embedded protocols the classifier reports on.

mod dns_parser;
mod frame_decoder;

pub use dns_parser::DnsParser;
pub use frame_decoder::FrameDecoder;

#[cfg(test)]
pub(crate) use dns_parser::build_query;
#[cfg(test)]
pub(crate) use frame_decoder::frames;

use crate::capture::RawFrame;
use crate::domain::DecodedPacket;

/// Turns raw frames into decoded views.
///
/// Decoding never fails: layers that cannot be parsed are left empty.
pub trait PacketDecoder: Send + Sync {
    fn decode(&self, frame: &RawFrame) -> DecodedPacket;
}
