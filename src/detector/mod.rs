//! Packet classification module.
//!
//! This module derives the renderable fields of a frame and recognises
//! the embedded protocols worth reporting (DNS queries, HTTP messages).

mod classifier;
mod http_detector;

pub use classifier::{format_timestamp, Classifier};
pub use http_detector::HttpDetector;
