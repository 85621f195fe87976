//! Hex and ASCII payload dump.

use std::fmt::Write;

/// Bytes shown on each dump row.
pub const BYTES_PER_ROW: usize = 16;

/// Format a payload as rows of `    xx xx ..  | ascii`.
///
/// Every hex byte carries a trailing space, so the separator is
/// preceded by two spaces. Short rows are padded so the ASCII column
/// always lines up.
pub fn hex_dump(payload: &[u8]) -> Vec<String> {
    payload
        .chunks(BYTES_PER_ROW)
        .map(|chunk| {
            let mut hex = String::with_capacity(BYTES_PER_ROW * 3);
            let mut ascii = String::with_capacity(BYTES_PER_ROW);
            for &b in chunk {
                let _ = write!(hex, "{:02x} ", b);
                ascii.push(if (32..=126).contains(&b) { b as char } else { '.' });
            }
            hex.push_str(&"   ".repeat(BYTES_PER_ROW - chunk.len()));
            format!("    {} | {}", hex, ascii)
        })
        .collect()
}
