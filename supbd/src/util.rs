//! Miscellaneous formatting helpers for diagnostics.

use std::fmt;

/// Wrapper to force a `&[u8]` to display as nicely-formatted hexadecimal
/// bytes with only the the first line or so of bytes shown.
pub struct BytesFormatter<'a>(pub &'a [u8]);

impl<'a> fmt::Debug for BytesFormatter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let BytesFormatter(bytes) = *self;
        for byte in bytes.iter().take(16) {
            write!(f, "{:02x} ", byte)?;
        }
        write!(f, "({} bytes)", bytes.len())?;
        Ok(())
    }
}

/// Display a byte offset in a `*.sup` file as zero-padded hexadecimal, the
/// way most SUP tools print them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexOffset(pub u64);

impl fmt::Display for HexOffset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[test]
fn format_hex_offsets() {
    assert_eq!(HexOffset(0).to_string(), "0x00000000");
    assert_eq!(HexOffset(0x1a2b3c).to_string(), "0x001a2b3c");
    assert_eq!(HexOffset(0x1_0000_0000).to_string(), "0x100000000");
}

#[test]
fn format_bytes_preview() {
    let bytes = [0u8, 0x82, 0x09];
    assert_eq!(format!("{:?}", BytesFormatter(&bytes)), "00 82 09 (3 bytes)");
}
