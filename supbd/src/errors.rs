//! Error and warning types.
//!
//! Structural problems (a missing palette, an oversized picture, a bad
//! caption index, or a failing byte source) are returned as an [`Error`].
//! Damaged data inside an otherwise well-formed caption is reported as a
//! [`DecodeWarning`] instead, so that one bad caption doesn't stop a caller
//! from processing the rest of a stream.

use std::io;
use std::result;
use thiserror::Error;

use crate::util::HexOffset;

/// Our standard result type.
pub type Result<T, E = Error> = result::Result<T, E>;

/// Errors which can be returned by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for a caption which doesn't exist.
    #[error("caption index {index} out of bounds (have {count} captions)")]
    #[non_exhaustive]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of captions available.
        count: usize,
    },

    /// The image object refers to a palette which the caption doesn't define.
    #[error("palette ID {palette_id} is not defined for this caption")]
    #[non_exhaustive]
    PaletteNotFound {
        /// The missing palette ID.
        palette_id: u8,
    },

    /// The image is larger than the canvas it is supposed to appear on.
    #[error(
        "subpicture too large: {width}x{height} (max {max_width}x{max_height}) at offset {}",
        HexOffset(*offset)
    )]
    #[non_exhaustive]
    OversizedPicture {
        /// Declared image width.
        width: u16,
        /// Declared image height.
        height: u16,
        /// Canvas width.
        max_width: u16,
        /// Canvas height.
        max_height: u16,
        /// Offset of the image's first fragment.
        offset: u64,
    },

    /// We could not read from the underlying byte source.
    #[error("could not read {len} bytes at offset {}", HexOffset(*offset))]
    #[non_exhaustive]
    ByteSourceFault {
        /// Offset of the failed read.
        offset: u64,
        /// Number of bytes we tried to read.
        len: usize,
        /// The underlying error.
        source: io::Error,
    },
}

impl Error {
    /// Wrap an I/O error from a read of `len` bytes at `offset`.
    pub(crate) fn byte_source(offset: u64, len: usize, source: io::Error) -> Error {
        Error::ByteSourceFault {
            offset,
            len,
            source,
        }
    }
}

/// Recoverable problems found while decoding a caption.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeWarning {
    /// The run-length encoded image ran past the end of the bitmap, or the
    /// data ended in the middle of a run.  Everything decoded before this
    /// point is kept.
    #[error(
        "problems during RLE decoding of picture OBJ at offset {}",
        HexOffset(*offset)
    )]
    MalformedRleStream {
        /// Byte offset in the source where the bad run starts.
        offset: u64,
    },

    /// A palette update tried to lower the alpha of an entry.  We kept the
    /// old alpha.
    #[error("fade out detected in palette {palette_id} -> patched palette")]
    FadeOutDetected {
        /// The palette being decoded.
        palette_id: u8,
    },
}

#[test]
fn errors_display_hex_offsets() {
    let err = Error::OversizedPicture {
        width: 5,
        height: 2,
        max_width: 4,
        max_height: 2,
        offset: 0x1234,
    };
    assert_eq!(
        err.to_string(),
        "subpicture too large: 5x2 (max 4x2) at offset 0x00001234"
    );

    let warning = DecodeWarning::MalformedRleStream { offset: 0xbeef };
    assert_eq!(
        warning.to_string(),
        "problems during RLE decoding of picture OBJ at offset 0x0000beef"
    );
    let warning: Box<dyn std::error::Error> =
        Box::new(DecodeWarning::FadeOutDetected { palette_id: 3 });
    assert_eq!(
        warning.to_string(),
        "fade out detected in palette 3 -> patched palette"
    );
}

#[test]
fn byte_source_fault_keeps_io_error_as_source() {
    use std::error::Error as StdError;

    let err = Error::byte_source(
        16,
        5,
        io::Error::new(io::ErrorKind::UnexpectedEof, "out of data"),
    );
    let source = err.source().expect("missing source");
    assert_eq!(source.to_string(), "out of data");
}
