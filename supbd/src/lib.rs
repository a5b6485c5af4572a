//! This crate decodes Blu-ray subtitle captions, as found in `*.sup` files
//! demuxed from M2TS transport streams.  These store each caption as a
//! 256-color YCbCr palette and a run-length encoded image.
//!
//! We only handle the decoding step.  Finding the palette and image
//! segments in a stream is left to a container parser, which describes
//! each caption using a [`Caption`].
//!
//! ## Example code
//!
//! ```
//! use supbd::{Caption, DecoderConfig, Fragment, ImageObject, PaletteSegment, SupDecoder};
//!
//! # fn main() -> supbd::Result<()> {
//! // Palette 0 sets entry 7 to opaque white.  The image is a 3x1 run of 7.
//! let data = vec![0x07, 0xeb, 0x80, 0x80, 0xff, 0x00, 0x83, 0x07];
//! let image = ImageObject::new(vec![Fragment::new(5, 3)], 3, 0);
//! let caption = Caption::new(1920, 1080, 3, 1, image)
//!     .with_palette_segment(0, PaletteSegment::new(0, 1))
//!     .with_offset(100, 900);
//!
//! let decoder = SupDecoder::new(data, vec![caption], DecoderConfig::default());
//! for i in 0..decoder.caption_count() {
//!     println!("Time: {}-{}", decoder.start_time(i)?, decoder.end_time(i)?);
//!     let decoded = decoder.decode(i)?;
//!     let bitmap = decoded.bitmap();
//!     println!("Size: {}x{}", bitmap.width(), bitmap.height());
//!     println!("Primary color: {:?}", decoded.palette().entry(decoded.primary_color_index()));
//!     for warning in decoded.warnings() {
//!         println!("Warning: {}", warning);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Damaged data
//!
//! Real-world `*.sup` files contain plenty of slightly broken captions.
//! Problems which leave us with a usable image, like an image stream which
//! ends too early, or a palette update which tries to fade a caption out,
//! are reported as [`DecodeWarning`]s.  Problems which prevent decoding
//! entirely are returned as an [`Error`].
//!
//! ## Background & References
//!
//! - [Presentation Graphic Stream (SUP files) BluRay Subtitle Format][pgs]
//! - [System Time Clock](http://www.bretl.com/mpeghtml/STC.HTM)
//!
//! [pgs]: http://blog.thescorpius.com/index.php/2017/07/15/presentation-graphic-stream-sup-files-bluray-subtitle-format/

#![warn(missing_docs)]

mod caption;
mod clock;
mod config;
mod decoder;
mod errors;
mod img;
mod palette;
mod source;
mod util;

pub use self::caption::{Caption, Fragment, FrameRate, ImageObject, PaletteSegment};
pub use self::clock::{Timestamp, TICKS_PER_SECOND};
pub use self::config::{ColorSpace, DecoderConfig};
pub use self::decoder::{DecodedCaption, SupDecoder};
pub use self::errors::{DecodeWarning, Error, Result};
pub use self::img::{decode_bitmap, Bitmap, Size};
pub use self::palette::{decode_palette, Palette, PaletteEntry};
pub use self::source::ByteSource;
pub use self::util::HexOffset;
