//! Decoding captions from a byte source.

use image::GrayImage;
use log::debug;

use crate::caption::{Caption, FrameRate};
use crate::clock::Timestamp;
use crate::config::DecoderConfig;
use crate::errors::{DecodeWarning, Error, Result};
use crate::img::{decode_bitmap, Bitmap, Size};
use crate::palette::{decode_palette, Palette};
use crate::source::ByteSource;

/// A fully decoded caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedCaption {
    index: usize,
    palette: Palette,
    bitmap: Bitmap,
    primary_color_index: u8,
    warnings: Vec<DecodeWarning>,
}

impl DecodedCaption {
    /// The index of the caption we decoded.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The caption's palette.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The caption's image, as palette indices.
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// The most common visible color in the image.  Useful as a guess at
    /// the color of the caption's text.
    pub fn primary_color_index(&self) -> u8 {
        self.primary_color_index
    }

    /// The most transparent palette entry.
    pub fn transparent_index(&self) -> u8 {
        self.bitmap.transparent_index()
    }

    /// Problems we worked around while decoding.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// See [`Bitmap::to_luma_image`].
    pub fn to_luma_image(&self) -> GrayImage {
        self.bitmap.to_luma_image()
    }
}

/// Decodes the captions of a Blu-ray subtitle stream.
///
/// `decode` only borrows the decoder, so a decoder over a `Sync` byte
/// source can be shared between threads.
///
/// ```
/// use supbd::{Caption, DecoderConfig, Fragment, ImageObject, PaletteSegment, SupDecoder};
///
/// // One palette record (index 1, white, opaque), then a 2x1 image.
/// let data = vec![0x01, 0xeb, 0x80, 0x80, 0xff, 0x01, 0x01];
/// let image = ImageObject::new(vec![Fragment::new(5, 2)], 2, 0);
/// let caption = Caption::new(1920, 1080, 2, 1, image)
///     .with_palette_segment(0, PaletteSegment::new(0, 1));
///
/// let decoder = SupDecoder::new(data, vec![caption], DecoderConfig::default());
/// let decoded = decoder.decode(0).unwrap();
/// assert_eq!(decoded.bitmap().pixels(), &[1, 1]);
/// assert_eq!(decoded.primary_color_index(), 1);
/// ```
#[derive(Debug)]
pub struct SupDecoder<S> {
    source: S,
    captions: Vec<Caption>,
    config: DecoderConfig,
}

impl<S: ByteSource> SupDecoder<S> {
    /// Create a decoder for `captions`, all of which point into `source`.
    pub fn new(source: S, captions: Vec<Caption>, config: DecoderConfig) -> SupDecoder<S> {
        SupDecoder {
            source,
            captions,
            config,
        }
    }

    /// Decode the caption at `index`.
    pub fn decode(&self, index: usize) -> Result<DecodedCaption> {
        let caption = self.caption(index)?;
        let mut warnings = vec![];

        let image = caption.image_object();
        let palette = decode_palette(
            image.palette_id(),
            caption.palettes(),
            &self.source,
            &self.config,
            &mut warnings,
        )?;
        let transparent_index = palette.most_transparent_index();
        let bitmap = decode_bitmap(
            image,
            Size {
                w: caption.image_width(),
                h: caption.image_height(),
            },
            Size {
                w: caption.width(),
                h: caption.height(),
            },
            transparent_index,
            &self.source,
            &mut warnings,
        )?;
        let primary_color_index = bitmap.primary_color_index(&palette, self.config.alpha_threshold);

        debug!(
            "decoded caption {}: {}x{}, transparent {}, primary {}, {} warnings",
            index,
            bitmap.width(),
            bitmap.height(),
            transparent_index,
            primary_color_index,
            warnings.len()
        );
        Ok(DecodedCaption {
            index,
            palette,
            bitmap,
            primary_color_index,
            warnings,
        })
    }

    /// The number of captions.
    pub fn caption_count(&self) -> usize {
        self.captions.len()
    }

    /// The number of captions which are forced.
    pub fn forced_caption_count(&self) -> usize {
        self.captions.iter().filter(|c| c.is_forced()).count()
    }

    /// All our captions.
    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }

    /// Get the caption at `index`.
    pub fn caption(&self, index: usize) -> Result<&Caption> {
        self.captions.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.captions.len(),
        })
    }

    /// When to start showing the caption at `index`.
    pub fn start_time(&self, index: usize) -> Result<Timestamp> {
        Ok(self.caption(index)?.start_time())
    }

    /// When to stop showing the caption at `index`.
    pub fn end_time(&self, index: usize) -> Result<Timestamp> {
        Ok(self.caption(index)?.end_time())
    }

    /// Should the caption at `index` be shown even if subtitles are off?
    pub fn is_forced(&self, index: usize) -> Result<bool> {
        Ok(self.caption(index)?.is_forced())
    }

    /// The frame rate of the caption at `index`.
    pub fn frame_rate(&self, index: usize) -> Result<FrameRate> {
        Ok(self.caption(index)?.frame_rate())
    }

    /// Where the image data of the caption at `index` starts, if it has
    /// any.
    pub fn start_offset(&self, index: usize) -> Result<Option<u64>> {
        Ok(self.caption(index)?.image_object().start_offset())
    }

    /// Our settings.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Give back the byte source.
    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
fn test_decoder(captions: Vec<Caption>) -> SupDecoder<Vec<u8>> {
    // Index 1 is opaque white, index 2 is half-transparent, then a 4x2
    // image at offset 10.
    let data = vec![
        0x01, 0xeb, 0x80, 0x80, 0xff, //
        0x02, 0x80, 0x80, 0x80, 0x40, //
        0x01, 0x01, 0x00, 0x82, 0x02, //
        0x00, 0x00, 0x00, 0x84, 0x01,
    ];
    SupDecoder::new(data, captions, DecoderConfig::default())
}

#[cfg(test)]
fn test_caption(image_width: u16, max_width: u16) -> Caption {
    use crate::caption::{Fragment, ImageObject, PaletteSegment};

    let image = ImageObject::new(vec![Fragment::new(10, 10)], 10, 0);
    Caption::new(max_width, 2, image_width, 2, image)
        .with_palette_segment(0, PaletteSegment::new(0, 2))
}

#[test]
fn decode_caption() {
    let _ = env_logger::builder().is_test(true).try_init();

    let decoder = test_decoder(vec![test_caption(4, 4)]);
    let decoded = decoder.decode(0).unwrap();
    assert_eq!(decoded.index(), 0);
    assert_eq!(decoded.bitmap().pixels(), &[1, 1, 2, 2, 1, 1, 1, 1]);
    assert_eq!(decoded.transparent_index(), 0);
    // Entry 2 is below the default alpha threshold.
    assert_eq!(decoded.primary_color_index(), 1);
    assert!(decoded.warnings().is_empty());

    // Decoding is repeatable.
    assert_eq!(decoder.decode(0).unwrap(), decoded);
}

#[test]
fn decode_out_of_range() {
    let decoder = test_decoder(vec![test_caption(4, 4)]);
    match decoder.decode(1) {
        Err(Error::IndexOutOfRange { index: 1, count: 1 }) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(decoder.start_time(1).is_err());
}

#[test]
fn decode_oversized_caption() {
    let decoder = test_decoder(vec![test_caption(5, 4)]);
    assert!(matches!(
        decoder.decode(0),
        Err(Error::OversizedPicture { width: 5, max_width: 4, offset: 10, .. })
    ));
}

#[test]
fn metadata_accessors() {
    let decoder = test_decoder(vec![
        test_caption(4, 4)
            .with_times(Timestamp::from_millis(1000), Timestamp::from_millis(2500))
            .with_frame_rate_id(0x30),
        test_caption(4, 4).with_forced(true),
    ]);
    assert_eq!(decoder.caption_count(), 2);
    assert_eq!(decoder.forced_caption_count(), 1);
    assert_eq!(decoder.start_time(0).unwrap(), Timestamp::from_millis(1000));
    assert_eq!(decoder.end_time(0).unwrap(), Timestamp::from_millis(2500));
    assert!(!decoder.is_forced(0).unwrap());
    assert!(decoder.is_forced(1).unwrap());
    assert_eq!(decoder.frame_rate(0).unwrap(), FrameRate::Pal);
    assert_eq!(decoder.start_offset(1).unwrap(), Some(10));
}
