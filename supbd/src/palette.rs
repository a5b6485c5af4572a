//! Caption palettes.
//!
//! A Blu-ray caption may use up to 256 colors.  Each palette is sent as one
//! or more segments of 5-byte records, and later records override earlier
//! ones.  Encoders use this to fade captions in and out, which we don't
//! want, so we never let an update make an entry more transparent.

use log::{trace, warn};
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use nom::IResult;
use std::collections::BTreeMap;
use std::io;

use crate::caption::PaletteSegment;
use crate::config::{ColorSpace, DecoderConfig};
use crate::errors::{DecodeWarning, Error, Result};
use crate::source::ByteSource;

/// A single YCbCr color with alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Luma.
    pub y: u8,
    /// Blue-difference chroma.
    pub cb: u8,
    /// Red-difference chroma.
    pub cr: u8,
    /// Opacity, where 0 is fully transparent.
    pub alpha: u8,
}

impl PaletteEntry {
    /// Fully transparent black, which is what every entry starts as.
    pub const TRANSPARENT: PaletteEntry = PaletteEntry {
        y: 16,
        cb: 128,
        cr: 128,
        alpha: 0,
    };
}

/// A 256-color palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    entries: [PaletteEntry; 256],
    color_space: ColorSpace,
}

impl Palette {
    /// Create a palette where every entry is fully transparent.
    pub fn new(color_space: ColorSpace) -> Palette {
        Palette {
            entries: [PaletteEntry::TRANSPARENT; 256],
            color_space,
        }
    }

    /// All 256 entries.
    pub fn entries(&self) -> &[PaletteEntry; 256] {
        &self.entries
    }

    /// Get a single entry.
    pub fn entry(&self, index: u8) -> PaletteEntry {
        self.entries[usize::from(index)]
    }

    /// The alpha value of an entry.
    pub fn alpha(&self, index: u8) -> u8 {
        self.entry(index).alpha
    }

    /// The color space of the palette's YCbCr values.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub(crate) fn set_ycbcr(&mut self, index: u8, y: u8, cb: u8, cr: u8) {
        let entry = &mut self.entries[usize::from(index)];
        entry.y = y;
        entry.cb = cb;
        entry.cr = cr;
    }

    pub(crate) fn set_alpha(&mut self, index: u8, alpha: u8) {
        self.entries[usize::from(index)].alpha = alpha;
    }

    /// The index of the most transparent entry.  If several entries share
    /// the lowest alpha, we return the first.
    pub fn most_transparent_index(&self) -> u8 {
        let mut best = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.alpha < self.entries[best].alpha {
                best = i;
            }
        }
        // There are exactly 256 entries.
        best as u8
    }
}

/// One raw palette record.
#[derive(Debug, PartialEq, Eq)]
struct Record {
    index: u8,
    y: u8,
    /// Normally Cr.
    chroma_1: u8,
    /// Normally Cb.
    chroma_2: u8,
    alpha: u8,
}

/// Parse a 5-byte palette record.
fn record(input: &[u8]) -> IResult<&[u8], Record> {
    let (input, (index, y, chroma_1, chroma_2, alpha)) =
        tuple((be_u8, be_u8, be_u8, be_u8, be_u8))(input)?;
    Ok((
        input,
        Record {
            index,
            y,
            chroma_1,
            chroma_2,
            alpha,
        },
    ))
}

#[test]
fn parse_record() {
    assert_eq!(
        record(&[0x0a, 0xc8, 0x80, 0x7f, 0xff, 0x01][..]),
        Ok((
            &[0x01][..],
            Record {
                index: 10,
                y: 200,
                chroma_1: 0x80,
                chroma_2: 0x7f,
                alpha: 255,
            }
        ))
    );
    assert!(record(&[0x0a, 0xc8][..]).is_err());
}

/// Build the palette `palette_id` by applying each of its segments in
/// order.  Any fade-out we suppress is reported in `warnings`.
pub fn decode_palette<S: ByteSource + ?Sized>(
    palette_id: u8,
    palettes: &BTreeMap<u8, Vec<PaletteSegment>>,
    source: &S,
    config: &DecoderConfig,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Palette> {
    let segments = palettes
        .get(&palette_id)
        .ok_or(Error::PaletteNotFound { palette_id })?;

    let mut palette = Palette::new(config.color_space);
    let mut fade_out = false;
    let mut raw = [0u8; PaletteSegment::RECORD_SIZE];
    for segment in segments {
        trace!(
            "palette {}: {} entries at 0x{:x}",
            palette_id,
            segment.entry_count,
            segment.offset
        );
        let mut offset = segment.offset;
        for _ in 0..segment.entry_count {
            source
                .read_exact_at(offset, &mut raw)
                .map_err(|err| Error::byte_source(offset, raw.len(), err))?;
            let (_, rec) = record(&raw).map_err(|_| {
                let err = io::Error::from(io::ErrorKind::UnexpectedEof);
                Error::byte_source(offset, raw.len(), err)
            })?;
            offset += raw.len() as u64;

            let (mut cb, mut cr) = if config.swap_cr_cb {
                (rec.chroma_1, rec.chroma_2)
            } else {
                (rec.chroma_2, rec.chroma_1)
            };
            let mut y = rec.y;

            if rec.alpha >= palette.alpha(rec.index) {
                if rec.alpha < config.alpha_crop {
                    y = 16;
                    cb = 128;
                    cr = 128;
                }
                palette.set_alpha(rec.index, rec.alpha);
            } else {
                fade_out = true;
            }
            // The color is updated even when we keep the old alpha.  This
            // matches what other SUP decoders produce, but it may need
            // checking against more real-world fade-outs.
            palette.set_ycbcr(rec.index, y, cb, cr);
        }
    }

    if fade_out {
        let warning = DecodeWarning::FadeOutDetected { palette_id };
        warn!("{}", warning);
        warnings.push(warning);
    }
    Ok(palette)
}

#[cfg(test)]
fn record_bytes(records: &[[u8; 5]]) -> Vec<u8> {
    records.iter().flat_map(|r| r.iter().copied()).collect()
}

#[test]
fn missing_palette_is_an_error() {
    let palettes = BTreeMap::new();
    let mut warnings = vec![];
    let err = decode_palette(3, &palettes, &[0u8; 0][..], &DecoderConfig::default(), &mut warnings)
        .unwrap_err();
    assert!(matches!(err, Error::PaletteNotFound { palette_id: 3 }));
}

#[test]
fn unwritten_entries_stay_transparent() {
    let data = record_bytes(&[[1, 235, 128, 128, 255]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(0, vec![PaletteSegment::new(0, 1)]);
    let mut warnings = vec![];
    let palette =
        decode_palette(0, &palettes, &data, &DecoderConfig::default(), &mut warnings).unwrap();
    assert_eq!(
        palette.entry(1),
        PaletteEntry {
            y: 235,
            cb: 128,
            cr: 128,
            alpha: 255,
        }
    );
    assert_eq!(palette.entry(0), PaletteEntry::TRANSPARENT);
    assert_eq!(palette.alpha(255), 0);
    assert_eq!(palette.most_transparent_index(), 0);
    assert!(warnings.is_empty());
}

#[test]
fn chroma_order_follows_swap_flag() {
    let data = record_bytes(&[[7, 100, 0x10, 0xf0, 200]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(0, vec![PaletteSegment::new(0, 1)]);
    let mut warnings = vec![];

    let normal =
        decode_palette(0, &palettes, &data, &DecoderConfig::default(), &mut warnings).unwrap();
    assert_eq!((normal.entry(7).cr, normal.entry(7).cb), (0x10, 0xf0));

    let config = DecoderConfig {
        swap_cr_cb: true,
        ..DecoderConfig::default()
    };
    let swapped = decode_palette(0, &palettes, &data, &config, &mut warnings).unwrap();
    assert_eq!((swapped.entry(7).cb, swapped.entry(7).cr), (0x10, 0xf0));
}

#[test]
fn nearly_transparent_entries_are_cropped_to_black() {
    let data = record_bytes(&[[4, 200, 90, 60, 13], [5, 200, 90, 60, 14]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(0, vec![PaletteSegment::new(0, 2)]);
    let mut warnings = vec![];
    let palette =
        decode_palette(0, &palettes, &data, &DecoderConfig::default(), &mut warnings).unwrap();
    assert_eq!(
        palette.entry(4),
        PaletteEntry {
            y: 16,
            cb: 128,
            cr: 128,
            alpha: 13,
        }
    );
    assert_eq!(
        palette.entry(5),
        PaletteEntry {
            y: 200,
            cb: 60,
            cr: 90,
            alpha: 14,
        }
    );
}

#[test]
fn fade_out_keeps_alpha_but_updates_color() {
    let data = record_bytes(&[[10, 200, 128, 128, 255], [10, 50, 128, 128, 100]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(
        2,
        vec![PaletteSegment::new(0, 1), PaletteSegment::new(5, 1)],
    );
    let mut warnings = vec![];
    let palette =
        decode_palette(2, &palettes, &data, &DecoderConfig::default(), &mut warnings).unwrap();
    assert_eq!(palette.alpha(10), 255);
    assert_eq!(palette.entry(10).y, 50);
    assert_eq!(warnings, vec![DecodeWarning::FadeOutDetected { palette_id: 2 }]);
}

#[test]
fn later_segments_override_earlier_ones() {
    let data = record_bytes(&[[3, 100, 128, 128, 120], [3, 180, 110, 140, 130]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(
        0,
        vec![PaletteSegment::new(0, 1), PaletteSegment::new(5, 1)],
    );
    let mut warnings = vec![];
    let palette =
        decode_palette(0, &palettes, &data, &DecoderConfig::default(), &mut warnings).unwrap();
    assert_eq!(
        palette.entry(3),
        PaletteEntry {
            y: 180,
            cb: 140,
            cr: 110,
            alpha: 130,
        }
    );
    assert!(warnings.is_empty());
}

#[test]
fn most_transparent_prefers_lowest_index() {
    let data = record_bytes(&[[0, 100, 128, 128, 255], [1, 100, 128, 128, 255]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(0, vec![PaletteSegment::new(0, 2)]);
    let mut warnings = vec![];
    let palette =
        decode_palette(0, &palettes, &data, &DecoderConfig::default(), &mut warnings).unwrap();
    assert_eq!(palette.most_transparent_index(), 2);
}

#[test]
fn truncated_palette_data_is_a_byte_source_fault() {
    let data = record_bytes(&[[0, 100, 128, 128, 255]]);
    let mut palettes = BTreeMap::new();
    palettes.insert(0, vec![PaletteSegment::new(0, 2)]);
    let mut warnings = vec![];
    let err = decode_palette(0, &palettes, &data, &DecoderConfig::default(), &mut warnings)
        .unwrap_err();
    match err {
        Error::ByteSourceFault { offset, len, .. } => {
            assert_eq!(offset, 5);
            assert_eq!(len, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
