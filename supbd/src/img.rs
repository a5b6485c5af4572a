//! Run-length encoded image format for captions.
//!
//! Blu-ray captions store 8-bit palette indices, one scan line at a time,
//! using a byte-oriented run-length code:
//!
//! ```text
//! CC             one pixel of color CC (CC != 0)
//! 00 00          end of line
//! 00 0L          L pixels of color 0 (L in 1..=63)
//! 00 4L LL       LLL pixels of color 0
//! 00 8L CC       L pixels of color CC
//! 00 CL LL CC    LLL pixels of color CC
//! ```

use image::{GrayImage, ImageBuffer, Luma};
use log::{trace, warn};
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use nom::IResult;
use safemem::write_bytes;
use std::io;
use std::result;

use crate::caption::ImageObject;
use crate::errors::{DecodeWarning, Error, Result};
use crate::palette::Palette;
use crate::source::ByteSource;
use crate::util::BytesFormatter;

/// The dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    /// Width in pixels.
    pub w: u16,
    /// Height in pixels.
    pub h: u16,
}

/// A decoded caption image, stored as one palette index per pixel in
/// row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    transparent_index: u8,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a new bitmap filled with index 0.  `transparent_index` is the
    /// palette entry which should be treated as background when rendering.
    pub fn new(width: u16, height: u16, transparent_index: u8) -> Bitmap {
        Bitmap {
            width,
            height,
            transparent_index,
            pixels: vec![0; usize::from(width) * usize::from(height)],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The most transparent entry of the palette this bitmap was decoded
    /// with.
    pub fn transparent_index(&self) -> u8 {
        self.transparent_index
    }

    /// The raw palette indices, in row-major order.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The palette index at `x`, `y`, or `None` if out of bounds.
    pub fn pixel(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = usize::from(y) * usize::from(self.width) + usize::from(x);
        Some(self.pixels[offset])
    }

    /// Find the most common palette index among those with an alpha above
    /// `alpha_threshold`.  Ties go to the lower index, and we return 0 if no
    /// pixel is visible enough.
    pub fn primary_color_index(&self, palette: &Palette, alpha_threshold: u8) -> u8 {
        let mut histogram = [0usize; 256];
        for &px in &self.pixels {
            histogram[usize::from(px)] += 1;
        }
        let mut color = 0;
        let mut max = 0;
        for (i, &count) in histogram.iter().enumerate() {
            // There are exactly 256 histogram entries.
            let index = i as u8;
            if palette.alpha(index) > alpha_threshold && count > max {
                max = count;
                color = index;
            }
        }
        color
    }

    /// Convert to a grayscale image where each pixel's brightness is its
    /// palette index.  Mostly useful for looking at decoder output.
    pub fn to_luma_image(&self) -> GrayImage {
        let width = cast::u32(self.width);
        let height = cast::u32(self.height);
        ImageBuffer::from_fn(width, height, |x, y| {
            let offset = cast::usize(y * width + x);
            Luma([self.pixels[offset]])
        })
    }
}

/// A single run-length encoded command.
#[derive(Debug, PartialEq, Eq)]
enum Rle {
    /// A single pixel.
    Pixel(u8),
    /// Move to the start of the next line.
    EndOfLine,
    /// Repeat `value` `count` times.
    Run { count: usize, value: u8 },
}

/// Parse an `Rle` command.
fn rle(input: &[u8]) -> IResult<&[u8], Rle> {
    let (input, lead) = be_u8(input)?;
    if lead != 0 {
        return Ok((input, Rle::Pixel(lead)));
    }
    let (input, flags) = be_u8(input)?;
    let count = usize::from(flags & 0x3f);
    match flags & 0xc0 {
        _ if flags == 0 => Ok((input, Rle::EndOfLine)),
        // Short run of color 0.
        0x00 => Ok((input, Rle::Run { count, value: 0 })),
        // Long run of color 0.
        0x40 => {
            let (input, lo) = be_u8(input)?;
            let count = count << 8 | usize::from(lo);
            Ok((input, Rle::Run { count, value: 0 }))
        }
        // Short run of any color.
        0x80 => {
            let (input, value) = be_u8(input)?;
            Ok((input, Rle::Run { count, value }))
        }
        // Long run of any color.
        _ => {
            let (input, (lo, value)) = tuple((be_u8, be_u8))(input)?;
            let count = count << 8 | usize::from(lo);
            Ok((input, Rle::Run { count, value }))
        }
    }
}

#[test]
fn parse_rle() {
    assert_eq!(rle(&[0x07, 0x00]), Ok((&[0x00][..], Rle::Pixel(7))));
    assert_eq!(rle(&[0x00, 0x00]), Ok((&[][..], Rle::EndOfLine)));
    assert_eq!(
        rle(&[0x00, 0x3f]),
        Ok((&[][..], Rle::Run { count: 63, value: 0 }))
    );
    assert_eq!(
        rle(&[0x00, 0x41, 0x02]),
        Ok((&[][..], Rle::Run { count: 0x102, value: 0 }))
    );
    assert_eq!(
        rle(&[0x00, 0x82, 0x09]),
        Ok((&[][..], Rle::Run { count: 2, value: 9 }))
    );
    assert_eq!(
        rle(&[0x00, 0xc1, 0x05, 0xff]),
        Ok((&[][..], Rle::Run { count: 0x105, value: 0xff }))
    );
    assert!(rle(&[0x00]).is_err());
    assert!(rle(&[0x00, 0x82]).is_err());
    assert!(rle(&[0x00, 0xc1, 0x05]).is_err());
}

/// Write `count` copies of `value` into `pixels` at `ofs`.  Returns `false`
/// if the run didn't fit, after writing the part which did.
fn fill(pixels: &mut [u8], ofs: usize, count: usize, value: u8) -> bool {
    if count == 0 {
        return true;
    }
    let len = pixels.len();
    let end = ofs.saturating_add(count);
    write_bytes(&mut pixels[ofs.min(len)..end.min(len)], value);
    end <= len
}

/// Decompress `input` into `bitmap`.  If the data is malformed, we stop and
/// return a warning pointing at the bad command, leaving everything decoded
/// so far in place.
fn decompress(
    input: &[u8],
    start_offset: u64,
    bitmap: &mut Bitmap,
) -> result::Result<(), DecodeWarning> {
    trace!("decompressing {:?}", BytesFormatter(input));
    let width = usize::from(bitmap.width);
    let pixels = &mut bitmap.pixels[..];
    let malformed = |at: &[u8]| DecodeWarning::MalformedRleStream {
        offset: start_offset + (input.len() - at.len()) as u64,
    };

    let mut remaining = input;
    let mut ofs = 0;
    let mut xpos = 0;
    while !remaining.is_empty() {
        let (rest, run) = rle(remaining).map_err(|_| malformed(remaining))?;
        match run {
            Rle::Pixel(value) => {
                if !fill(pixels, ofs, 1, value) {
                    return Err(malformed(remaining));
                }
                ofs += 1;
                xpos += 1;
            }
            Rle::EndOfLine => {
                ofs = ofs / width * width;
                if xpos < width {
                    ofs += width;
                }
                xpos = 0;
            }
            Rle::Run { count, value } => {
                if !fill(pixels, ofs, count, value) {
                    return Err(malformed(remaining));
                }
                ofs += count;
                xpos += count;
            }
        }
        remaining = rest;
    }
    Ok(())
}

/// How much image data we read from the source at a time.
const READ_CHUNK_SIZE: usize = 4096;

/// Copy all the fragments of `image` into one buffer, keeping at most
/// `buffer_size` bytes.  Every fragment must still be readable in full.
fn read_fragments<S: ByteSource + ?Sized>(image: &ImageObject, source: &S) -> Result<Vec<u8>> {
    let wanted = image.buffer_size();
    let mut data = Vec::new();
    let mut total: usize = 0;
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    for fragment in image.fragments() {
        let fault = |err| Error::byte_source(fragment.offset, fragment.len, err);
        let past_end = || {
            fault(io::Error::new(
                io::ErrorKind::InvalidInput,
                "image fragment runs past the end of the source",
            ))
        };
        fragment
            .offset
            .checked_add(fragment.len as u64)
            .ok_or_else(past_end)?;
        total = total.checked_add(fragment.len).ok_or_else(past_end)?;

        // Read in chunks, so a bogus length fails on the first missing byte
        // instead of allocating a huge buffer.
        let mut done = 0;
        while done < fragment.len {
            let n = (fragment.len - done).min(READ_CHUNK_SIZE);
            source
                .read_exact_at(fragment.offset + done as u64, &mut chunk[..n])
                .map_err(fault)?;
            let keep = n.min(wanted.saturating_sub(data.len()));
            data.extend_from_slice(&chunk[..keep]);
            done += n;
        }
    }
    if total != wanted {
        warn!(
            "found 0x{:x} bytes of image data, wanted 0x{:x}",
            total, wanted
        );
    }
    Ok(data)
}

/// Decode the run-length encoded `image` into a bitmap of `size`.
///
/// Fails if `size` doesn't fit within `bounds`, or if `source` can't be
/// read.  Damaged image data only produces a warning, and we return as
/// much of the bitmap as we could decode.
pub fn decode_bitmap<S: ByteSource + ?Sized>(
    image: &ImageObject,
    size: Size,
    bounds: Size,
    transparent_index: u8,
    source: &S,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Bitmap> {
    let start_offset = image.start_offset().unwrap_or(0);
    if size.w > bounds.w || size.h > bounds.h {
        return Err(Error::OversizedPicture {
            width: size.w,
            height: size.h,
            max_width: bounds.w,
            max_height: bounds.h,
            offset: start_offset,
        });
    }

    let data = read_fragments(image, source)?;
    let mut bitmap = Bitmap::new(size.w, size.h, transparent_index);
    if bitmap.pixels.is_empty() {
        trace!("empty {}x{} image, not decoding", size.w, size.h);
        return Ok(bitmap);
    }
    if let Err(warning) = decompress(&data, start_offset, &mut bitmap) {
        warn!("{}", warning);
        warnings.push(warning);
    }
    Ok(bitmap)
}

#[cfg(test)]
fn decode_test_image(
    data: &[u8],
    w: u16,
    h: u16,
    warnings: &mut Vec<DecodeWarning>,
) -> Bitmap {
    use crate::caption::Fragment;

    let image = ImageObject::new(vec![Fragment::new(0, data.len())], data.len(), 0);
    let size = Size { w, h };
    decode_bitmap(&image, size, size, 0, data, warnings).unwrap()
}

#[test]
fn single_pixel_then_end_of_line() {
    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x07, 0x00, 0x00], 2, 1, &mut warnings);
    assert_eq!(bitmap.pixels(), &[7, 0]);
    assert!(warnings.is_empty());
}

#[test]
fn short_colored_run() {
    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x00, 0x82, 0x09], 3, 1, &mut warnings);
    assert_eq!(bitmap.pixels(), &[9, 9, 0]);
    assert!(warnings.is_empty());
}

#[test]
fn end_of_line_skips_rest_of_line() {
    let mut warnings = vec![];
    let data = [
        0x01, 0x02, 0x00, 0x00, // short line
        0x00, 0x83, 0x05, 0x00, 0x00, // full line
        0x00, 0x02, 0x06, 0x00, 0x00, // zeros, then a pixel
    ];
    let bitmap = decode_test_image(&data, 3, 3, &mut warnings);
    assert_eq!(bitmap.pixels(), &[1, 2, 0, 5, 5, 5, 0, 0, 6]);
    assert!(warnings.is_empty());
}

#[test]
fn long_runs() {
    let mut warnings = vec![];
    // 0x101 pixels of color 3, then 0x100 zeros, then 0x0f pixels of 4.
    let data = [0x00, 0xc1, 0x01, 0x03, 0x00, 0x41, 0x00, 0x00, 0x8f, 0x04];
    let bitmap = decode_test_image(&data, 0x20, 0x20, &mut warnings);
    let pixels = bitmap.pixels();
    assert!(pixels[..0x101].iter().all(|&p| p == 3));
    assert!(pixels[0x101..0x201].iter().all(|&p| p == 0));
    assert!(pixels[0x201..0x210].iter().all(|&p| p == 4));
    assert_eq!(pixels[0x210], 0);
    assert!(warnings.is_empty());
}

#[test]
fn truncated_run_returns_partial_bitmap() {
    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x05, 0x00, 0x85], 4, 1, &mut warnings);
    assert_eq!(bitmap.pixels(), &[5, 0, 0, 0]);
    assert_eq!(warnings, vec![DecodeWarning::MalformedRleStream { offset: 1 }]);
}

#[test]
fn overrun_writes_what_fits() {
    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x01, 0x00, 0x85, 0x02, 0x03], 2, 2, &mut warnings);
    assert_eq!(bitmap.pixels(), &[1, 2, 2, 2]);
    assert_eq!(warnings, vec![DecodeWarning::MalformedRleStream { offset: 1 }]);
}

#[test]
fn fragments_are_concatenated() {
    use crate::caption::Fragment;

    // The run `00 82 09` is split across two fragments, with junk between.
    let data = [0x00, 0x82, 0xee, 0xee, 0x09, 0x04];
    let image = ImageObject::new(vec![Fragment::new(0, 2), Fragment::new(4, 2)], 4, 0);
    let size = Size { w: 3, h: 1 };
    let mut warnings = vec![];
    let bitmap = decode_bitmap(&image, size, size, 0, &data[..], &mut warnings).unwrap();
    assert_eq!(bitmap.pixels(), &[9, 9, 4]);
    assert!(warnings.is_empty());
}

#[test]
fn oversized_picture_is_rejected() {
    use crate::caption::Fragment;

    let image = ImageObject::new(vec![Fragment::new(0x40, 0)], 0, 0);
    let mut warnings = vec![];
    let err = decode_bitmap(
        &image,
        Size { w: 5, h: 2 },
        Size { w: 4, h: 2 },
        0,
        &[0u8; 0][..],
        &mut warnings,
    )
    .unwrap_err();
    match err {
        Error::OversizedPicture {
            width: 5,
            height: 2,
            offset: 0x40,
            ..
        } => {}
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn missing_fragment_data_is_fatal() {
    use crate::caption::Fragment;

    let image = ImageObject::new(vec![Fragment::new(2, 8)], 8, 0);
    let size = Size { w: 2, h: 2 };
    let mut warnings = vec![];
    let err = decode_bitmap(&image, size, size, 0, &[0u8; 4][..], &mut warnings).unwrap_err();
    assert!(matches!(err, Error::ByteSourceFault { offset: 2, len: 8, .. }));
}

#[test]
fn huge_fragment_length_is_a_byte_source_fault() {
    use crate::caption::Fragment;

    let data = [0x01u8; 6];
    let size = Size { w: 2, h: 1 };
    let mut warnings = vec![];

    let image = ImageObject::new(vec![Fragment::new(5, usize::MAX)], 2, 0);
    let err = decode_bitmap(&image, size, size, 0, &data[..], &mut warnings).unwrap_err();
    assert!(matches!(err, Error::ByteSourceFault { offset: 5, .. }));

    let image = ImageObject::new(
        vec![Fragment::new(5, 1), Fragment::new(5, usize::MAX)],
        2,
        0,
    );
    let err = decode_bitmap(&image, size, size, 0, &data[..], &mut warnings).unwrap_err();
    assert!(matches!(
        err,
        Error::ByteSourceFault {
            offset: 5,
            len: usize::MAX,
            ..
        }
    ));
    assert!(warnings.is_empty());
}

#[test]
fn bytes_past_buffer_size_are_dropped() {
    use crate::caption::Fragment;

    // The trailing 0x05 would be a fourth pixel in a 3x1 image.
    let data = [0x00, 0x82, 0x09, 0x05];
    let image = ImageObject::new(vec![Fragment::new(0, 4)], 3, 0);
    let size = Size { w: 3, h: 1 };
    let mut warnings = vec![];
    let bitmap = decode_bitmap(&image, size, size, 0, &data[..], &mut warnings).unwrap();
    assert_eq!(bitmap.pixels(), &[9, 9, 0]);
    assert!(warnings.is_empty());
}

#[test]
fn short_fragments_are_decoded_as_is() {
    use crate::caption::Fragment;

    let data = [0x00, 0x82, 0x09];
    let image = ImageObject::new(vec![Fragment::new(0, 3)], 8, 0);
    let size = Size { w: 3, h: 1 };
    let mut warnings = vec![];
    let bitmap = decode_bitmap(&image, size, size, 0, &data[..], &mut warnings).unwrap();
    assert_eq!(bitmap.pixels(), &[9, 9, 0]);
    assert!(warnings.is_empty());
}

#[test]
fn empty_runs_after_the_last_line_are_ignored() {
    let mut warnings = vec![];
    // Two end-of-line commands move past the end, then come empty runs.
    let data = [
        0x01, 0x01, 0x00, 0x00, 0x00, 0x00, // pixels, two end-of-lines
        0x00, 0x40, 0x00, // 0 zeros
        0x00, 0x80, 0x05, // 0 pixels of 5
        0x00, 0xc0, 0x00, 0x05, // 0 pixels of 5
    ];
    let bitmap = decode_test_image(&data, 2, 1, &mut warnings);
    assert_eq!(bitmap.pixels(), &[1, 1]);
    assert!(warnings.is_empty());
}

#[test]
fn empty_image() {
    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x01, 0x02], 0, 4, &mut warnings);
    assert!(bitmap.pixels().is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn primary_color_ignores_transparent_entries() {
    use crate::config::ColorSpace;

    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x00, 0x83, 0x01, 0x02, 0x02, 0x03], 6, 1, &mut warnings);
    let mut palette = Palette::new(ColorSpace::Bt709);
    // Only entries 2 and 3 are visible enough.
    palette.set_alpha(1, 80);
    palette.set_alpha(2, 255);
    palette.set_alpha(3, 81);
    assert_eq!(bitmap.primary_color_index(&palette, 80), 2);
    assert_eq!(bitmap.primary_color_index(&palette, 255), 0);
}

#[test]
fn luma_image_matches_pixels() {
    let mut warnings = vec![];
    let bitmap = decode_test_image(&[0x07, 0x00, 0x00, 0x00, 0x82, 0x09], 2, 2, &mut warnings);
    let img = bitmap.to_luma_image();
    assert_eq!(img.dimensions(), (2, 2));
    assert_eq!(img.get_pixel(0, 0), &Luma([7]));
    assert_eq!(img.get_pixel(1, 1), &Luma([9]));
    assert_eq!(bitmap.pixel(1, 0), Some(0));
    assert_eq!(bitmap.pixel(2, 0), None);
}
