//! # Caption metadata.
//!
//! These types describe where a caption's data lives in the byte source.
//! They are normally produced by a parser for the `*.sup` segment stream,
//! which isn't part of this crate, and they are never modified after that.

use std::collections::BTreeMap;

use crate::clock::Timestamp;

/// A contiguous chunk of run-length encoded image data.  Large images are
/// split across several packets, and we glue the chunks back together in
/// order before decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Offset of the first byte in the byte source.
    pub offset: u64,
    /// Number of bytes in this fragment.
    pub len: usize,
}

impl Fragment {
    /// Create a new `Fragment`.
    pub fn new(offset: u64, len: usize) -> Fragment {
        Fragment { offset, len }
    }
}

/// A run of 5-byte palette records, each of which contains a palette index,
/// Y, two chroma values and alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteSegment {
    /// Offset of the first record in the byte source.
    pub offset: u64,
    /// Number of records.
    pub entry_count: usize,
}

impl PaletteSegment {
    /// The size of a single palette record, in bytes.
    pub const RECORD_SIZE: usize = 5;

    /// Create a new `PaletteSegment`.
    pub fn new(offset: u64, entry_count: usize) -> PaletteSegment {
        PaletteSegment {
            offset,
            entry_count,
        }
    }
}

/// The run-length encoded image of a caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageObject {
    fragments: Vec<Fragment>,
    buffer_size: usize,
    palette_id: u8,
}

impl ImageObject {
    /// Create a new `ImageObject`.  `buffer_size` is the total size of the
    /// encoded image, as announced by the first packet.
    pub fn new(fragments: Vec<Fragment>, buffer_size: usize, palette_id: u8) -> ImageObject {
        ImageObject {
            fragments,
            buffer_size,
            palette_id,
        }
    }

    /// The fragments making up the encoded image, in stream order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The announced size of the encoded image.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The palette this image must be drawn with.
    pub fn palette_id(&self) -> u8 {
        self.palette_id
    }

    /// Offset of the first fragment, used when reporting errors.
    pub fn start_offset(&self) -> Option<u64> {
        self.fragments.first().map(|f| f.offset)
    }
}

/// The video frame rate a caption was authored for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRate {
    /// 24000/1001 frames per second.
    Film,
    /// 24 frames per second.
    Fps24,
    /// 25 frames per second.
    Pal,
    /// 30000/1001 frames per second.
    Ntsc,
    /// 50 fields per second.
    PalInterlaced,
    /// 60000/1001 fields per second.
    NtscInterlaced,
}

impl FrameRate {
    /// Decode the frame rate ID stored in a caption.  Unknown values are
    /// treated as film.
    pub fn from_id(id: u8) -> FrameRate {
        match id {
            0x20 => FrameRate::Fps24,
            0x30 => FrameRate::Pal,
            0x40 => FrameRate::Ntsc,
            0x60 => FrameRate::PalInterlaced,
            0x70 => FrameRate::NtscInterlaced,
            _ => FrameRate::Film,
        }
    }

    /// The ID used for this frame rate in a caption.
    pub fn id(self) -> u8 {
        match self {
            FrameRate::Film => 0x10,
            FrameRate::Fps24 => 0x20,
            FrameRate::Pal => 0x30,
            FrameRate::Ntsc => 0x40,
            FrameRate::PalInterlaced => 0x60,
            FrameRate::NtscInterlaced => 0x70,
        }
    }

    /// Frames per second.
    pub fn fps(self) -> f64 {
        match self {
            FrameRate::Film => 24000.0 / 1001.0,
            FrameRate::Fps24 => 24.0,
            FrameRate::Pal => 25.0,
            FrameRate::Ntsc => 30000.0 / 1001.0,
            FrameRate::PalInterlaced => 50.0,
            FrameRate::NtscInterlaced => 60000.0 / 1001.0,
        }
    }
}

#[test]
fn frame_rate_ids() {
    for rate in [
        FrameRate::Film,
        FrameRate::Fps24,
        FrameRate::Pal,
        FrameRate::Ntsc,
        FrameRate::PalInterlaced,
        FrameRate::NtscInterlaced,
    ] {
        assert_eq!(FrameRate::from_id(rate.id()), rate);
    }
    assert_eq!(FrameRate::from_id(0x00), FrameRate::Film);
    assert_eq!(FrameRate::from_id(0x50), FrameRate::Film);
    assert!((FrameRate::Ntsc.fps() - 29.97).abs() < 0.001);
}

/// A single Blu-ray caption.
#[derive(Clone, Debug, PartialEq)]
pub struct Caption {
    /// Width of the video frame, which bounds the image.
    width: u16,
    /// Height of the video frame, which bounds the image.
    height: u16,
    image_width: u16,
    image_height: u16,
    x_offset: u16,
    y_offset: u16,
    start_time: Timestamp,
    end_time: Timestamp,
    forced: bool,
    frame_rate_id: u8,
    palettes: BTreeMap<u8, Vec<PaletteSegment>>,
    image_object: ImageObject,
}

impl Caption {
    /// Create a caption for an image of `image_width`x`image_height` pixels
    /// shown on a `width`x`height` video frame.  Everything else starts out
    /// empty, and can be filled in using the `with_*` methods.
    pub fn new(
        width: u16,
        height: u16,
        image_width: u16,
        image_height: u16,
        image_object: ImageObject,
    ) -> Caption {
        Caption {
            width,
            height,
            image_width,
            image_height,
            x_offset: 0,
            y_offset: 0,
            start_time: Timestamp::default(),
            end_time: Timestamp::default(),
            forced: false,
            frame_rate_id: FrameRate::Film.id(),
            palettes: BTreeMap::new(),
            image_object,
        }
    }

    /// Set the start and end times.
    pub fn with_times(mut self, start_time: Timestamp, end_time: Timestamp) -> Caption {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Set the position of the image's upper-left corner on the frame.
    pub fn with_offset(mut self, x: u16, y: u16) -> Caption {
        self.x_offset = x;
        self.y_offset = y;
        self
    }

    /// Mark the caption as forced.
    pub fn with_forced(mut self, forced: bool) -> Caption {
        self.forced = forced;
        self
    }

    /// Set the raw frame rate ID.
    pub fn with_frame_rate_id(mut self, id: u8) -> Caption {
        self.frame_rate_id = id;
        self
    }

    /// Append a palette segment to the palette `palette_id`.  Segments are
    /// applied in the order they were added.
    pub fn with_palette_segment(mut self, palette_id: u8, segment: PaletteSegment) -> Caption {
        self.palettes.entry(palette_id).or_default().push(segment);
        self
    }

    /// Width of the video frame.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the video frame.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Width of the caption image.
    pub fn image_width(&self) -> u16 {
        self.image_width
    }

    /// Height of the caption image.
    pub fn image_height(&self) -> u16 {
        self.image_height
    }

    /// Horizontal position of the image on the frame.
    pub fn x_offset(&self) -> u16 {
        self.x_offset
    }

    /// Vertical position of the image on the frame.
    pub fn y_offset(&self) -> u16 {
        self.y_offset
    }

    /// When to start showing the caption.
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// When to stop showing the caption.
    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    /// Should this caption be shown even when subtitles are off?
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// The raw frame rate ID.
    pub fn frame_rate_id(&self) -> u8 {
        self.frame_rate_id
    }

    /// The frame rate this caption was authored for.
    pub fn frame_rate(&self) -> FrameRate {
        FrameRate::from_id(self.frame_rate_id)
    }

    /// Palette segments, by palette ID.
    pub fn palettes(&self) -> &BTreeMap<u8, Vec<PaletteSegment>> {
        &self.palettes
    }

    /// The caption's image.
    pub fn image_object(&self) -> &ImageObject {
        &self.image_object
    }
}

#[test]
fn palette_segments_keep_their_order() {
    let obj = ImageObject::new(vec![Fragment::new(100, 10)], 10, 1);
    let caption = Caption::new(1920, 1080, 400, 80, obj)
        .with_palette_segment(1, PaletteSegment::new(20, 2))
        .with_palette_segment(0, PaletteSegment::new(0, 1))
        .with_palette_segment(1, PaletteSegment::new(40, 3));
    assert_eq!(
        caption.palettes()[&1],
        vec![PaletteSegment::new(20, 2), PaletteSegment::new(40, 3)]
    );
    assert_eq!(caption.image_object().start_offset(), Some(100));
    assert_eq!(caption.frame_rate(), FrameRate::Film);
}
