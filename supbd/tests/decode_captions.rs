use std::io;
use supbd::{
    ByteSource, Caption, DecodeWarning, DecoderConfig, Error, Fragment, ImageObject,
    PaletteSegment, SupDecoder, Timestamp,
};

/// Lay out palette records followed by image data, and describe them with a
/// single caption.
fn caption_over(
    records: &[[u8; 5]],
    rle: &[u8],
    (width, height): (u16, u16),
    (max_width, max_height): (u16, u16),
) -> (Vec<u8>, Caption) {
    let mut data: Vec<u8> = records.iter().flat_map(|r| r.iter().copied()).collect();
    let image_offset = data.len() as u64;
    data.extend_from_slice(rle);
    let image = ImageObject::new(vec![Fragment::new(image_offset, rle.len())], rle.len(), 0);
    let mut caption = Caption::new(max_width, max_height, width, height, image);
    // One segment per record, so that each record is a separate update.
    for i in 0..records.len() {
        caption = caption.with_palette_segment(0, PaletteSegment::new(5 * i as u64, 1));
    }
    if records.is_empty() {
        caption = caption.with_palette_segment(0, PaletteSegment::new(0, 0));
    }
    (data, caption)
}

fn decoder_for(data: Vec<u8>, caption: Caption) -> SupDecoder<Vec<u8>> {
    let _ = env_logger::builder().is_test(true).try_init();
    SupDecoder::new(data, vec![caption], DecoderConfig::default())
}

#[test]
fn pixel_then_end_of_line() {
    let (data, caption) = caption_over(&[], &[0x07, 0x00, 0x00], (2, 1), (2, 1));
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    assert_eq!(decoded.bitmap().pixels(), &[7, 0]);
    assert!(decoded.warnings().is_empty());
}

#[test]
fn short_colored_run_then_end_of_stream() {
    let (data, caption) = caption_over(&[], &[0x00, 0x82, 0x09], (3, 1), (3, 1));
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    assert_eq!(decoded.bitmap().pixels(), &[9, 9, 0]);
}

#[test]
fn fade_out_is_suppressed_but_color_changes() {
    let (data, caption) = caption_over(
        &[[10, 200, 128, 128, 255], [10, 50, 128, 128, 100]],
        &[0x0a, 0x0a],
        (2, 1),
        (2, 1),
    );
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    let entry = decoded.palette().entry(10);
    assert_eq!(entry.alpha, 255);
    assert_eq!(entry.y, 50);
    assert_eq!(
        decoded.warnings(),
        &[DecodeWarning::FadeOutDetected { palette_id: 0 }]
    );
    assert_eq!(decoded.primary_color_index(), 10);
}

#[test]
fn bitmap_matches_declared_size() {
    let (data, caption) = caption_over(&[], &[0x01, 0x00, 0x00], (4, 2), (4, 2));
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    let bitmap = decoded.bitmap();
    assert_eq!((bitmap.width(), bitmap.height()), (4, 2));
    assert_eq!(bitmap.pixels().len(), 8);
}

#[test]
fn oversized_caption_fails() {
    let (data, caption) = caption_over(&[], &[0x01], (5, 2), (4, 2));
    match decoder_for(data, caption).decode(0) {
        Err(Error::OversizedPicture {
            width: 5,
            height: 2,
            max_width: 4,
            max_height: 2,
            offset: 0,
            ..
        }) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn truncated_stream_is_not_fatal() {
    let (data, caption) = caption_over(
        &[[1, 235, 128, 128, 255]],
        &[0x01, 0x01, 0x00, 0xc0, 0x03],
        (4, 1),
        (4, 1),
    );
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    assert_eq!(decoded.bitmap().pixels(), &[1, 1, 0, 0]);
    // The bad run starts 2 bytes into the image, which follows one record.
    assert_eq!(
        decoded.warnings(),
        &[DecodeWarning::MalformedRleStream { offset: 7 }]
    );
}

#[test]
fn entry_255_stays_transparent() {
    let (data, caption) = caption_over(&[[1, 235, 128, 128, 255]], &[], (0, 0), (0, 0));
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    assert_eq!(decoded.palette().alpha(255), 0);

    let (data, caption) = caption_over(&[[255, 235, 128, 128, 255]], &[], (0, 0), (0, 0));
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    assert_eq!(decoded.palette().alpha(255), 255);
}

#[test]
fn alpha_never_decreases() {
    // A small linear congruential generator, so the records are varied but
    // repeatable.
    let mut state = 0x2545_f491u32;
    let mut next = move || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (state >> 16) as u8
    };
    let records: Vec<[u8; 5]> = (0..200)
        .map(|_| [next() % 8, next(), next(), next(), next()])
        .collect();

    let (data, caption) = caption_over(&records, &[], (0, 0), (0, 0));
    let decoded = decoder_for(data, caption).decode(0).unwrap();
    for index in 0..8u8 {
        let max_alpha = records
            .iter()
            .filter(|r| r[0] == index)
            .map(|r| r[4])
            .max()
            .unwrap_or(0);
        assert_eq!(decoded.palette().alpha(index), max_alpha);
    }
}

#[test]
fn decoding_is_deterministic() {
    let (data, caption) = caption_over(
        &[[1, 235, 128, 128, 255], [2, 16, 128, 128, 200]],
        &[0x01, 0x02, 0x00, 0x82, 0x01, 0x00, 0x00, 0x00, 0xc0, 0x04, 0x02],
        (4, 2),
        (4, 2),
    );
    let decoder = decoder_for(data, caption);
    let first = decoder.decode(0).unwrap();
    let second = decoder.decode(0).unwrap();
    assert_eq!(first.palette(), second.palette());
    assert_eq!(first.bitmap(), second.bitmap());
    assert_eq!(first.bitmap().pixels(), &[1, 2, 1, 1, 2, 2, 2, 2]);
}

#[test]
fn decoders_can_be_shared_between_threads() {
    let (data, caption) = caption_over(&[[1, 235, 128, 128, 255]], &[0x01], (1, 1), (1, 1));
    let caption = caption.with_times(Timestamp::from_millis(0), Timestamp::from_millis(500));
    let decoder = decoder_for(data, caption);
    let expected = decoder.decode(0).unwrap();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| assert_eq!(decoder.decode(0).unwrap(), expected));
        }
    });
}

/// A byte source where every read fails.
struct Broken;

impl ByteSource for Broken {
    fn byte_at(&self, _offset: u64) -> io::Result<u8> {
        Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
    }
}

#[test]
fn byte_source_faults_are_fatal() {
    let (_, caption) = caption_over(&[[1, 235, 128, 128, 255]], &[0x01], (1, 1), (1, 1));
    let decoder = SupDecoder::new(Broken, vec![caption], DecoderConfig::default());
    match decoder.decode(0) {
        Err(Error::ByteSourceFault { offset: 0, len: 5, source, .. }) => {
            assert_eq!(source.to_string(), "disk on fire");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn missing_palette_fails() {
    let image = ImageObject::new(vec![Fragment::new(0, 1)], 1, 3);
    let caption = Caption::new(1, 1, 1, 1, image)
        .with_palette_segment(0, PaletteSegment::new(0, 0));
    match decoder_for(vec![0x01], caption).decode(0) {
        Err(Error::PaletteNotFound { palette_id: 3, .. }) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn huge_fragment_lengths_fail_cleanly() {
    let data = vec![0x01, 0xeb, 0x80, 0x80, 0xff, 0x01];
    let image = ImageObject::new(vec![Fragment::new(5, usize::MAX)], 1, 0);
    let caption = Caption::new(1, 1, 1, 1, image)
        .with_palette_segment(0, PaletteSegment::new(0, 1));
    match decoder_for(data, caption).decode(0) {
        Err(Error::ByteSourceFault { offset: 5, .. }) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}
