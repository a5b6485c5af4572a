#![no_main]

use libfuzzer_sys::fuzz_target;
use supbd::{Caption, DecoderConfig, Fragment, ImageObject, PaletteSegment, SupDecoder};

// Layout: width, height, palette record count, then palette records
// followed by image data.  Images are kept small so that we spend our time
// in the decoder and not in the allocator.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let width = u16::from(data[0] % 64);
    let height = u16::from(data[1] % 64);
    let records = usize::from(data[2]);
    let body = data[3..].to_vec();

    let palette_len = (records * 5).min(body.len());
    let image_len = body.len() - palette_len;
    let image = ImageObject::new(
        vec![Fragment::new(palette_len as u64, image_len)],
        image_len,
        0,
    );
    let caption = Caption::new(64, 64, width, height, image)
        .with_palette_segment(0, PaletteSegment::new(0, palette_len / 5));

    let decoder = SupDecoder::new(body, vec![caption], DecoderConfig::default());
    if let Ok(decoded) = decoder.decode(0) {
        assert_eq!(
            decoded.bitmap().pixels().len(),
            usize::from(width) * usize::from(height)
        );
    }
});
