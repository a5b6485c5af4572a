//! Decoder settings.
//!
//! We don't load these from anywhere ourselves, but they can be
//! deserialized with `serde` as part of a host application's config.

use serde::{Deserialize, Serialize};

/// Which YCbCr matrix the palette colors were authored for.  We only store
/// this alongside the palette, so that a renderer can convert to RGB
/// correctly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// ITU-R BT.601, used for standard definition video.
    Bt601,
    /// ITU-R BT.709, used for HD video.
    #[default]
    Bt709,
}

/// Settings which affect how captions are decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Read the chroma bytes of palette records as Cb, Cr instead of the
    /// standard Cr, Cb.  Some broken encoders swap them.
    pub swap_cr_cb: bool,
    /// Palette entries with an alpha below this are made black, so that
    /// scaling algorithms don't pull in the colors of invisible pixels.
    pub alpha_crop: u8,
    /// Palette entries need an alpha above this to be considered when
    /// looking for a caption's primary color.
    pub alpha_threshold: u8,
    /// Passed through to the decoded palette.
    pub color_space: ColorSpace,
}

impl Default for DecoderConfig {
    fn default() -> DecoderConfig {
        DecoderConfig {
            swap_cr_cb: false,
            alpha_crop: 14,
            alpha_threshold: 80,
            color_space: ColorSpace::Bt709,
        }
    }
}

#[test]
fn deserialize_partial_config() {
    let config: DecoderConfig =
        serde_json::from_str(r#"{ "swap_cr_cb": true, "color_space": "bt601" }"#).unwrap();
    assert_eq!(
        config,
        DecoderConfig {
            swap_cr_cb: true,
            color_space: ColorSpace::Bt601,
            ..DecoderConfig::default()
        }
    );
}

#[test]
fn serialize_config() {
    let json = serde_json::to_value(DecoderConfig::default()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "swap_cr_cb": false,
            "alpha_crop": 14,
            "alpha_threshold": 80,
            "color_space": "bt709",
        })
    );
}
