//! The closed set of formats a handle can hold.
//!
//! Each format carries its dispatch entry: MIME subtype, the matching
//! `image` crate format, whether allocations start transparent, and how a
//! [`Quality`] maps onto the encoder setting.
//!
//! | Format | MIME | Transparent fill | Encoder setting |
//! |---|---|---|---|
//! | PNG | `image/png` | yes | compression level `quality/10 - 1` |
//! | GIF | `image/gif` | no | none |
//! | JPEG | `image/jpeg` | no | quality as-is |

use super::params::Quality;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Gif,
    Jpeg,
}

/// Encoder setting derived from a [`Quality`] for a specific format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeSetting {
    /// Format has no quality knob.
    None,
    /// JPEG quality, 0-100.
    Quality(u8),
    /// zlib-style compression level. Negative means "encoder default".
    Compression(i32),
}

struct FormatEntry {
    subtype: &'static str,
    codec: image::ImageFormat,
    transparent: bool,
}

// Indexed by `ImageFormat as usize`.
const DISPATCH: [FormatEntry; 3] = [
    FormatEntry {
        subtype: "png",
        codec: image::ImageFormat::Png,
        transparent: true,
    },
    FormatEntry {
        subtype: "gif",
        codec: image::ImageFormat::Gif,
        transparent: false,
    },
    FormatEntry {
        subtype: "jpeg",
        codec: image::ImageFormat::Jpeg,
        transparent: false,
    },
];

impl ImageFormat {
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Gif, ImageFormat::Jpeg];

    fn entry(self) -> &'static FormatEntry {
        &DISPATCH[self as usize]
    }

    /// Look up a format by MIME subtype (`"png"`, `"gif"`, `"jpeg"`).
    pub fn from_mime_subtype(subtype: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.entry().subtype.eq_ignore_ascii_case(subtype))
    }

    /// Look up a format by file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn mime_subtype(self) -> &'static str {
        self.entry().subtype
    }

    pub fn mime_type(self) -> String {
        format!("image/{}", self.mime_subtype())
    }

    pub fn codec(self) -> image::ImageFormat {
        self.entry().codec
    }

    /// New bitmaps of this format start fully transparent.
    pub fn supports_alpha(self) -> bool {
        self.entry().transparent
    }

    /// Map a quality onto this format's encoder setting.
    ///
    /// PNG uses `trunc(quality / 10 - 1)`, so 100 → 9 and anything below 10
    /// goes negative, which is passed through unchanged.
    pub fn encode_setting(self, quality: Quality) -> EncodeSetting {
        match self {
            Self::Gif => EncodeSetting::None,
            Self::Jpeg => EncodeSetting::Quality(quality.percent()),
            Self::Png => EncodeSetting::Compression(png_compression_level(quality)),
        }
    }
}

fn png_compression_level(quality: Quality) -> i32 {
    (quality.value() as f64 / 10.0 - 1.0) as i32
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_subtype())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_subtype_lookup() {
        assert_eq!(ImageFormat::from_mime_subtype("png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime_subtype("JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime_subtype("webp"), None);
    }

    #[test]
    fn extension_lookup_accepts_jpg() {
        assert_eq!(ImageFormat::from_extension("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("GIF"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_extension("tiff"), None);
    }

    #[test]
    fn only_png_supports_alpha() {
        assert!(ImageFormat::Png.supports_alpha());
        assert!(!ImageFormat::Gif.supports_alpha());
        assert!(!ImageFormat::Jpeg.supports_alpha());
    }

    #[test]
    fn mime_type_has_image_prefix() {
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }

    #[test]
    fn gif_ignores_quality() {
        assert_eq!(
            ImageFormat::Gif.encode_setting(Quality::new(40)),
            EncodeSetting::None
        );
    }

    #[test]
    fn jpeg_uses_quality_directly() {
        assert_eq!(
            ImageFormat::Jpeg.encode_setting(Quality::new(85)),
            EncodeSetting::Quality(85)
        );
    }

    #[test]
    fn out_of_range_quality_encodes_as_maximum() {
        assert_eq!(
            ImageFormat::Jpeg.encode_setting(Quality::new(300)),
            EncodeSetting::Quality(100)
        );
        assert_eq!(
            ImageFormat::Png.encode_setting(Quality::new(300)),
            EncodeSetting::Compression(9)
        );
    }

    #[test]
    fn png_maps_quality_to_compression_level() {
        assert_eq!(
            ImageFormat::Png.encode_setting(Quality::new(100)),
            EncodeSetting::Compression(9)
        );
        assert_eq!(
            ImageFormat::Png.encode_setting(Quality::new(55)),
            EncodeSetting::Compression(4)
        );
    }

    #[test]
    fn png_low_quality_goes_negative() {
        // 5/10 - 1 = -0.5, truncated toward zero → 0
        assert_eq!(
            ImageFormat::Png.encode_setting(Quality::new(5)),
            EncodeSetting::Compression(0)
        );
        // 0/10 - 1 = -1
        assert_eq!(
            ImageFormat::Png.encode_setting(Quality::new(0)),
            EncodeSetting::Compression(-1)
        );
    }
}
