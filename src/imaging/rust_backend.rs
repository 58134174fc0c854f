//! Pure Rust raster backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff | `image::guess_format` |
//! | Decode (PNG, GIF, JPEG) | `image::load_from_memory_with_format` → RGBA8 |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (level → `CompressionType`) |
//! | Encode → GIF | `image::codecs::gif::GifEncoder` (single frame) |
//! | Resample | `image::imageops::resize` with `Lanczos3` |
//! | Paste | `image::imageops::replace` / `image::imageops::overlay` |
//!
//! Every bitmap is held as `RgbaImage` regardless of the source format; the
//! format only matters again at encode time.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::format::{EncodeSetting, ImageFormat};
use super::params::{Quality, Rect};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Frame, Rgba, RgbaImage};
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const INPUT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    INPUT_CANDIDATES
        .iter()
        .filter(|(_, format)| format.codec().reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

const TRANSPARENT: Rgba<u8> = Rgba([255, 255, 255, 0]);
const OPAQUE_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Largest RGBA8 buffer `allocate` will create: 1 GiB, about 16k x 16k.
const MAX_BITMAP_BYTES: u64 = 1 << 30;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a zlib-style level onto the encoder presets. Negative is the default.
fn png_compression(level: i32) -> CompressionType {
    match level {
        i32::MIN..=-1 => CompressionType::Default,
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Intersect `rect` with a `width`x`height` bitmap. `None` when nothing overlaps.
fn clip(rect: Rect, width: u32, height: u32) -> Option<Rect> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.width as i64).min(width as i64);
    let y1 = (rect.y + rect.height as i64).min(height as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn encode_error(format: ImageFormat, err: impl std::fmt::Display) -> BackendError {
    BackendError::Encode {
        format,
        reason: err.to_string(),
    }
}

impl ImageBackend for RustBackend {
    type Bitmap = RgbaImage;

    fn supports(&self, format: ImageFormat) -> bool {
        let codec = format.codec();
        codec.reading_enabled() && codec.writing_enabled()
    }

    fn sniff(&self, bytes: &[u8]) -> Option<String> {
        let format = image::guess_format(bytes).ok()?;
        format
            .to_mime_type()
            .rsplit('/')
            .next()
            .map(str::to_string)
    }

    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<RgbaImage, BackendError> {
        image::load_from_memory_with_format(bytes, format.codec())
            .map(|img| img.to_rgba8())
            .map_err(|e| BackendError::Decode {
                format,
                reason: e.to_string(),
            })
    }

    fn encode(
        &self,
        bitmap: &RgbaImage,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();

        match format.encode_setting(quality) {
            EncodeSetting::Quality(q) => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(bitmap.clone()).to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut buf, q.clamp(1, 100));
                rgb.write_with_encoder(encoder)
                    .map_err(|e| encode_error(format, e))?;
            }
            EncodeSetting::Compression(level) => {
                let encoder =
                    PngEncoder::new_with_quality(&mut buf, png_compression(level), PngFilter::Adaptive);
                bitmap
                    .write_with_encoder(encoder)
                    .map_err(|e| encode_error(format, e))?;
            }
            EncodeSetting::None => {
                // The trailer is written when the encoder drops
                let mut encoder = GifEncoder::new(&mut buf);
                encoder
                    .encode_frame(Frame::new(bitmap.clone()))
                    .map_err(|e| encode_error(format, e))?;
            }
        }

        Ok(buf)
    }

    fn allocate(
        &self,
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Result<RgbaImage, BackendError> {
        let bytes = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|pixels| pixels.checked_mul(4));
        match bytes {
            Some(bytes) if bytes <= MAX_BITMAP_BYTES => {}
            _ => {
                return Err(BackendError::ProcessingFailed(format!(
                    "{width}x{height} bitmap exceeds the {MAX_BITMAP_BYTES} byte limit"
                )));
            }
        }
        let fill = if transparent { TRANSPARENT } else { OPAQUE_BLACK };
        Ok(RgbaImage::from_pixel(width, height, fill))
    }

    fn dimensions(&self, bitmap: &RgbaImage) -> Dimensions {
        let (width, height) = bitmap.dimensions();
        Dimensions { width, height }
    }

    fn resample(
        &self,
        src: &RgbaImage,
        dst: &mut RgbaImage,
        src_rect: Rect,
        dst_rect: Rect,
    ) -> Result<(), BackendError> {
        if dst_rect.width == 0 || dst_rect.height == 0 {
            return Err(BackendError::ProcessingFailed(
                "destination rectangle is empty".into(),
            ));
        }

        let Some(visible) = clip(src_rect, src.width(), src.height()) else {
            return Ok(());
        };
        let region =
            imageops::crop_imm(src, visible.x as u32, visible.y as u32, visible.width, visible.height)
                .to_image();

        if src_rect.width == dst_rect.width && src_rect.height == dst_rect.height {
            // 1:1 copy, keep the clipped part where it would have landed
            let x = dst_rect.x + (visible.x - src_rect.x);
            let y = dst_rect.y + (visible.y - src_rect.y);
            imageops::replace(dst, &region, x, y);
        } else {
            let scaled = imageops::resize(&region, dst_rect.width, dst_rect.height, FilterType::Lanczos3);
            imageops::replace(dst, &scaled, dst_rect.x, dst_rect.y);
        }
        Ok(())
    }

    fn copy(
        &self,
        src: &RgbaImage,
        dst: &mut RgbaImage,
        at: (i64, i64),
        blend: bool,
    ) -> Result<(), BackendError> {
        if blend {
            imageops::overlay(dst, src, at.0, at.1);
        } else {
            imageops::replace(dst, src, at.0, at.1);
        }
        Ok(())
    }
}
