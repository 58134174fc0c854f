//! Raster backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the whole surface the geometry core needs
//! from a raster library: sniff, decode, encode, allocate, resample and
//! paste. [`ImageHandle`](super::handle::ImageHandle) never touches pixels
//! itself.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::format::ImageFormat;
use super::params::{Quality, Rect};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {format} image: {reason}")]
    Decode {
        format: ImageFormat,
        reason: String,
    },
    #[error("Failed to encode {format} image: {reason}")]
    Encode {
        format: ImageFormat,
        reason: String,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Width and height of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Trait for raster backends.
///
/// Bitmaps are owned values of the associated type; dropping one releases
/// it. Every method must leave `dst` untouched when it returns an error.
pub trait ImageBackend: Sync {
    type Bitmap;

    /// Whether this backend can both decode and encode `format`.
    fn supports(&self, format: ImageFormat) -> bool;

    /// Detect the MIME subtype of encoded bytes (e.g. `"png"`, `"webp"`).
    fn sniff(&self, bytes: &[u8]) -> Option<String>;

    /// Decode bytes already identified as `format`.
    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<Self::Bitmap, BackendError>;

    /// Encode a bitmap as `format`.
    fn encode(
        &self,
        bitmap: &Self::Bitmap,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// New bitmap, fully transparent when `transparent` is set, opaque black otherwise.
    ///
    /// Fails instead of aborting when the backend cannot hold a bitmap of
    /// that size.
    fn allocate(
        &self,
        width: u32,
        height: u32,
        transparent: bool,
    ) -> Result<Self::Bitmap, BackendError>;

    fn dimensions(&self, bitmap: &Self::Bitmap) -> Dimensions;

    /// Resample `src_rect` of `src` into `dst_rect` of `dst` with an
    /// interpolating filter. Equal rect sizes copy 1:1. Parts of either
    /// rect outside their bitmap are clipped.
    fn resample(
        &self,
        src: &Self::Bitmap,
        dst: &mut Self::Bitmap,
        src_rect: Rect,
        dst_rect: Rect,
    ) -> Result<(), BackendError>;

    /// Paste all of `src` into `dst` with its top-left at `at`.
    ///
    /// With `blend`, `src` is alpha-composited over `dst`; otherwise pixels
    /// are replaced.
    fn copy(
        &self,
        src: &Self::Bitmap,
        dst: &mut Self::Bitmap,
        at: (i64, i64),
        blend: bool,
    ) -> Result<(), BackendError>;
}
