//! The image handle: one bitmap, its format and size, and the operations
//! that replace it.
//!
//! Every mutating operation follows the same shape: validate, compute the
//! geometry (see [`calculations`](super::calculations)), render into a fresh
//! bitmap, then commit. A failure anywhere before the commit leaves the
//! handle exactly as it was.
//!
//! ```no_run
//! use simple_img::imaging::{
//!     ImageError, ImageHandle, Quality, ResizeMode, RustBackend, WatermarkAnchor, WatermarkOptions,
//! };
//! use std::path::Path;
//!
//! fn main() -> Result<(), ImageError> {
//!     let backend = RustBackend::new();
//!     let mut image = ImageHandle::open(&backend, "photo.jpg")?;
//!     image.resize(Some(200), Some(200), ResizeMode::Crop)?;
//!     image.watermark("logo.png", &WatermarkAnchor::Center, None, None, WatermarkOptions::default())?;
//!     image.save(Some(Path::new("thumb.jpg")), Quality::default())?;
//!     Ok(())
//! }
//! ```

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    center_crop_origin, plan_resize, resolve_dimensions, to_pixels, watermark_position,
};
use super::format::ImageFormat;
use super::params::{Quality, Rect, ResizeMode, WatermarkAnchor, WatermarkOptions};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("No image was loaded")]
    NotLoaded,
    #[error("The file {} does not exist", .0.display())]
    FileNotFound(PathBuf),
    #[error("The file {} is not readable: {source}", .path.display())]
    FileNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("The file {} is not writable: {source}", .path.display())]
    FileNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unknown image format: {0}")]
    UnsupportedFormat(String),
    #[error("The imaging backend cannot handle {0} images")]
    BackendUnavailable(ImageFormat),
    #[error("Please specify at least one of the width and height parameters")]
    MissingDimension,
    #[error(
        "The cropping dimensions must be smaller than the original ones ({}x{} requested, {width}x{height} available)",
        fmt_dim(.requested_width),
        fmt_dim(.requested_height)
    )]
    CropDimensionExceeded {
        requested_width: Option<u32>,
        requested_height: Option<u32>,
        width: u32,
        height: u32,
    },
    #[error("Invalid image bitmap provided ({width}x{height})")]
    InvalidBitmapHandle { width: u32, height: u32 },
    #[error("No output path given and the image was not loaded from a file")]
    MissingPath,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn fmt_dim(value: &Option<u32>) -> String {
    value.map_or_else(|| "auto".to_string(), |v| v.to_string())
}

/// Result type for handle operations.
pub type Result<T> = std::result::Result<T, ImageError>;

/// The bitmap a loaded handle holds, plus what is known about it.
struct Loaded<T> {
    bitmap: T,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl<T> Loaded<T> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Swap in a freshly rendered bitmap. The previous one is dropped here.
    fn commit(&mut self, backend: &impl ImageBackend<Bitmap = T>, bitmap: T) {
        let Dimensions { width, height } = backend.dimensions(&bitmap);
        self.bitmap = bitmap;
        self.width = width;
        self.height = height;
        debug!(width, height, "Committed bitmap");
    }
}

/// A single image: owns its current bitmap exclusively and borrows the
/// backend that renders it.
///
/// A handle is either empty or loaded. Operations on an empty handle fail
/// with [`ImageError::NotLoaded`] before touching the backend. Bitmaps are
/// released when the handle drops or on [`release`](Self::release).
pub struct ImageHandle<'b, B: ImageBackend> {
    backend: &'b B,
    loaded: Option<Loaded<B::Bitmap>>,
    path: Option<PathBuf>,
}

impl<'b, B: ImageBackend> ImageHandle<'b, B> {
    // -- Construction ---------------------------------------------------------

    /// An empty handle. Load an image with [`load`](Self::load).
    pub fn new(backend: &'b B) -> Self {
        Self {
            backend,
            loaded: None,
            path: None,
        }
    }

    /// Open and decode an image file.
    pub fn open(backend: &'b B, path: impl AsRef<Path>) -> Result<Self> {
        let mut handle = Self::new(backend);
        handle.load(path)?;
        Ok(handle)
    }

    /// Decode an in-memory image. The handle has no default save path.
    pub fn from_bytes(backend: &'b B, bytes: &[u8]) -> Result<Self> {
        let loaded = decode(backend, bytes)?;
        Ok(Self {
            backend,
            loaded: Some(loaded),
            path: None,
        })
    }

    /// Wrap an externally produced bitmap.
    pub fn from_bitmap(backend: &'b B, bitmap: B::Bitmap, format: ImageFormat) -> Result<Self> {
        let Dimensions { width, height } = valid_dimensions(backend, &bitmap)?;
        Ok(Self {
            backend,
            loaded: Some(Loaded {
                bitmap,
                format,
                width,
                height,
            }),
            path: None,
        })
    }

    /// Load an image file, replacing whatever the handle held.
    ///
    /// On failure the handle keeps its previous contents.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImageError::FileNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|source| ImageError::FileNotReadable {
            path: path.to_path_buf(),
            source,
        })?;

        let loaded = decode(self.backend, &bytes)?;
        info!(
            format = %loaded.format,
            width = loaded.width,
            height = loaded.height,
            "Image loaded"
        );
        self.loaded = Some(loaded);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace the current bitmap with an externally produced one of the
    /// same format.
    pub fn set_bitmap(&mut self, bitmap: B::Bitmap) -> Result<()> {
        let backend = self.backend;
        let current = self.loaded.as_mut().ok_or(ImageError::NotLoaded)?;
        valid_dimensions(backend, &bitmap)?;
        current.commit(backend, bitmap);
        Ok(())
    }

    /// Drop the held bitmap. The handle becomes empty.
    pub fn release(&mut self) {
        self.loaded = None;
    }

    // -- Accessors ------------------------------------------------------------

    fn current(&self) -> Result<&Loaded<B::Bitmap>> {
        self.loaded.as_ref().ok_or(ImageError::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn backend(&self) -> &'b B {
        self.backend
    }

    pub fn width(&self) -> Result<u32> {
        Ok(self.current()?.width)
    }

    pub fn height(&self) -> Result<u32> {
        Ok(self.current()?.height)
    }

    pub fn dimensions(&self) -> Result<Dimensions> {
        let current = self.current()?;
        Ok(Dimensions::new(current.width, current.height))
    }

    pub fn format(&self) -> Result<ImageFormat> {
        Ok(self.current()?.format)
    }

    /// File the image was loaded from, used as the default save target.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bitmap(&self) -> Result<&B::Bitmap> {
        Ok(&self.current()?.bitmap)
    }

    /// Take the bitmap out, consuming the handle.
    pub fn into_bitmap(self) -> Result<B::Bitmap> {
        self.loaded
            .map(|loaded| loaded.bitmap)
            .ok_or(ImageError::NotLoaded)
    }

    // -- Transformations ------------------------------------------------------

    /// Resize under one of the three [`ResizeMode`]s.
    ///
    /// A missing dimension is derived from the current aspect ratio. In crop
    /// mode an aspect mismatch resamples to cover the requested box and then
    /// trims it from the center, all before the single commit.
    #[instrument(skip(self))]
    pub fn resize(
        &mut self,
        width: Option<u32>,
        height: Option<u32>,
        mode: ResizeMode,
    ) -> Result<()> {
        let backend = self.backend;
        let current = self.loaded.as_mut().ok_or(ImageError::NotLoaded)?;
        let source = current.size();

        let requested = resolve_dimensions(width.map(f64::from), height.map(f64::from), source)
            .ok_or(ImageError::MissingDimension)?;
        let plan = plan_resize(requested, source, mode);
        let fitted = (to_pixels(plan.width), to_pixels(plan.height));
        debug!(
            from_w = source.0,
            from_h = source.1,
            to_w = fitted.0,
            to_h = fitted.1,
            crop = plan.crop_to.is_some(),
            "Resize planned"
        );

        let mut resampled = backend.allocate(fitted.0, fitted.1, current.format.supports_alpha())?;
        backend.resample(
            &current.bitmap,
            &mut resampled,
            Rect::sized(source.0, source.1),
            Rect::sized(fitted.0, fitted.1),
        )?;

        let finished = match plan.crop_to {
            Some((crop_w, crop_h)) => {
                let target = (to_pixels(crop_w), to_pixels(crop_h));
                let (x, y) = center_crop_origin(fitted, target);
                render_crop(
                    backend,
                    &resampled,
                    current.format,
                    fitted,
                    (x, y),
                    (Some(target.0), Some(target.1)),
                )?
            }
            None => resampled,
        };

        current.commit(backend, finished);
        Ok(())
    }

    /// Copy the rectangle at `(x, y)` into a new bitmap of that size.
    ///
    /// An explicitly given width or height larger than the current image is
    /// rejected before anything else; a missing one is derived from the
    /// aspect ratio.
    #[instrument(skip(self))]
    pub fn crop(&mut self, x: i64, y: i64, width: Option<u32>, height: Option<u32>) -> Result<()> {
        let backend = self.backend;
        let current = self.loaded.as_mut().ok_or(ImageError::NotLoaded)?;
        let cropped = render_crop(
            backend,
            &current.bitmap,
            current.format,
            current.size(),
            (x, y),
            (width, height),
        )?;
        current.commit(backend, cropped);
        Ok(())
    }

    /// Crop a `width`x`height` rectangle from the middle of the image.
    pub fn crop_from_center(&mut self, width: u32, height: u32) -> Result<()> {
        let (x, y) = center_crop_origin(self.current()?.size(), (width, height));
        self.crop(x, y, Some(width), Some(height))
    }

    /// Stamp the image at `overlay` onto this one.
    ///
    /// The overlay is loaded into its own handle, resized strictly when a
    /// size is given, composited, and dropped again on every path.
    #[instrument(skip(self, overlay, options), fields(mark = %overlay.as_ref().display()))]
    pub fn watermark(
        &mut self,
        overlay: impl AsRef<Path>,
        anchor: &WatermarkAnchor,
        width: Option<u32>,
        height: Option<u32>,
        options: WatermarkOptions,
    ) -> Result<()> {
        if !self.is_loaded() {
            return Err(ImageError::NotLoaded);
        }

        let mut mark = ImageHandle::open(self.backend, overlay)?;
        if width.is_some_and(|w| w > 0) || height.is_some_and(|h| h > 0) {
            mark.resize(width, height, ResizeMode::Strict)?;
        }
        self.watermark_handle(&mark, anchor, options)
    }

    /// Composite an already loaded overlay handle onto this one.
    pub fn watermark_handle(
        &mut self,
        overlay: &ImageHandle<'_, B>,
        anchor: &WatermarkAnchor,
        options: WatermarkOptions,
    ) -> Result<()> {
        let backend = self.backend;
        let base = self.loaded.as_mut().ok_or(ImageError::NotLoaded)?;
        let mark = overlay.current()?;

        let (x, y) = watermark_position(anchor, base.size(), mark.size(), options.offset);
        // Fractional center placements truncate toward zero
        let at = (x as i64, y as i64);
        debug!(anchor = %anchor, x = at.0, y = at.1, "Watermark placed");

        let mut composed = backend.allocate(base.width, base.height, base.format.supports_alpha())?;
        backend.copy(&base.bitmap, &mut composed, (0, 0), false)?;
        backend.copy(&mark.bitmap, &mut composed, at, true)?;

        base.commit(backend, composed);
        Ok(())
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current bitmap in the handle's own format.
    pub fn encode(&self, quality: Quality) -> Result<Vec<u8>> {
        let current = self.current()?;
        Ok(self
            .backend
            .encode(&current.bitmap, current.format, quality)?)
    }

    /// Write the image to `path`, or back to the file it was loaded from.
    ///
    /// The handle's own format is used whatever the extension says.
    #[instrument(skip(self))]
    pub fn save(&self, path: Option<&Path>, quality: Quality) -> Result<PathBuf> {
        let target = path
            .or(self.path.as_deref())
            .ok_or(ImageError::MissingPath)?
            .to_path_buf();
        let bytes = self.encode(quality)?;
        fs::write(&target, &bytes).map_err(|source| ImageError::FileNotWritable {
            path: target.clone(),
            source,
        })?;
        info!(path = %target.display(), bytes = bytes.len(), "Image saved");
        Ok(target)
    }
}

/// Sniff, check and decode encoded bytes.
fn decode<B: ImageBackend>(backend: &B, bytes: &[u8]) -> Result<Loaded<B::Bitmap>> {
    let subtype = backend
        .sniff(bytes)
        .unwrap_or_else(|| "unknown".to_string());
    let format = ImageFormat::from_mime_subtype(&subtype)
        .ok_or(ImageError::UnsupportedFormat(subtype))?;
    if !backend.supports(format) {
        return Err(ImageError::BackendUnavailable(format));
    }

    let bitmap = backend.decode(bytes, format)?;
    let Dimensions { width, height } = valid_dimensions(backend, &bitmap)?;
    Ok(Loaded {
        bitmap,
        format,
        width,
        height,
    })
}

fn valid_dimensions<B: ImageBackend>(backend: &B, bitmap: &B::Bitmap) -> Result<Dimensions> {
    let dims = backend.dimensions(bitmap);
    if dims.is_empty() {
        return Err(ImageError::InvalidBitmapHandle {
            width: dims.width,
            height: dims.height,
        });
    }
    Ok(dims)
}

/// Render the crop rectangle of `source` into a new bitmap without
/// committing it.
fn render_crop<B: ImageBackend>(
    backend: &B,
    source: &B::Bitmap,
    format: ImageFormat,
    size: (u32, u32),
    origin: (i64, i64),
    requested: (Option<u32>, Option<u32>),
) -> Result<B::Bitmap> {
    let (width, height) = requested;
    if width.is_some_and(|w| w > size.0) || height.is_some_and(|h| h > size.1) {
        return Err(ImageError::CropDimensionExceeded {
            requested_width: width,
            requested_height: height,
            width: size.0,
            height: size.1,
        });
    }

    let (w, h) = resolve_dimensions(width.map(f64::from), height.map(f64::from), size)
        .ok_or(ImageError::MissingDimension)?;
    let (w, h) = (to_pixels(w), to_pixels(h));

    let mut cropped = backend.allocate(w, h, format.supports_alpha())?;
    backend.resample(
        source,
        &mut cropped,
        Rect::new(origin.0, origin.1, w, h),
        Rect::sized(w, h),
    )?;
    Ok(cropped)
}
