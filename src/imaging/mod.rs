//! Image transforms over a pluggable raster backend.
//!
//! | Operation | Geometry | Backend primitive |
//! |---|---|---|
//! | **Resize** | `resolve_dimensions` + `plan_resize` | `allocate` + `resample` (Lanczos3) |
//! | **Crop** | `resolve_dimensions` / `center_crop_origin` | `allocate` + `resample` at 1:1 |
//! | **Watermark** | `watermark_position` | `allocate` + `copy` (replace, then blend) |
//! | **Save / encode** | [`ImageFormat::encode_setting`] | `encode` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Format**: The closed PNG/GIF/JPEG set and its per-format behavior
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Handle**: [`ImageHandle`], which runs calculations against a backend and
//!   owns the resulting bitmap

pub mod backend;
pub mod calculations;
pub mod format;
pub mod handle;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use format::{EncodeSetting, ImageFormat};
pub use handle::{ImageError, ImageHandle};
pub use params::{
    DEFAULT_WATERMARK_OFFSET, Quality, Rect, ResizeMode, WatermarkAnchor, WatermarkOptions,
};
pub use rust_backend::{RustBackend, supported_input_extensions};
