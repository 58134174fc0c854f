//! # Simple Img
//!
//! A small image-transform library: load a PNG, GIF or JPEG, resize it under
//! one of three policies, crop it, stamp a watermark on it, and write it back
//! out to disk or to an HTTP response.
//!
//! ```text
//! open      file      →  ImageHandle   (sniff format, decode)
//! transform handle    →  handle        (resize / crop / watermark, one commit each)
//! emit      handle    →  file | bytes + headers
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry, formats, the backend trait and [`ImageHandle`](imaging::ImageHandle) |
//! | [`render`] | Encoded bytes plus `Content-Type` / caching headers for transport |
//! | [`config`] | `config.toml` loading, stock defaults, merging and validation |
//! | [`batch`] | Applies a recipe of steps to a directory of images in parallel |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Geometry Apart From Pixels
//!
//! Every dimension decision lives in [`imaging::calculations`] as a pure
//! function over `f64`. The handle only turns a plan into `allocate` /
//! `resample` / `copy` calls, so the resize and watermark rules are tested
//! without decoding a single image, and the recording mock backend can
//! assert the exact rectangles each operation asks for.
//!
//! ## All-Or-Nothing Operations
//!
//! Each transform renders into a fresh bitmap and swaps it in only once
//! everything succeeded. A crop-mode resize does its resample and its center
//! crop on intermediate bitmaps and commits once. A failed operation leaves
//! the handle untouched.
//!
//! ## Three Formats, Closed
//!
//! [`ImageFormat`](imaging::ImageFormat) is an enum, resolved once when an
//! image is loaded. Transparency of new canvases and the quality knob of the
//! encoder both hang off it, so there is no string dispatch at save time.
//!
//! ## Pure-Rust Imaging
//!
//! [`RustBackend`](imaging::RustBackend) is built on the `image` crate alone
//! (Lanczos3 resampling, `png`/`gif`/`jpeg` codecs). No system libraries are
//! needed.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod output;
pub mod render;
