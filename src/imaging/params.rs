//! Parameter types for image operations.
//!
//! These types describe *what* an operation should do. The
//! [`calculations`](super::calculations) module turns them into concrete
//! geometry and the [`handle`](super::handle) executes that geometry against a
//! backend.
//!
//! ## Types
//!
//! - [`ResizeMode`] — how requested dimensions are reconciled with the source aspect ratio.
//! - [`WatermarkAnchor`] — where an overlay is placed on the base image.
//! - [`WatermarkOptions`] — margin applied by the corner anchors (default 15px).
//! - [`Quality`] — encoding quality (0–100, default 100). Clamped on construction.
//! - [`Rect`] — integer pixel rectangle handed to the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resize policy.
///
/// - `Strict`: exactly the requested size, aspect ratio ignored.
/// - `Ratio`: fit inside the requested box, preserving aspect ratio.
/// - `Crop`: fill the requested box (overflow on one axis), then center-crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    Strict,
    Ratio,
    #[default]
    Crop,
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "ratio" => Ok(Self::Ratio),
            "crop" => Ok(Self::Crop),
            other => Err(format!("unknown resize mode: {other}")),
        }
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strict => "strict",
            Self::Ratio => "ratio",
            Self::Crop => "crop",
        };
        f.write_str(name)
    }
}

/// Anchor point for a watermark overlay.
///
/// Unknown names parse into [`WatermarkAnchor::Unrecognized`] instead of
/// failing; such an anchor places the overlay at `(0, 0)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WatermarkAnchor {
    TopLeft,
    TopRight,
    #[default]
    BottomRight,
    BottomLeft,
    Center,
    Unrecognized(String),
}

impl WatermarkAnchor {
    pub fn name(&self) -> &str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::Center => "center",
            Self::Unrecognized(name) => name,
        }
    }
}

impl From<&str> for WatermarkAnchor {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-right" => Self::BottomRight,
            "bottom-left" => Self::BottomLeft,
            "center" => Self::Center,
            _ => Self::Unrecognized(s.to_string()),
        }
    }
}

impl From<String> for WatermarkAnchor {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<WatermarkAnchor> for String {
    fn from(anchor: WatermarkAnchor) -> Self {
        anchor.name().to_string()
    }
}

impl fmt::Display for WatermarkAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Margin between the overlay and the base image border, in pixels.
pub const DEFAULT_WATERMARK_OFFSET: i64 = 15;

/// Settings passed into every watermark operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkOptions {
    pub offset: i64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            offset: DEFAULT_WATERMARK_OFFSET,
        }
    }
}

/// Encoding quality (0-100). Only constructed through [`Quality::new`],
/// so the value is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// The value as a byte, for encoders that take one.
    pub fn percent(self) -> u8 {
        u8::try_from(self.0.min(100)).unwrap_or(100)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// Integer pixel rectangle. Origins may be negative or run past the
/// bitmap edge; backends clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    pub fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}
