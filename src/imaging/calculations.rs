//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Dimensions stay `f64` until they reach an allocation; [`to_pixels`] is the
//! single place where a fractional size becomes a pixel count.

use super::params::{ResizeMode, WatermarkAnchor};

/// Fill in a missing dimension from the source aspect ratio.
///
/// A zero or absent value counts as missing. Returns `None` when both are
/// missing. Derived values are not rounded.
///
/// # Examples
/// ```
/// # use simple_img::imaging::calculations::resolve_dimensions;
/// assert_eq!(resolve_dimensions(Some(200.0), None, (1000, 625)), Some((200.0, 125.0)));
/// assert_eq!(resolve_dimensions(None, None, (1000, 625)), None);
/// ```
pub fn resolve_dimensions(
    width: Option<f64>,
    height: Option<f64>,
    source: (u32, u32),
) -> Option<(f64, f64)> {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    let width = width.filter(|w| *w > 0.0);
    let height = height.filter(|h| *h > 0.0);

    match (width, height) {
        (None, None) => None,
        (Some(w), Some(h)) => Some((w, h)),
        (None, Some(h)) => Some((h * src_w / src_h, h)),
        (Some(w), None) => Some((w, w * src_h / src_w)),
    }
}

/// Outcome of fitting requested dimensions against a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizePlan {
    /// Size to resample the whole source into.
    pub width: f64,
    pub height: f64,
    /// Center-crop target applied after resampling (crop mode only).
    pub crop_to: Option<(f64, f64)>,
}

/// Reconcile resolved dimensions with the source aspect ratio.
///
/// In strict mode the request passes through untouched. Otherwise a request
/// larger than the source on either axis is replaced by the source size, and
/// an aspect mismatch is resolved by re-deriving one axis: ratio mode keeps
/// the smaller scale factor (fits inside), crop mode keeps the larger one
/// (overflows) and records the request as the crop target.
///
/// The aspect comparison is exact.
pub fn plan_resize(requested: (f64, f64), source: (u32, u32), mode: ResizeMode) -> ResizePlan {
    let (mut width, mut height) = requested;
    let mut crop_to = None;

    if mode == ResizeMode::Strict {
        return ResizePlan {
            width,
            height,
            crop_to,
        };
    }

    let (src_w, src_h) = (source.0 as f64, source.1 as f64);

    // Both axes reset together
    if width > src_w || height > src_h {
        width = src_w;
        height = src_h;
    }

    if width / height != src_w / src_h {
        if mode == ResizeMode::Crop {
            crop_to = Some((width, height));
        }

        let scale_w = width / src_w;
        let scale_h = height / src_h;
        let height_drives = (scale_w > scale_h && mode == ResizeMode::Ratio)
            || (scale_w < scale_h && mode == ResizeMode::Crop);

        if height_drives {
            width = height * src_w / src_h;
        } else {
            height = width * src_h / src_w;
        }
    }

    ResizePlan {
        width,
        height,
        crop_to,
    }
}

/// Convert a fractional dimension into a pixel count (nearest, at least 1).
pub fn to_pixels(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Top-left corner of a `target`-sized rectangle centered in `source`.
///
/// Truncates toward zero; oversized targets give negative coordinates.
pub fn center_crop_origin(source: (u32, u32), target: (u32, u32)) -> (i64, i64) {
    let x = (source.0 as i64 - target.0 as i64) / 2;
    let y = (source.1 as i64 - target.1 as i64) / 2;
    (x, y)
}

/// Where the top-left corner of an overlay lands on the base image.
///
/// Center placement is exact and may be fractional; callers truncate toward
/// zero when handing it to a paste. Unrecognized anchors land at `(0, 0)`.
pub fn watermark_position(
    anchor: &WatermarkAnchor,
    base: (u32, u32),
    overlay: (u32, u32),
    offset: i64,
) -> (f64, f64) {
    let (base_w, base_h) = (base.0 as f64, base.1 as f64);
    let (over_w, over_h) = (overlay.0 as f64, overlay.1 as f64);
    let offset = offset as f64;

    match anchor {
        WatermarkAnchor::TopLeft => (offset, offset),
        WatermarkAnchor::TopRight => (base_w - over_w - offset, offset),
        WatermarkAnchor::BottomRight => (base_w - over_w - offset, base_h - over_h - offset),
        WatermarkAnchor::BottomLeft => (offset, base_h - over_h - offset),
        WatermarkAnchor::Center => ((base_w - over_w) / 2.0, (base_h - over_h) / 2.0),
        WatermarkAnchor::Unrecognized(_) => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // resolve_dimensions tests
    // =========================================================================

    #[test]
    fn resolve_both_given_passes_through() {
        assert_eq!(
            resolve_dimensions(Some(300.0), Some(100.0), (1000, 625)),
            Some((300.0, 100.0))
        );
    }

    #[test]
    fn resolve_derives_height_from_width() {
        // 1000x625 is 1.6:1, so 200 wide → 125 high
        assert_eq!(
            resolve_dimensions(Some(200.0), None, (1000, 625)),
            Some((200.0, 125.0))
        );
    }

    #[test]
    fn resolve_derives_width_from_height() {
        assert_eq!(
            resolve_dimensions(None, Some(125.0), (1000, 625)),
            Some((200.0, 125.0))
        );
    }

    #[test]
    fn resolve_does_not_round() {
        // 333 * 625 / 1000 = 208.125
        let (_, h) = resolve_dimensions(Some(333.0), None, (1000, 625)).unwrap();
        assert_eq!(h, 208.125);
    }

    #[test]
    fn resolve_treats_zero_as_missing() {
        assert_eq!(resolve_dimensions(Some(0.0), Some(0.0), (10, 10)), None);
        assert_eq!(
            resolve_dimensions(Some(0.0), Some(50.0), (200, 100)),
            Some((100.0, 50.0))
        );
    }

    #[test]
    fn resolve_fails_when_both_missing() {
        assert_eq!(resolve_dimensions(None, None, (1000, 625)), None);
    }

    // =========================================================================
    // plan_resize tests
    // =========================================================================

    #[test]
    fn strict_ignores_aspect_and_bounds() {
        let plan = plan_resize((2000.0, 50.0), (1000, 625), ResizeMode::Strict);
        assert_eq!(plan.width, 2000.0);
        assert_eq!(plan.height, 50.0);
        assert_eq!(plan.crop_to, None);
    }

    #[test]
    fn ratio_fits_inside_height_bound() {
        // 200/1000 = 0.2 > 100/625 = 0.16, height drives → 160x100
        let plan = plan_resize((200.0, 100.0), (1000, 625), ResizeMode::Ratio);
        assert_eq!(to_pixels(plan.width), 160);
        assert_eq!(to_pixels(plan.height), 100);
        assert_eq!(plan.crop_to, None);
    }

    #[test]
    fn ratio_fits_inside_width_bound() {
        // 200/1000 = 0.2 < 200/625 = 0.32, width drives → 200x125
        let plan = plan_resize((200.0, 200.0), (1000, 625), ResizeMode::Ratio);
        assert_eq!(plan.width, 200.0);
        assert_eq!(plan.height, 125.0);
    }

    #[test]
    fn crop_overflows_then_records_target() {
        // Crop keeps the larger scale factor: 320x200, then crop to 200x200
        let plan = plan_resize((200.0, 200.0), (1000, 625), ResizeMode::Crop);
        assert_eq!(plan.width, 320.0);
        assert_eq!(plan.height, 200.0);
        assert_eq!(plan.crop_to, Some((200.0, 200.0)));
    }

    #[test]
    fn crop_with_portrait_target_overflows_width() {
        // 100/1000 = 0.1 < 300/625 = 0.48, height drives → 480x300
        let plan = plan_resize((100.0, 300.0), (1000, 625), ResizeMode::Crop);
        assert_eq!(plan.width, 480.0);
        assert_eq!(plan.height, 300.0);
        assert_eq!(plan.crop_to, Some((100.0, 300.0)));
    }

    #[test]
    fn matching_aspect_needs_no_crop() {
        let plan = plan_resize((500.0, 312.5), (1000, 625), ResizeMode::Crop);
        assert_eq!(plan.crop_to, None);
        assert_eq!(plan.width, 500.0);
    }

    #[test]
    fn oversized_request_resets_both_axes() {
        // Only width exceeds, but the whole pair falls back to the source
        let plan = plan_resize((1200.0, 100.0), (1000, 625), ResizeMode::Ratio);
        assert_eq!(plan.width, 1000.0);
        assert_eq!(plan.height, 625.0);
        assert_eq!(plan.crop_to, None);
    }

    #[test]
    fn ratio_never_exceeds_requested_box() {
        let source = (1000, 625);
        for (w, h) in [(200.0, 100.0), (100.0, 200.0), (640.0, 480.0), (999.0, 1.0)] {
            let plan = plan_resize((w, h), source, ResizeMode::Ratio);
            assert!(plan.width <= w + 1e-9, "{w}x{h} → {plan:?}");
            assert!(plan.height <= h + 1e-9, "{w}x{h} → {plan:?}");
        }
    }

    #[test]
    fn crop_always_covers_requested_box() {
        let source = (1000, 625);
        for (w, h) in [(200.0, 100.0), (100.0, 200.0), (640.0, 480.0), (50.0, 50.0)] {
            let plan = plan_resize((w, h), source, ResizeMode::Crop);
            assert!(plan.width + 1e-9 >= w, "{w}x{h} → {plan:?}");
            assert!(plan.height + 1e-9 >= h, "{w}x{h} → {plan:?}");
        }
    }

    // =========================================================================
    // Pixel conversion and crop origin tests
    // =========================================================================

    #[test]
    fn to_pixels_rounds_to_nearest() {
        assert_eq!(to_pixels(208.125), 208);
        assert_eq!(to_pixels(159.6), 160);
    }

    #[test]
    fn to_pixels_never_returns_zero() {
        assert_eq!(to_pixels(0.2), 1);
    }

    #[test]
    fn center_crop_origin_truncates() {
        assert_eq!(center_crop_origin((320, 200), (200, 200)), (60, 0));
        assert_eq!(center_crop_origin((101, 50), (50, 25)), (25, 12));
    }

    #[test]
    fn center_crop_origin_goes_negative_when_oversized() {
        assert_eq!(center_crop_origin((100, 100), (201, 100)), (-50, 0));
    }

    // =========================================================================
    // watermark_position tests
    // =========================================================================

    const BASE: (u32, u32) = (400, 300);
    const MARK: (u32, u32) = (100, 51);

    #[test]
    fn watermark_corners_apply_offset() {
        let pos = |anchor| watermark_position(&anchor, BASE, MARK, 15);
        assert_eq!(pos(WatermarkAnchor::TopLeft), (15.0, 15.0));
        assert_eq!(pos(WatermarkAnchor::TopRight), (285.0, 15.0));
        assert_eq!(pos(WatermarkAnchor::BottomRight), (285.0, 234.0));
        assert_eq!(pos(WatermarkAnchor::BottomLeft), (15.0, 234.0));
    }

    #[test]
    fn watermark_center_is_exact() {
        let pos = watermark_position(&WatermarkAnchor::Center, BASE, MARK, 15);
        assert_eq!(pos, (150.0, 124.5));
    }

    #[test]
    fn watermark_unrecognized_anchor_is_origin() {
        let anchor = WatermarkAnchor::Unrecognized("somewhere".into());
        assert_eq!(watermark_position(&anchor, BASE, MARK, 15), (0.0, 0.0));
    }

    #[test]
    fn watermark_offset_is_configurable() {
        let pos = watermark_position(&WatermarkAnchor::TopLeft, BASE, MARK, 0);
        assert_eq!(pos, (0.0, 0.0));
    }

    #[test]
    fn watermark_larger_than_base_goes_negative() {
        let pos = watermark_position(&WatermarkAnchor::BottomRight, (50, 50), MARK, 15);
        assert_eq!(pos, (-65.0, -16.0));
    }
}
