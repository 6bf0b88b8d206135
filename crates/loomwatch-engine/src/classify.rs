//! Pixel classification: work area versus background.
//!
//! Every component that decides whether a pixel is "work area", "drawn",
//! or "changed" goes through the predicates in this module, using the
//! fixed thresholds defined here. Mask generation and un-masked progress
//! calculation therefore classify the same pixel the same way.
//!
//! All predicates are pure and total over any 8-bit RGBA quadruple.

use image::Rgba;

/// Alpha at or below this value is treated as transparent.
pub const ALPHA_THRESHOLD: u8 = 10;

/// Color channels all above this value make a pixel "near white".
pub const NEAR_WHITE_THRESHOLD: u8 = 240;

/// Euclidean RGB distance above which a pixel counts as changed.
pub const COLOR_TOLERANCE: f64 = 30.0;

/// Mask pixels with a red channel above this value are work area.
///
/// Stricter than a plain non-zero test so mildly blurred (resampled)
/// masks still classify cleanly.
pub const MASK_WORK_AREA_THRESHOLD: u8 = 128;

/// Returns `true` if the pixel is effectively transparent.
#[must_use]
pub const fn is_transparent(pixel: Rgba<u8>) -> bool {
    pixel.0[3] <= ALPHA_THRESHOLD
}

/// Returns `true` if all three color channels exceed
/// [`NEAR_WHITE_THRESHOLD`]. Alpha is ignored.
#[must_use]
pub const fn is_near_white(pixel: Rgba<u8>) -> bool {
    let [r, g, b, _] = pixel.0;
    r > NEAR_WHITE_THRESHOLD && g > NEAR_WHITE_THRESHOLD && b > NEAR_WHITE_THRESHOLD
}

/// Returns `true` if the pixel is background: transparent or near white.
#[must_use]
pub const fn is_background(pixel: Rgba<u8>) -> bool {
    is_transparent(pixel) || is_near_white(pixel)
}

/// Returns `true` if the pixel belongs to the work area.
#[must_use]
pub const fn is_foreground(pixel: Rgba<u8>) -> bool {
    !is_background(pixel)
}

/// Returns `true` if a comparison pixel counts as drawn in coverage mode.
///
/// Only opacity matters; color is ignored.
#[must_use]
pub const fn is_drawn_pixel(pixel: Rgba<u8>) -> bool {
    !is_transparent(pixel)
}

/// Euclidean distance between two pixels in RGB space.
///
/// Alpha does not participate.
#[must_use]
pub fn color_distance(a: Rgba<u8>, b: Rgba<u8>) -> f64 {
    let dr = f64::from(a.0[0]) - f64::from(b.0[0]);
    let dg = f64::from(a.0[1]) - f64::from(b.0[1]);
    let db = f64::from(a.0[2]) - f64::from(b.0[2]);
    dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
}

/// Returns `true` if the color distance exceeds [`COLOR_TOLERANCE`].
///
/// This is the single "completed" predicate for diff mode, shared by
/// the percentage calculation and the diff overlay renderer.
#[must_use]
pub fn is_color_changed(baseline: Rgba<u8>, comparison: Rgba<u8>) -> bool {
    color_distance(baseline, comparison) > COLOR_TOLERANCE
}

/// Returns `true` if a mask pixel marks work area.
#[must_use]
pub const fn is_work_area(mask_pixel: Rgba<u8>) -> bool {
    mask_pixel.0[0] > MASK_WORK_AREA_THRESHOLD
}
