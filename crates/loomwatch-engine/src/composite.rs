//! Compositing a progress overlay onto its baseline for display.
//!
//! Traced overlays are typically drawn on a white canvas. Before blending,
//! every near-white overlay pixel is made fully transparent so only the
//! actual strokes cover the baseline. The result is for human review only;
//! percentages are always computed from the uncomposited images.

use image::RgbaImage;

use crate::classify;
use crate::normalize::{ResizeFilter, normalize};
use crate::types::{Dimensions, EngineError};

/// Blend `overlay` over `baseline`, treating near-white overlay pixels as
/// transparent.
///
/// The overlay is resized to the baseline's dimensions first, so the
/// output always has the baseline's size.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDimensions`] if either image has a
/// zero-length axis.
pub fn composite(
    baseline: &RgbaImage,
    overlay: &RgbaImage,
    filter: ResizeFilter,
) -> Result<RgbaImage, EngineError> {
    let mut overlay = normalize(overlay, Dimensions::of(baseline), filter)?.into_owned();
    clear_near_white(&mut overlay);

    let mut merged = baseline.clone();
    image::imageops::overlay(&mut merged, &overlay, 0, 0);
    Ok(merged)
}

/// Zero the alpha of every near-white pixel.
fn clear_near_white(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        if classify::is_near_white(*pixel) {
            pixel.0[3] = 0;
        }
    }
}
