//! Diff overlay: a human-viewable rendering of diff-mode decisions.
//!
//! Each pixel of the output shows how the diff algorithm classified the
//! same coordinate: outside the work area, completed, or still pending.
//! The renderer uses exactly [`ProgressMode::UploadDiff`]'s completion
//! predicate and the same countable region as the percentage, so the
//! picture and the reported number always agree.

use image::{Rgba, RgbaImage};

use crate::grid::PixelGrid;
use crate::progress::{CountableRegion, ProgressMode};
use crate::types::EngineError;

/// Pixels outside the work area: light gray.
pub const EXCLUDED: Rgba<u8> = Rgba([224, 224, 224, 255]);

/// Work-area pixels whose color changed beyond tolerance: warm red.
pub const COMPLETED: Rgba<u8> = Rgba([230, 57, 70, 255]);

/// Work-area pixels not yet changed: opaque white.
pub const PENDING: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Render the diff classification of `comparison` against `baseline`.
///
/// Both images (and the mask, for [`CountableRegion::Mask`]) must
/// already share the same dimensions.
///
/// # Errors
///
/// Returns [`EngineError::DimensionMismatch`] if the inputs differ in size.
pub fn generate_diff_overlay(
    region: CountableRegion<'_>,
    baseline: &RgbaImage,
    comparison: &RgbaImage,
) -> Result<RgbaImage, EngineError> {
    let grid = PixelGrid::new(baseline, comparison, region.mask())?;
    let dimensions = grid.dimensions();
    let mut rendered = RgbaImage::new(dimensions.width, dimensions.height);

    for (cell, out) in grid.cells().zip(rendered.pixels_mut()) {
        *out = if !cell.is_countable() {
            EXCLUDED
        } else if ProgressMode::UploadDiff.is_completed(&cell) {
            COMPLETED
        } else {
            PENDING
        };
    }

    Ok(rendered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::generate_mask;
    use crate::progress::measure;

    fn baseline() -> RgbaImage {
        RgbaImage::from_fn(6, 6, |x, _| {
            if x < 2 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([90, 60, 30, 255])
            }
        })
    }

    /// Top half recolored, bottom half within tolerance of the baseline.
    fn photo() -> RgbaImage {
        RgbaImage::from_fn(6, 6, |_, y| {
            if y < 3 {
                Rgba([20, 140, 160, 255])
            } else {
                Rgba([95, 62, 30, 255])
            }
        })
    }

    #[test]
    fn overlay_matches_input_dimensions() {
        let overlay =
            generate_diff_overlay(CountableRegion::Foreground, &baseline(), &photo()).unwrap();
        assert_eq!(overlay.dimensions(), (6, 6));
    }

    #[test]
    fn overlay_classifies_each_pixel() {
        let overlay =
            generate_diff_overlay(CountableRegion::Foreground, &baseline(), &photo()).unwrap();
        assert_eq!(*overlay.get_pixel(0, 0), EXCLUDED);
        assert_eq!(*overlay.get_pixel(1, 5), EXCLUDED);
        assert_eq!(*overlay.get_pixel(3, 1), COMPLETED);
        assert_eq!(*overlay.get_pixel(3, 4), PENDING);
    }

    #[test]
    fn completed_pixels_agree_with_measurement() {
        let base = baseline();
        let mask = generate_mask(&base);
        let region = CountableRegion::Mask(&mask);
        let overlay = generate_diff_overlay(region, &base, &photo()).unwrap();
        let m = measure(ProgressMode::UploadDiff, region, &base, &photo()).unwrap();

        let completed = overlay.pixels().filter(|p| **p == COMPLETED).count();
        let countable = overlay.pixels().filter(|p| **p != EXCLUDED).count();
        let (completed, countable) = (
            u64::try_from(completed).unwrap(),
            u64::try_from(countable).unwrap(),
        );
        assert_eq!(completed, m.completed);
        assert_eq!(countable, m.countable);
        assert_eq!(m.percentage.to_string(), "50.00");
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let result = generate_diff_overlay(
            CountableRegion::Foreground,
            &baseline(),
            &RgbaImage::new(3, 3),
        );
        assert!(matches!(result, Err(EngineError::DimensionMismatch { .. })));
    }
}
