//! Work-area masks derived from a baseline image.
//!
//! A mask is generated once when an order is created, stored next to the
//! baseline, and reused read-only by every later comparison. Mask pixels
//! are exactly opaque white (work area) or opaque black (background), and
//! the mask always has its baseline's dimensions.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::classify;
use crate::types::Dimensions;

/// Mask pixel value for work area.
pub const WORK_AREA: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Mask pixel value for background.
pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Size and work-area pixel count of a baseline image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkArea {
    /// Baseline dimensions; become the order's standard dimensions.
    pub dimensions: Dimensions,
    /// Number of foreground pixels in the baseline.
    pub pixels: u64,
}

/// Build the binary work-area mask for a baseline.
///
/// Foreground pixels (see [`classify::is_foreground`]) become
/// [`WORK_AREA`], everything else [`BACKGROUND`].
#[must_use = "returns the generated mask"]
pub fn generate_mask(baseline: &RgbaImage) -> RgbaImage {
    let (width, height) = baseline.dimensions();
    let mut mask = RgbaImage::new(width, height);
    for (dst, src) in mask.pixels_mut().zip(baseline.pixels()) {
        *dst = if classify::is_foreground(*src) {
            WORK_AREA
        } else {
            BACKGROUND
        };
    }
    mask
}

/// Count the foreground pixels of a baseline without building a mask.
///
/// The count equals the number of work-area pixels in
/// [`generate_mask`]'s output for the same baseline.
#[must_use]
pub fn count_work_area_pixels(baseline: &RgbaImage) -> WorkArea {
    let pixels = baseline
        .pixels()
        .filter(|p| classify::is_foreground(**p))
        .fold(0_u64, |n, _| n + 1);

    WorkArea {
        dimensions: Dimensions::of(baseline),
        pixels,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 4x4 baseline: left column transparent, top row near-white, the
    /// rest a saturated red.
    fn sample_baseline() -> RgbaImage {
        RgbaImage::from_fn(4, 4, |x, y| {
            if x == 0 {
                Rgba([200, 0, 0, 0])
            } else if y == 0 {
                Rgba([250, 250, 250, 255])
            } else {
                Rgba([200, 30, 30, 255])
            }
        })
    }

    #[test]
    fn mask_matches_baseline_dimensions() {
        let base = RgbaImage::new(17, 9);
        let mask = generate_mask(&base);
        assert_eq!(mask.dimensions(), (17, 9));
    }

    #[test]
    fn mask_is_strictly_binary() {
        let base = RgbaImage::from_fn(16, 16, |x, y| {
            let v = u8::try_from((x * 16 + y) % 256).unwrap();
            Rgba([v, v.wrapping_mul(3), v.wrapping_add(90), v])
        });
        let mask = generate_mask(&base);
        assert!(mask.pixels().all(|p| *p == WORK_AREA || *p == BACKGROUND));
    }

    #[test]
    fn mask_marks_foreground_only() {
        let base = sample_baseline();
        let mask = generate_mask(&base);
        for (x, y, p) in mask.enumerate_pixels() {
            let expected = if x == 0 || y == 0 { BACKGROUND } else { WORK_AREA };
            assert_eq!(*p, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn count_matches_mask() {
        let base = sample_baseline();
        let info = count_work_area_pixels(&base);
        let mask = generate_mask(&base);
        let mask_count = mask
            .pixels()
            .filter(|p| classify::is_work_area(**p))
            .count();

        assert_eq!(info.pixels, 9);
        assert_eq!(info.pixels, u64::try_from(mask_count).unwrap());
        assert_eq!(info.dimensions, Dimensions::new(4, 4));
    }

    #[test]
    fn fully_transparent_baseline_has_no_work_area() {
        let base = RgbaImage::new(5, 5);
        assert_eq!(count_work_area_pixels(&base).pixels, 0);
        assert!(generate_mask(&base).pixels().all(|p| *p == BACKGROUND));
    }
}
