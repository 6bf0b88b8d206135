//! Co-indexed iteration over equal-sized images.
//!
//! Per-pixel work in the engine always reads two or three images at the
//! same coordinate: baseline + comparison, optionally with a mask. A
//! [`PixelGrid`] checks once, at construction, that every image shares
//! the baseline's dimensions, and then walks them in lockstep in row-major
//! order. No per-pixel code indexes an image directly.

use image::buffer::Pixels;
use image::{Rgba, RgbaImage};

use crate::classify;
use crate::types::{Dimensions, EngineError};

/// Baseline, comparison, and optional mask images known to share one size.
#[derive(Debug, Clone, Copy)]
pub struct PixelGrid<'a> {
    baseline: &'a RgbaImage,
    comparison: &'a RgbaImage,
    mask: Option<&'a RgbaImage>,
}

impl<'a> PixelGrid<'a> {
    /// Pair a baseline with a comparison image and an optional mask.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DimensionMismatch`] if the comparison or the
    /// mask differs in size from the baseline.
    pub fn new(
        baseline: &'a RgbaImage,
        comparison: &'a RgbaImage,
        mask: Option<&'a RgbaImage>,
    ) -> Result<Self, EngineError> {
        let expected = Dimensions::of(baseline);
        for other in std::iter::once(comparison).chain(mask) {
            let actual = Dimensions::of(other);
            if actual != expected {
                return Err(EngineError::DimensionMismatch { expected, actual });
            }
        }

        Ok(Self {
            baseline,
            comparison,
            mask,
        })
    }

    /// Shared dimensions of every image in the grid.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(self.baseline)
    }

    /// Iterate all cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> Cells<'a> {
        Cells {
            width: self.baseline.width(),
            index: 0,
            baseline: self.baseline.pixels(),
            comparison: self.comparison.pixels(),
            mask: self.mask.map(|mask| mask.pixels()),
        }
    }
}

/// One coordinate of a [`PixelGrid`], with the pixel from each image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Baseline pixel.
    pub baseline: Rgba<u8>,
    /// Comparison pixel.
    pub comparison: Rgba<u8>,
    /// Mask pixel, when the grid carries a mask.
    pub mask: Option<Rgba<u8>>,
}

impl Cell {
    /// Returns `true` if this cell takes part in a progress calculation.
    ///
    /// With a mask, the mask's work-area test decides. Without one, the
    /// baseline pixel must be foreground; this is the same predicate mask
    /// generation uses, so both paths count the same pixels.
    #[must_use]
    pub const fn is_countable(&self) -> bool {
        match self.mask {
            Some(mask) => classify::is_work_area(mask),
            None => classify::is_foreground(self.baseline),
        }
    }
}

/// Row-major iterator over the cells of a [`PixelGrid`].
pub struct Cells<'a> {
    width: u32,
    index: u64,
    baseline: Pixels<'a, Rgba<u8>>,
    comparison: Pixels<'a, Rgba<u8>>,
    mask: Option<Pixels<'a, Rgba<u8>>>,
}

impl Iterator for Cells<'_> {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        let baseline = *self.baseline.next()?;
        let comparison = *self.comparison.next()?;
        let mask = match self.mask.as_mut() {
            Some(pixels) => Some(*pixels.next()?),
            None => None,
        };

        let width = u64::from(self.width);
        // Both quotient and remainder are bounded by the u32 image axes.
        let x = u32::try_from(self.index % width).unwrap_or(u32::MAX);
        let y = u32::try_from(self.index / width).unwrap_or(u32::MAX);
        self.index += 1;

        Some(Cell {
            x,
            y,
            baseline,
            comparison,
            mask,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.baseline.size_hint()
    }
}

impl ExactSizeIterator for Cells<'_> {}
