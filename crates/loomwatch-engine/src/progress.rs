//! Progress calculation: how much of the work area is completed.
//!
//! This module defines the [`ProgressMode`] enum for selecting the
//! completion algorithm and the [`CountableRegion`] enum for selecting
//! which pixels take part. Both algorithms share a single pixel loop over
//! a [`PixelGrid`]; masked and un-masked variants differ only in the
//! countable-pixel predicate.
//!
//! # Algorithms
//!
//! - **Coverage** ([`ProgressMode::Overlay`]): a countable pixel is
//!   completed when the comparison pixel is opaque (drawn), regardless of
//!   color. Used for traced overlays drawn on top of the pattern.
//! - **Diff** ([`ProgressMode::UploadDiff`]): a countable pixel is
//!   completed when the comparison pixel's RGB distance from the baseline
//!   exceeds [`COLOR_TOLERANCE`](crate::classify::COLOR_TOLERANCE). Used
//!   for photographs of the physical work.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::classify;
use crate::diagnostics::{ComparisonDiagnostics, Resized};
use crate::grid::{Cell, PixelGrid};
use crate::normalize::{ResizeFilter, normalize};
use crate::overlay;
use crate::types::{Dimensions, EngineError, Measurement};

/// Selects which completion algorithm to use.
///
/// Parsed from the strings `"overlay"` and `"upload_diff"`. Unknown
/// strings are an error, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Coverage: drawn (opaque) comparison pixels count as completed.
    #[default]
    Overlay,
    /// Diff: comparison pixels whose color moved away from the baseline
    /// count as completed.
    UploadDiff,
}

impl ProgressMode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 2] = [Self::Overlay, Self::UploadDiff];

    /// The canonical string form of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::UploadDiff => "upload_diff",
        }
    }

    /// Returns `true` if the cell counts as completed under this mode.
    ///
    /// Countability is decided separately by [`Cell::is_countable`].
    #[must_use]
    pub fn is_completed(self, cell: &Cell) -> bool {
        match self {
            Self::Overlay => classify::is_drawn_pixel(cell.comparison),
            Self::UploadDiff => classify::is_color_changed(cell.baseline, cell.comparison),
        }
    }
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| EngineError::InvalidMode(s.to_owned()))
    }
}

/// Which pixels of the reference take part in a calculation.
#[derive(Debug, Clone, Copy, Default)]
pub enum CountableRegion<'a> {
    /// Un-masked fallback: foreground pixels of the baseline.
    #[default]
    Foreground,
    /// Work-area pixels of a stored mask.
    Mask(&'a RgbaImage),
}

impl<'a> CountableRegion<'a> {
    /// Region for an optional mask: the mask if present, the baseline
    /// foreground otherwise.
    #[must_use]
    pub const fn from_mask(mask: Option<&'a RgbaImage>) -> Self {
        match mask {
            Some(mask) => Self::Mask(mask),
            None => Self::Foreground,
        }
    }

    /// The mask image, if this region is mask-based.
    #[must_use]
    pub const fn mask(self) -> Option<&'a RgbaImage> {
        match self {
            Self::Foreground => None,
            Self::Mask(mask) => Some(mask),
        }
    }
}

/// Count countable and completed pixels for already-normalized images.
///
/// # Errors
///
/// Returns [`EngineError::DimensionMismatch`] if the comparison image or
/// the mask does not match the baseline's dimensions.
pub fn measure(
    mode: ProgressMode,
    region: CountableRegion<'_>,
    baseline: &RgbaImage,
    comparison: &RgbaImage,
) -> Result<Measurement, EngineError> {
    let grid = PixelGrid::new(baseline, comparison, region.mask())?;
    Ok(tally(&grid, mode))
}

fn tally(grid: &PixelGrid<'_>, mode: ProgressMode) -> Measurement {
    let (countable, completed) = grid
        .cells()
        .filter(Cell::is_countable)
        .fold((0_u64, 0_u64), |(countable, completed), cell| {
            (countable + 1, completed + u64::from(mode.is_completed(&cell)))
        });

    Measurement::from_counts(countable, completed)
}

/// Inputs to a single comparison against an order's baseline.
#[derive(Debug, Clone, Copy)]
pub struct CompareRequest<'a> {
    /// The order's baseline image.
    pub baseline: &'a RgbaImage,
    /// The order's work-area mask, if one was generated.
    pub mask: Option<&'a RgbaImage>,
    /// The image being measured (photo or traced overlay), any size.
    pub comparison: &'a RgbaImage,
    /// Completion algorithm.
    pub mode: ProgressMode,
    /// The order's standard dimensions.
    pub standard: Dimensions,
    /// Resampling filter for normalization.
    pub filter: ResizeFilter,
}

/// Result of a comparison: the normalized input, the measurement, and
/// any rendered artifacts.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// The comparison image resized to the order's standard dimensions.
    pub normalized: RgbaImage,
    /// Counts and percentage.
    pub measurement: Measurement,
    /// Diff highlight image ([`ProgressMode::UploadDiff`] only).
    pub diff_overlay: Option<RgbaImage>,
    /// Timing and size diagnostics for this run.
    pub diagnostics: ComparisonDiagnostics,
}

/// Run one comparison: normalize, measure, and render artifacts.
///
/// The comparison image is resized to `request.standard`. The baseline
/// and mask are generated at those dimensions and are normally left
/// alone; if either differs it is resized too (with a warning) so the
/// per-pixel loop never reads mismatched grids.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDimensions`] if the standard dimensions
/// or any input image have a zero-length axis.
pub fn compare(request: &CompareRequest<'_>) -> Result<Comparison, EngineError> {
    let total_start = Instant::now();
    let standard = request.standard;

    let normalize_start = Instant::now();
    let comparison = normalize(request.comparison, standard, request.filter)?;
    let baseline = normalize(request.baseline, standard, request.filter)?;
    if matches!(baseline, Cow::Owned(_)) {
        log::warn!(
            "baseline is {} but order standard is {standard}; resizing",
            Dimensions::of(request.baseline),
        );
    }
    let mask = request
        .mask
        .map(|mask| normalize(mask, standard, request.filter))
        .transpose()?;
    if let Some(Cow::Owned(_)) = mask {
        log::warn!("mask does not match order standard {standard}; resizing");
    }
    let resized = Resized {
        comparison: matches!(comparison, Cow::Owned(_)),
        baseline: matches!(baseline, Cow::Owned(_)),
        mask: matches!(mask, Some(Cow::Owned(_))),
    };
    let normalize_duration = normalize_start.elapsed();

    let region = CountableRegion::from_mask(mask.as_deref());

    let measure_start = Instant::now();
    let measurement = measure(request.mode, region, &baseline, &comparison)?;
    let measure_duration = measure_start.elapsed();

    let (diff_overlay, render_duration) = match request.mode {
        ProgressMode::UploadDiff => {
            let render_start = Instant::now();
            let rendered = overlay::generate_diff_overlay(region, &baseline, &comparison)?;
            (Some(rendered), Some(render_start.elapsed()))
        }
        ProgressMode::Overlay => (None, None),
    };

    log::debug!(
        "{} comparison at {standard} ({}): {}/{} pixels -> {}%",
        request.mode,
        if region.mask().is_some() {
            "masked"
        } else {
            "un-masked"
        },
        measurement.completed,
        measurement.countable,
        measurement.percentage,
    );

    let diagnostics = ComparisonDiagnostics {
        mode: request.mode,
        masked: region.mask().is_some(),
        standard,
        input: Dimensions::of(request.comparison),
        resized,
        normalize: normalize_duration,
        measure: measure_duration,
        render: render_duration,
        total_duration: total_start.elapsed(),
        measurement,
    };

    Ok(Comparison {
        normalized: comparison.into_owned(),
        measurement,
        diff_overlay,
        diagnostics,
    })
}
