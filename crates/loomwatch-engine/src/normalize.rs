//! Resizing images onto an order's canonical pixel grid.
//!
//! Every image compared against a baseline is first brought to the
//! order's standard dimensions so per-pixel operations line up index for
//! index. The standard dimensions are fixed at order creation from the
//! baseline's own size.
//!
//! If the image already matches, it is borrowed back unchanged.

use std::borrow::Cow;
use std::fmt;

use image::RgbaImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, EngineError};

/// Resampling filter used when an image must be resized.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality. All
/// filters are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Resize `image` to exactly `target`, or borrow it back if it already
/// has those dimensions.
///
/// Aspect ratio is not preserved: the order's framing is assumed to
/// match, so the image is stretched onto the target grid.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDimensions`] if `target` or `image`
/// has a zero-length axis.
pub fn normalize(
    image: &RgbaImage,
    target: Dimensions,
    filter: ResizeFilter,
) -> Result<Cow<'_, RgbaImage>, EngineError> {
    if target.is_empty() {
        return Err(EngineError::InvalidDimensions(target));
    }

    let source = Dimensions::of(image);
    if source == target {
        return Ok(Cow::Borrowed(image));
    }
    if source.is_empty() {
        return Err(EngineError::InvalidDimensions(source));
    }

    log::debug!("resizing {source} -> {target} with {filter}");
    Ok(Cow::Owned(image::imageops::resize(
        image,
        target.width,
        target.height,
        filter.to_image_filter(),
    )))
}
