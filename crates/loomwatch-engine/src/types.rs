//! Shared types for the loomwatch progress engine.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Re-export `RgbaImage` so downstream crates can hold decoded images,
/// masks, and generated artifacts without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `Rgba` for callers that build or inspect individual pixels.
pub use image::Rgba;

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an existing image.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A completion percentage in `[0, 100]` with exactly two decimal places.
///
/// Stored as hundredths of a percent (`0..=10_000`), so out-of-range or
/// over-precise values cannot be represented. Serializes as a plain JSON
/// number (`25.0`) and displays with two decimals (`25.00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percentage(u16);

impl Percentage {
    /// 0.00 %.
    pub const ZERO: Self = Self(0);

    /// 100.00 %.
    pub const FULL: Self = Self(10_000);

    /// Percentage of `completed` out of `total`, rounded to two decimals.
    ///
    /// Rounds half to even in exact integer arithmetic. Returns
    /// [`Percentage::ZERO`] when `total` is zero. `completed` is clamped
    /// to `total`.
    #[must_use]
    pub fn from_ratio(completed: u64, total: u64) -> Self {
        if total == 0 {
            return Self::ZERO;
        }

        let total = u128::from(total);
        let scaled = u128::from(completed).min(total) * 10_000;
        let mut hundredths = scaled / total;
        let twice_remainder = (scaled % total) * 2;

        if twice_remainder > total || (twice_remainder == total && hundredths % 2 == 1) {
            hundredths += 1;
        }

        Self(u16::try_from(hundredths).unwrap_or(10_000))
    }

    /// Build from hundredths of a percent, e.g. `2500` for 25.00 %.
    ///
    /// Returns `None` above `10_000`.
    #[must_use]
    pub const fn from_hundredths(hundredths: u16) -> Option<Self> {
        if hundredths <= 10_000 {
            Some(Self(hundredths))
        } else {
            None
        }
    }

    /// The value in hundredths of a percent.
    #[must_use]
    pub const fn hundredths(self) -> u16 {
        self.0
    }

    /// The value as a floating-point percentage, e.g. `25.0`.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_f64().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !(0.0..=100.0).contains(&value) {
            return Err(serde::de::Error::custom(format!(
                "percentage must be within 0..=100, got {value}"
            )));
        }
        // Range checked above, so the rounded value fits in 0..=10_000.
        Ok(Self((value * 100.0).round() as u16))
    }
}

/// Raw counts behind a progress percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Pixels that take part in the calculation (work area).
    pub countable: u64,
    /// Countable pixels judged completed.
    pub completed: u64,
    /// `completed / countable * 100`, two decimals, 0 when nothing is countable.
    pub percentage: Percentage,
}

impl Measurement {
    /// Build a measurement from counts, deriving the percentage.
    #[must_use]
    pub fn from_counts(countable: u64, completed: u64) -> Self {
        Self {
            countable,
            completed,
            percentage: Percentage::from_ratio(completed, countable),
        }
    }
}

/// Errors that can occur in the progress engine.
///
/// Classification and percentage math cannot fail on well-formed,
/// equal-sized images. Failures originate at the decode boundary, from
/// an invalid mode selector, or from a broken normalization invariant.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Failed to decode or encode an image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The progress mode string is not one of the known modes.
    #[error("invalid progress mode: {0:?} (expected \"overlay\" or \"upload_diff\")")]
    InvalidMode(String),

    /// A resize target or source image has a zero-length axis.
    #[error("image dimensions must be non-zero, got {0}")]
    InvalidDimensions(Dimensions),

    /// Images handed to a per-pixel operation differ in size.
    ///
    /// Every comparison normalizes first, so this signals a bug in the
    /// caller's normalization rather than bad input.
    #[error("image dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensions of the reference grid.
        expected: Dimensions,
        /// Dimensions of the offending image.
        actual: Dimensions,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_yields_zero() {
        assert_eq!(Percentage::from_ratio(0, 0), Percentage::ZERO);
        assert_eq!(Percentage::from_ratio(5, 0), Percentage::ZERO);
    }

    #[test]
    fn quarter_is_twenty_five() {
        let p = Percentage::from_ratio(10, 40);
        assert_eq!(p.hundredths(), 2500);
        assert_eq!(p.to_string(), "25.00");
    }

    #[test]
    fn thirds_round_to_two_decimals() {
        assert_eq!(Percentage::from_ratio(1, 3).to_string(), "33.33");
        assert_eq!(Percentage::from_ratio(2, 3).to_string(), "66.67");
    }

    #[test]
    fn exact_midpoint_rounds_to_even() {
        // 5 / 20000 * 10000 = 2.5 hundredths -> 2 (even)
        assert_eq!(Percentage::from_ratio(5, 20_000).hundredths(), 2);
        // 15 / 20000 * 10000 = 7.5 hundredths -> 8 (even)
        assert_eq!(Percentage::from_ratio(15, 20_000).hundredths(), 8);
    }

    #[test]
    fn completed_is_clamped_to_total() {
        assert_eq!(Percentage::from_ratio(12, 10), Percentage::FULL);
    }

    #[test]
    fn from_hundredths_rejects_over_full() {
        assert!(Percentage::from_hundredths(10_000).is_some());
        assert!(Percentage::from_hundredths(10_001).is_none());
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&Percentage::from_ratio(1, 4)).unwrap();
        assert_eq!(json, "25.0");
        let back: Percentage = serde_json::from_str("33.33").unwrap();
        assert_eq!(back.hundredths(), 3333);
    }

    #[test]
    fn deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Percentage>("100.5").is_err());
        assert!(serde_json::from_str::<Percentage>("-1").is_err());
    }

    #[test]
    fn dimensions_display_and_count() {
        let d = Dimensions::new(100, 40);
        assert_eq!(d.to_string(), "100x40");
        assert_eq!(d.pixel_count(), 4000);
        assert!(!d.is_empty());
        assert!(Dimensions::new(0, 5).is_empty());
    }

    #[test]
    fn measurement_from_counts() {
        let m = Measurement::from_counts(4, 1);
        assert_eq!(m.percentage.to_string(), "25.00");
    }
}
