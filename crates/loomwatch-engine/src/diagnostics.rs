//! Comparison diagnostics: timing, sizes, and counts for each stage.
//!
//! Every call to [`compare`](crate::compare) collects diagnostics
//! alongside its result, for tuning resize filters and spotting orders
//! whose inputs keep needing large resizes.
//!
//! Duration measurements use [`std::time::Duration`] (platform-agnostic).
//! Timestamps are captured internally via the `web-time` crate, which
//! uses `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::progress::ProgressMode;
use crate::types::{Dimensions, Measurement};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }

    /// Same as the parent module, for `Option<Duration>`.
    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            duration.map(|d| d.as_secs_f64()).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<f64>::deserialize(deserializer)?
                .map(|secs| {
                    Duration::try_from_secs_f64(secs).map_err(|_| {
                        serde::de::Error::custom(
                            "duration seconds must be finite, non-negative, and representable as a Duration",
                        )
                    })
                })
                .transpose()
        }
    }
}

/// Which inputs had to be resized onto the standard grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resized {
    /// The comparison image was resized (the common case for photos).
    pub comparison: bool,
    /// The baseline was resized; indicates an order whose standard
    /// dimensions drifted from its baseline.
    pub baseline: bool,
    /// The mask was resized; same caveat as `baseline`.
    pub mask: bool,
}

/// Diagnostics collected from a single comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonDiagnostics {
    /// Completion algorithm used.
    pub mode: ProgressMode,
    /// Whether a stored mask defined the countable region.
    pub masked: bool,
    /// Order standard dimensions (the grid everything was compared on).
    pub standard: Dimensions,
    /// Dimensions of the comparison image as supplied.
    pub input: Dimensions,
    /// Which inputs were resized.
    pub resized: Resized,
    /// Stage 1: normalization of comparison (and, defensively, baseline
    /// and mask).
    #[serde(with = "duration_serde")]
    pub normalize: Duration,
    /// Stage 2: per-pixel measurement.
    #[serde(with = "duration_serde")]
    pub measure: Duration,
    /// Stage 3: diff overlay rendering (diff mode only).
    #[serde(with = "duration_serde::option")]
    pub render: Option<Duration>,
    /// Total wall-clock duration of the comparison.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Counts and percentage.
    pub measurement: Measurement,
}

impl ComparisonDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Comparison Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Mode: {} ({})",
            self.mode,
            if self.masked { "masked" } else { "un-masked" },
        ));
        lines.push(format!(
            "Standard: {} ({} pixels)  |  Input: {}",
            self.standard,
            self.standard.pixel_count(),
            self.input,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!("{:<16} {:>10} {:>10}", "Stage", "Duration", "% Total"));
        lines.push("-".repeat(40));

        let total_ms = duration_ms(self.total_duration);
        let mut stages = vec![("Normalize", self.normalize), ("Measure", self.measure)];
        if let Some(render) = self.render {
            stages.push(("Render", render));
        }

        for (name, duration) in stages {
            let ms = duration_ms(duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Resized: comparison={} baseline={} mask={}",
            self.resized.comparison, self.resized.baseline, self.resized.mask,
        ));
        lines.push(format!(
            "Completed: {} / {} countable pixels  |  Progress: {}%",
            self.measurement.completed, self.measurement.countable, self.measurement.percentage,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> ComparisonDiagnostics {
        ComparisonDiagnostics {
            mode: ProgressMode::UploadDiff,
            masked: true,
            standard: Dimensions::new(100, 100),
            input: Dimensions::new(400, 300),
            resized: Resized {
                comparison: true,
                ..Resized::default()
            },
            normalize: Duration::from_millis(6),
            measure: Duration::from_millis(3),
            render: Some(Duration::from_millis(1)),
            total_duration: Duration::from_millis(10),
            measurement: Measurement::from_counts(40, 10),
        }
    }

    #[test]
    fn report_mentions_stages_and_progress() {
        let report = sample().report();
        assert!(report.contains("Normalize"));
        assert!(report.contains("Render"));
        assert!(report.contains("upload_diff (masked)"));
        assert!(report.contains("Progress: 25.00%"));
    }

    #[test]
    fn report_omits_render_when_absent() {
        let diag = ComparisonDiagnostics {
            mode: ProgressMode::Overlay,
            render: None,
            ..sample()
        };
        assert!(!diag.report().contains("Render"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["normalize"].as_f64().unwrap() - 0.006).abs() < 1e-9);
        assert!((json["render"].as_f64().unwrap() - 0.001).abs() < 1e-9);
        assert_eq!(json["mode"], "upload_diff");
        assert_eq!(json["measurement"]["percentage"], 25.0);

        let back: ComparisonDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.render, Some(Duration::from_millis(1)));
        assert_eq!(back.measurement, sample().measurement);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["measure"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<ComparisonDiagnostics>(json).is_err());
    }
}
