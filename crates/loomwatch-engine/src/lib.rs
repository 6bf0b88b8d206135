//! loomwatch-engine: Pure progress measurement engine (sans-IO).
//!
//! Measures how much of a reference pattern has been physically completed
//! by comparing an image against a baseline:
//!
//! decode -> normalize -> (mask, once per order) -> measure -> render.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and pixel buffers and returns structured data. Image and
//! record storage live in `loomwatch-store`.
//!
//! Every operation is a synchronous, side-effect-free function of its
//! inputs, so any number of comparisons may run in parallel. A stored
//! mask is only ever borrowed.

pub mod classify;
pub mod codec;
pub mod composite;
pub mod diagnostics;
pub mod grid;
pub mod mask;
pub mod normalize;
pub mod overlay;
pub mod progress;
pub mod types;

pub use codec::{decode_rgba, encode_png};
pub use composite::composite;
pub use diagnostics::ComparisonDiagnostics;
pub use mask::{WorkArea, count_work_area_pixels, generate_mask};
pub use normalize::{ResizeFilter, normalize};
pub use overlay::generate_diff_overlay;
pub use progress::{CompareRequest, Comparison, CountableRegion, ProgressMode, compare, measure};
pub use types::{Dimensions, EngineError, Measurement, Percentage, Rgba, RgbaImage};
