//! Order service: ties the engine to image and record storage.
//!
//! Every measuring operation computes all of its artifacts in memory
//! before saving any of them. An error (bad mode, undecodable upload,
//! missing order) therefore leaves no artifact behind and appends no
//! history.

use loomwatch_engine::{
    CompareRequest, Comparison, Dimensions, ProgressMode, ResizeFilter, RgbaImage, compare,
    composite, count_work_area_pixels, decode_rgba, generate_mask,
};

use crate::config::TrackerConfig;
use crate::error::StoreError;
use crate::image_store::{FsImageStore, ImageCategory, ImageStore};
use crate::records::{
    JsonRecordStore, NewOrder, Order, OrderId, ProgressRecord, ProgressResult, RecordStore,
};

/// Longest accepted order number, in characters.
pub const MAX_ORDER_NUMBER_LEN: usize = 50;

/// Progress tracking service over an image store and a record store.
#[derive(Debug)]
pub struct Tracker<I, R> {
    images: I,
    records: R,
    filter: ResizeFilter,
}

impl Tracker<FsImageStore, JsonRecordStore> {
    /// Open the filesystem-backed tracker described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record file exists but cannot be read.
    pub fn open(config: &TrackerConfig) -> Result<Self, StoreError> {
        let images = FsImageStore::new(&config.data_dir);
        let records = JsonRecordStore::open(config.records_path())?;
        Ok(Self::new(images, records, config.resize_filter))
    }
}

impl<I: ImageStore, R: RecordStore> Tracker<I, R> {
    /// Build a tracker over the given stores. `filter` is used whenever an
    /// image has to be resized to an order's standard dimensions.
    #[must_use]
    pub const fn new(images: I, records: R, filter: ResizeFilter) -> Self {
        Self {
            images,
            records,
            filter,
        }
    }

    /// The image store.
    #[must_use]
    pub const fn images(&self) -> &I {
        &self.images
    }

    /// The record store.
    #[must_use]
    pub const fn records(&self) -> &R {
        &self.records
    }

    /// Register a pattern order from its baseline image.
    ///
    /// The baseline's own dimensions become the order's standard
    /// dimensions. Its work-area mask is generated and stored once here
    /// and reused by every later comparison. `mode` defaults to
    /// [`ProgressMode::Overlay`] when absent or blank.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidOrder`] for an empty or over-long order number.
    /// - [`StoreError::DuplicateOrder`] if the number is already registered.
    /// - [`StoreError::Engine`] for an unrecognized mode.
    /// - [`StoreError::Decode`] if the baseline cannot be decoded.
    pub fn create_order(
        &self,
        order_number: &str,
        base_image: &[u8],
        mode: Option<&str>,
    ) -> Result<Order, StoreError> {
        let order_number = order_number.trim();
        if order_number.is_empty() {
            return Err(StoreError::InvalidOrder("order number is required".to_owned()));
        }
        if order_number.chars().count() > MAX_ORDER_NUMBER_LEN {
            return Err(StoreError::InvalidOrder(format!(
                "order number exceeds {MAX_ORDER_NUMBER_LEN} characters"
            )));
        }
        let mode = parse_mode(mode)?.unwrap_or_default();
        if self.records.order_by_number(order_number)?.is_some() {
            return Err(StoreError::DuplicateOrder(order_number.to_owned()));
        }

        let baseline = decode_rgba(base_image)?;
        let standard = Dimensions::of(&baseline);
        if standard.is_empty() {
            return Err(loomwatch_engine::EngineError::InvalidDimensions(standard).into());
        }
        let mask = generate_mask(&baseline);
        let work_area = count_work_area_pixels(&baseline);

        let base_ref = self.images.save(&baseline, ImageCategory::Base)?;
        let mask_ref = self.images.save(&mask, ImageCategory::Masks)?;

        let order = self.records.insert_order(NewOrder {
            order_number: order_number.to_owned(),
            base_image: base_ref,
            mask_image: Some(mask_ref),
            standard,
            total_pixels: work_area.pixels,
            mode,
        })?;

        log::info!(
            "created order {} (#{}) at {standard}, {} work-area pixels, mode {mode}",
            order.order_number,
            order.id,
            order.total_pixels,
        );
        Ok(order)
    }

    /// Compare an image against an order's baseline.
    ///
    /// `mode` defaults to the order's mode when absent or blank. The
    /// order's stored mask selects the countable region when present;
    /// otherwise the baseline foreground is used. The normalized image is
    /// the primary artifact; in diff mode the diff overlay is the
    /// secondary one.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Engine`] for an unrecognized mode.
    /// - [`StoreError::NotFound`] if the order or its stored images are gone.
    /// - [`StoreError::Decode`] if `image` cannot be decoded.
    pub fn compare(
        &self,
        order_id: OrderId,
        image: &[u8],
        mode: Option<&str>,
    ) -> Result<ProgressResult, StoreError> {
        let mode = parse_mode(mode)?;
        let order = self.require_order(order_id)?;
        let mode = mode.unwrap_or(order.mode);
        let (_, comparison) = self.measure(&order, image, mode)?;

        let secondary = comparison
            .diff_overlay
            .as_ref()
            .map(|overlay| (overlay, ImageCategory::Overlays));
        self.record(
            &order,
            &comparison,
            (&comparison.normalized, ImageCategory::Compare),
            secondary,
        )
    }

    /// Record a traced overlay drawn over the pattern.
    ///
    /// Coverage is measured on the raw normalized overlay. The overlay
    /// composited onto the baseline is the primary artifact; the raw
    /// overlay is kept as the secondary one.
    ///
    /// # Errors
    ///
    /// Same as [`compare`](Self::compare), minus the mode error.
    pub fn submit_drawing(
        &self,
        order_id: OrderId,
        overlay: &[u8],
    ) -> Result<ProgressResult, StoreError> {
        let order = self.require_order(order_id)?;
        let (baseline, comparison) = self.measure(&order, overlay, ProgressMode::Overlay)?;
        let merged = composite(&baseline, &comparison.normalized, self.filter)?;

        self.record(
            &order,
            &comparison,
            (&merged, ImageCategory::Merged),
            Some((&comparison.normalized, ImageCategory::Overlays)),
        )
    }

    /// Record a photo of the physical work, measured in diff mode.
    ///
    /// # Errors
    ///
    /// Same as [`compare`](Self::compare), minus the mode error.
    pub fn submit_upload(
        &self,
        order_id: OrderId,
        photo: &[u8],
    ) -> Result<ProgressResult, StoreError> {
        let order = self.require_order(order_id)?;
        let (_, comparison) = self.measure(&order, photo, ProgressMode::UploadDiff)?;

        let secondary = comparison
            .diff_overlay
            .as_ref()
            .map(|overlay| (overlay, ImageCategory::Overlays));
        self.record(
            &order,
            &comparison,
            (&comparison.normalized, ImageCategory::Uploads),
            secondary,
        )
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if it does not exist.
    pub fn order(&self, order_id: OrderId) -> Result<Order, StoreError> {
        self.require_order(order_id)
    }

    /// All orders, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub fn orders(&self) -> Result<Vec<Order>, StoreError> {
        self.records.orders()
    }

    /// An order's progress history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order does not exist.
    pub fn history(&self, order_id: OrderId) -> Result<Vec<ProgressRecord>, StoreError> {
        self.require_order(order_id)?;
        self.records.history(order_id)
    }

    /// Delete an order and its history. Stored images are left in place;
    /// they are content-addressed and may be shared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order does not exist.
    pub fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        if self.records.delete_order(order_id)? {
            log::info!("deleted order #{order_id}");
            Ok(())
        } else {
            Err(not_found(order_id))
        }
    }

    fn require_order(&self, order_id: OrderId) -> Result<Order, StoreError> {
        self.records
            .order(order_id)?
            .ok_or_else(|| not_found(order_id))
    }

    /// Decode `bytes` and measure them against the order's stored baseline
    /// and mask. Returns the baseline alongside the comparison.
    fn measure(
        &self,
        order: &Order,
        bytes: &[u8],
        mode: ProgressMode,
    ) -> Result<(RgbaImage, Comparison), StoreError> {
        let image = decode_rgba(bytes)?;
        let baseline = self.images.load(&order.base_image)?;
        let mask = order
            .mask_image
            .as_ref()
            .map(|reference| self.images.load(reference))
            .transpose()?;

        let comparison = compare(&CompareRequest {
            baseline: &baseline,
            mask: mask.as_ref(),
            comparison: &image,
            mode,
            standard: order.standard,
            filter: self.filter,
        })?;
        Ok((baseline, comparison))
    }

    /// Save the primary and optional secondary artifact, then append the
    /// result to the order's history.
    fn record(
        &self,
        order: &Order,
        comparison: &Comparison,
        primary: (&RgbaImage, ImageCategory),
        secondary: Option<(&RgbaImage, ImageCategory)>,
    ) -> Result<ProgressResult, StoreError> {
        let image = self.images.save(primary.0, primary.1)?;
        let overlay = secondary
            .map(|(img, category)| self.images.save(img, category))
            .transpose()?;

        let result = ProgressResult {
            image,
            overlay,
            percentage: comparison.measurement.percentage,
        };
        self.records.record_progress(order.id, &result)?;

        log::info!(
            "order {}: {} progress {}% ({}/{} pixels)",
            order.order_number,
            comparison.diagnostics.mode,
            result.percentage,
            comparison.measurement.completed,
            comparison.measurement.countable,
        );
        Ok(result)
    }
}

/// Parse an optional mode string. Absent or blank means "use the default".
fn parse_mode(mode: Option<&str>) -> Result<Option<ProgressMode>, StoreError> {
    mode.map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.parse().map_err(StoreError::from))
        .transpose()
}

fn not_found(order_id: OrderId) -> StoreError {
    StoreError::NotFound(format!("order {order_id}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_mode_means_default() {
        assert_eq!(parse_mode(None).unwrap(), None);
        assert_eq!(parse_mode(Some("  ")).unwrap(), None);
    }

    #[test]
    fn explicit_mode_is_parsed() {
        assert_eq!(
            parse_mode(Some("overlay")).unwrap(),
            Some(ProgressMode::Overlay)
        );
        assert_eq!(
            parse_mode(Some(" upload_diff ")).unwrap(),
            Some(ProgressMode::UploadDiff)
        );
    }

    #[test]
    fn unknown_mode_is_an_error() {
        let err = parse_mode(Some("bogus")).unwrap_err();
        assert!(err.is_invalid_mode());
    }
}
