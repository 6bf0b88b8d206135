//! Integration test: register an order and record progress through every
//! measuring flow, using in-memory stores.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use loomwatch_engine::{ProgressMode, ResizeFilter, Rgba, RgbaImage, encode_png};
use loomwatch_store::{
    FsImageStore, ImageStore, JsonRecordStore, MemoryImageStore, StoreError, Tracker,
    TrackerConfig,
};

const PATTERN: Rgba<u8> = Rgba([180, 20, 60, 255]);
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);

/// 100x100 white canvas with an 8x5 (40-pixel) pattern in the corner.
fn baseline() -> RgbaImage {
    RgbaImage::from_fn(100, 100, |x, y| {
        if x < 8 && y < 5 { PATTERN } else { PAPER }
    })
}

/// Transparent tracing with the first two pattern columns inked.
fn tracing() -> RgbaImage {
    RgbaImage::from_fn(100, 100, |x, y| if x < 2 && y < 5 { INK } else { CLEAR })
}

/// Photo of the work with the first four pattern columns stitched over.
fn photo() -> RgbaImage {
    let mut photo = baseline();
    for y in 0..5 {
        for x in 0..4 {
            photo.put_pixel(x, y, Rgba([30, 160, 200, 255]));
        }
    }
    photo
}

fn png(image: &RgbaImage) -> Vec<u8> {
    encode_png(image).unwrap()
}

fn tracker() -> Tracker<MemoryImageStore, JsonRecordStore> {
    Tracker::new(
        MemoryImageStore::new(),
        JsonRecordStore::in_memory(),
        ResizeFilter::Triangle,
    )
}

#[test]
fn create_order_stores_baseline_and_mask() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-1001", &png(&baseline()), None)
        .unwrap();

    assert_eq!(order.order_number, "PO-1001");
    assert_eq!(order.standard.width, 100);
    assert_eq!(order.standard.height, 100);
    assert_eq!(order.total_pixels, 40);
    assert_eq!(order.mode, ProgressMode::Overlay);
    assert_eq!(order.current_progress.to_string(), "0.00");
    assert!(order.base_image.as_str().starts_with("/uploads/base/"));

    let mask_ref = order.mask_image.clone().unwrap();
    assert!(mask_ref.as_str().starts_with("/uploads/masks/"));
    let mask = tracker.images().load(&mask_ref).unwrap();
    assert_eq!(mask.dimensions(), (100, 100));
    assert_eq!(mask.pixels().filter(|p| p.0[0] == 255).count(), 40);
}

#[test]
fn compare_defaults_to_order_mode() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-1", &png(&baseline()), None)
        .unwrap();

    let result = tracker.compare(order.id, &png(&tracing()), None).unwrap();
    assert_eq!(result.percentage.to_string(), "25.00");
    assert!(result.image.as_str().starts_with("/uploads/compare/"));
    assert!(result.overlay.is_none());

    let order = tracker.order(order.id).unwrap();
    assert_eq!(order.current_progress.to_string(), "25.00");
    assert_eq!(order.current_image, Some(result.image));
}

#[test]
fn compare_in_diff_mode_saves_diff_overlay() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-2", &png(&baseline()), Some("upload_diff"))
        .unwrap();
    assert_eq!(order.mode, ProgressMode::UploadDiff);

    let result = tracker.compare(order.id, &png(&photo()), None).unwrap();
    assert_eq!(result.percentage.to_string(), "50.00");
    let overlay = result.overlay.unwrap();
    assert!(overlay.as_str().starts_with("/uploads/overlays/"));
    assert_ne!(overlay, result.image);
}

#[test]
fn explicit_mode_overrides_order_mode() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-3", &png(&baseline()), None)
        .unwrap();

    // The unchanged baseline itself: fully opaque, but no color change.
    let coverage = tracker.compare(order.id, &png(&baseline()), None).unwrap();
    let diff = tracker
        .compare(order.id, &png(&baseline()), Some("upload_diff"))
        .unwrap();
    assert_eq!(coverage.percentage.to_string(), "100.00");
    assert_eq!(diff.percentage.to_string(), "0.00");
}

#[test]
fn drawing_keeps_composite_and_raw_overlay_distinct() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-4", &png(&baseline()), None)
        .unwrap();

    let result = tracker.submit_drawing(order.id, &png(&tracing())).unwrap();
    assert_eq!(result.percentage.to_string(), "25.00");
    assert!(result.image.as_str().starts_with("/uploads/merged/"));
    let overlay = result.overlay.clone().unwrap();
    assert!(overlay.as_str().starts_with("/uploads/overlays/"));
    assert_ne!(result.image, overlay);

    let merged = tracker.images().load(&result.image).unwrap();
    assert_eq!(*merged.get_pixel(0, 0), INK);
    assert_eq!(*merged.get_pixel(5, 2), PATTERN);
    assert_eq!(*merged.get_pixel(50, 50), PAPER);

    let record = &tracker.history(order.id).unwrap()[0];
    assert_eq!(record.image, result.image);
    assert_eq!(record.overlay, result.overlay);
}

#[test]
fn upload_measures_color_change() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-5", &png(&baseline()), None)
        .unwrap();

    let result = tracker.submit_upload(order.id, &png(&photo())).unwrap();
    assert_eq!(result.percentage.to_string(), "50.00");
    assert!(result.image.as_str().starts_with("/uploads/uploads/"));
    assert!(result.overlay.is_some());
}

#[test]
fn history_is_newest_first() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-6", &png(&baseline()), None)
        .unwrap();

    tracker.submit_drawing(order.id, &png(&tracing())).unwrap();
    tracker.submit_upload(order.id, &png(&photo())).unwrap();

    let history = tracker.history(order.id).unwrap();
    let percentages: Vec<String> = history.iter().map(|r| r.percentage.to_string()).collect();
    assert_eq!(percentages, vec!["50.00", "25.00"]);
}

#[test]
fn invalid_mode_saves_nothing() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-7", &png(&baseline()), None)
        .unwrap();
    let stored = tracker.images().len();

    let err = tracker
        .compare(order.id, &png(&tracing()), Some("bogus"))
        .unwrap_err();
    assert!(err.is_invalid_mode(), "unexpected error: {err}");
    assert_eq!(tracker.images().len(), stored);
    assert!(tracker.history(order.id).unwrap().is_empty());
}

#[test]
fn undecodable_upload_saves_nothing() {
    let tracker = tracker();
    let order = tracker
        .create_order("PO-8", &png(&baseline()), None)
        .unwrap();
    let stored = tracker.images().len();

    let err = tracker.submit_upload(order.id, b"not an image").unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)));
    let err = tracker.submit_drawing(order.id, &[]).unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)));

    assert_eq!(tracker.images().len(), stored);
    assert!(tracker.history(order.id).unwrap().is_empty());
    assert_eq!(tracker.order(order.id).unwrap().current_image, None);
}

#[test]
fn order_number_validation() {
    let tracker = tracker();
    let base = png(&baseline());

    assert!(matches!(
        tracker.create_order("   ", &base, None),
        Err(StoreError::InvalidOrder(_))
    ));
    assert!(matches!(
        tracker.create_order(&"9".repeat(51), &base, None),
        Err(StoreError::InvalidOrder(_))
    ));

    tracker.create_order("PO-9", &base, None).unwrap();
    assert!(matches!(
        tracker.create_order(" PO-9 ", &base, None),
        Err(StoreError::DuplicateOrder(_))
    ));
    assert!(tracker.create_order("PO-10", &base, Some("bogus")).unwrap_err().is_invalid_mode());
}

#[test]
fn missing_and_deleted_orders_are_not_found() {
    let tracker = tracker();
    assert!(matches!(
        tracker.compare(99, &png(&tracing()), None),
        Err(StoreError::NotFound(_))
    ));

    let order = tracker
        .create_order("PO-11", &png(&baseline()), None)
        .unwrap();
    tracker.submit_upload(order.id, &png(&photo())).unwrap();
    tracker.delete_order(order.id).unwrap();

    assert!(matches!(tracker.order(order.id), Err(StoreError::NotFound(_))));
    assert!(matches!(tracker.history(order.id), Err(StoreError::NotFound(_))));
    assert!(matches!(
        tracker.delete_order(order.id),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn filesystem_tracker_persists_across_reopen() {
    let dir = std::env::temp_dir().join(format!("loomwatch-tracker-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let config = TrackerConfig {
        data_dir: dir.clone(),
        resize_filter: ResizeFilter::Nearest,
    };

    let (order_id, image) = {
        let tracker = Tracker::open(&config).unwrap();
        let order = tracker
            .create_order("FS-1", &png(&baseline()), None)
            .unwrap();
        // Half-resolution tracing: normalized to the order's 100x100 first.
        let small = RgbaImage::from_fn(50, 50, |x, y| if x < 1 && y < 3 { INK } else { CLEAR });
        let result = tracker.compare(order.id, &png(&small), None).unwrap();
        assert_eq!(result.percentage.to_string(), "25.00");
        (order.id, result.image)
    };

    assert!(config.records_path().is_file());
    let reopened = Tracker::open(&config).unwrap();
    let history = reopened.history(order_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].image, image);

    let normalized = reopened.images().load(&image).unwrap();
    assert_eq!(normalized.dimensions(), (100, 100));
    let images: &FsImageStore = reopened.images();
    assert!(images.path_for(&image).unwrap().is_file());

    std::fs::remove_dir_all(&dir).unwrap();
}
