//! loomwatch-store: storage and the order service for loomwatch.
//!
//! [`loomwatch_engine`] is pure; this crate gives it somewhere to keep
//! things. [`ImageStore`] resolves opaque references to pixels,
//! [`RecordStore`] holds orders and their progress history, and
//! [`Tracker`] wires both to the engine:
//!
//! ```text
//! create_order: decode -> save baseline -> generate + save mask -> insert order
//! compare:      parse mode -> decode -> normalize -> measure -> save -> record
//! ```

pub mod config;
pub mod error;
pub mod image_store;
pub mod records;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::StoreError;
pub use image_store::{FsImageStore, ImageCategory, ImageRef, ImageStore, MemoryImageStore};
pub use records::{
    JsonRecordStore, NewOrder, Order, OrderId, ProgressRecord, ProgressResult, RecordStore,
};
pub use tracker::{MAX_ORDER_NUMBER_LEN, Tracker};
