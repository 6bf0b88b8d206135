//! Order and progress-history records.
//!
//! [`RecordStore`] is the result consumer: it owns orders and their
//! append-only progress history. [`JsonRecordStore`] keeps everything in
//! one JSON document, optionally persisted to a file after every write.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use loomwatch_engine::{Dimensions, Percentage, ProgressMode};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::image_store::ImageRef;

/// Identifier assigned to an order by the record store.
pub type OrderId = u64;

/// A registered pattern order and its latest progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier.
    pub id: OrderId,
    /// Unique, human-facing order number.
    pub order_number: String,
    /// Stored baseline image.
    pub base_image: ImageRef,
    /// Stored work-area mask, generated when the order was created.
    pub mask_image: Option<ImageRef>,
    /// Dimensions every comparison image is normalized to.
    pub standard: Dimensions,
    /// Work-area pixel count of the baseline.
    pub total_pixels: u64,
    /// Mode used when a comparison does not name one.
    pub mode: ProgressMode,
    /// Primary artifact of the latest result.
    pub current_image: Option<ImageRef>,
    /// Secondary artifact of the latest result, if it had one.
    pub current_overlay: Option<ImageRef>,
    /// Percentage of the latest result, zero before the first one.
    pub current_progress: Percentage,
    /// When the order was registered.
    pub created_at: DateTime<Utc>,
    /// Registration time or the time of the latest result.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Unique order number, already trimmed.
    pub order_number: String,
    /// Stored baseline image.
    pub base_image: ImageRef,
    /// Stored work-area mask.
    pub mask_image: Option<ImageRef>,
    /// Baseline dimensions.
    pub standard: Dimensions,
    /// Work-area pixel count of the baseline.
    pub total_pixels: u64,
    /// Default progress mode.
    pub mode: ProgressMode,
}

/// Outcome of one measurement, as handed to the record store.
///
/// `overlay` is a distinct secondary artifact (raw traced overlay or diff
/// overlay) and never aliases `image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressResult {
    /// Primary artifact: the normalized image or the composited drawing.
    pub image: ImageRef,
    /// Secondary artifact: the raw traced overlay or the diff overlay.
    pub overlay: Option<ImageRef>,
    /// Completion percentage.
    pub percentage: Percentage,
}

/// One entry in an order's progress history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Store-assigned identifier, increasing in insertion order.
    pub id: u64,
    /// Order this record belongs to.
    pub order_id: OrderId,
    /// Order number of that order.
    pub order_number: String,
    /// Primary artifact.
    pub image: ImageRef,
    /// Secondary artifact, if any.
    pub overlay: Option<ImageRef>,
    /// Completion percentage.
    pub percentage: Percentage,
    /// When the result was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Persistence for orders and progress history.
pub trait RecordStore: Send + Sync {
    /// Register a new order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateOrder`] if the order number is taken.
    fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Look up an order by id.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing storage fails.
    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Look up an order by its order number.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing storage fails.
    fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

    /// All orders, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing storage fails.
    fn orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Append `result` to the order's history and make it the order's
    /// current progress.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order does not exist.
    fn record_progress(
        &self,
        order_id: OrderId,
        result: &ProgressResult,
    ) -> Result<ProgressRecord, StoreError>;

    /// The order's progress history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing storage fails.
    fn history(&self, order_id: OrderId) -> Result<Vec<ProgressRecord>, StoreError>;

    /// Remove an order and its history. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing storage fails.
    fn delete_order(&self, order_id: OrderId) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    next_order_id: OrderId,
    next_record_id: u64,
    orders: Vec<Order>,
    history: Vec<ProgressRecord>,
}

impl Database {
    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }
}

/// Record store holding a single JSON document.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: Option<PathBuf>,
    db: RwLock<Database>,
}

impl JsonRecordStore {
    /// Open (or start) a record file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let db = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Database::default(),
            Err(e) => return Err(e.into()),
        };
        log::debug!("opened record store {}", path.display());
        Ok(Self {
            path: Some(path),
            db: RwLock::new(db),
        })
    }

    /// A store that never touches the filesystem.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: RwLock::new(Database::default()),
        }
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, Database> {
        self.db.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Database> {
        self.db.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the document, persist the copy, then
    /// make it current. On any error the in-memory document is unchanged.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Database) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut db = self.write();
        let mut next = db.clone();
        let value = change(&mut next)?;
        self.persist(&next)?;
        *db = next;
        Ok(value)
    }

    /// Write the whole document to disk via a temporary sibling file.
    fn persist(&self, db: &Database) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec_pretty(db)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    fn insert_order(&self, new: NewOrder) -> Result<Order, StoreError> {
        self.commit(|db| {
            if db.orders.iter().any(|o| o.order_number == new.order_number) {
                return Err(StoreError::DuplicateOrder(new.order_number));
            }

            db.next_order_id += 1;
            let now = Utc::now();
            let order = Order {
                id: db.next_order_id,
                order_number: new.order_number,
                base_image: new.base_image,
                mask_image: new.mask_image,
                standard: new.standard,
                total_pixels: new.total_pixels,
                mode: new.mode,
                current_image: None,
                current_overlay: None,
                current_progress: Percentage::ZERO,
                created_at: now,
                updated_at: now,
            };
            db.orders.push(order.clone());
            Ok(order)
        })
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.read().orders.iter().find(|o| o.id == id).cloned())
    }

    fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        Ok(self
            .read()
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders = self.read().orders.clone();
        orders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    fn record_progress(
        &self,
        order_id: OrderId,
        result: &ProgressResult,
    ) -> Result<ProgressRecord, StoreError> {
        self.commit(|db| {
            let now = Utc::now();
            let order = db
                .order_mut(order_id)
                .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
            order.current_image = Some(result.image.clone());
            order.current_overlay.clone_from(&result.overlay);
            order.current_progress = result.percentage;
            order.updated_at = now;
            let order_number = order.order_number.clone();

            db.next_record_id += 1;
            let record = ProgressRecord {
                id: db.next_record_id,
                order_id,
                order_number,
                image: result.image.clone(),
                overlay: result.overlay.clone(),
                percentage: result.percentage,
                recorded_at: now,
            };
            db.history.push(record.clone());
            Ok(record)
        })
    }

    fn history(&self, order_id: OrderId) -> Result<Vec<ProgressRecord>, StoreError> {
        // Ids are assigned in insertion order, so they break timestamp ties.
        let mut records: Vec<ProgressRecord> = self
            .read()
            .history
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn delete_order(&self, order_id: OrderId) -> Result<bool, StoreError> {
        if self.order(order_id)?.is_none() {
            return Ok(false);
        }
        self.commit(|db| {
            let before = db.orders.len();
            db.orders.retain(|o| o.id != order_id);
            if db.orders.len() == before {
                return Ok(false);
            }
            db.history.retain(|r| r.order_id != order_id);
            Ok(true)
        })
    }
}
