//! Image storage: resolve opaque references to pixels and back.
//!
//! This module defines the [`ImageStore`] trait and two implementations:
//! [`FsImageStore`], which writes PNG files under a root directory, and
//! [`MemoryImageStore`], which keeps encoded PNGs in memory.
//!
//! References look like `/uploads/<category>/<hash>.png`. The hash is a
//! SipHash of the encoded PNG, so saving identical pixels twice yields
//! the same reference.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use loomwatch_engine::{RgbaImage, decode_rgba, encode_png};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::error::StoreError;

/// Namespace a saved artifact is filed under. Organizational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCategory {
    /// Order baselines.
    Base,
    /// Normalized comparison photos.
    Compare,
    /// Normalized uploaded progress photos.
    Uploads,
    /// Traced overlays and diff overlays.
    Overlays,
    /// Work-area masks.
    Masks,
    /// Overlays composited onto their baseline.
    Merged,
}

impl ImageCategory {
    /// All categories.
    pub const ALL: [Self; 6] = [
        Self::Base,
        Self::Compare,
        Self::Uploads,
        Self::Overlays,
        Self::Masks,
        Self::Merged,
    ];

    /// Directory name for this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Compare => "compare",
            Self::Uploads => "uploads",
            Self::Overlays => "overlays",
            Self::Masks => "masks",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, stable reference to a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap an existing reference string.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference for PNG bytes saved under `category`.
    fn for_png(png: &[u8], category: ImageCategory) -> Self {
        let mut hasher = SipHasher13::new();
        hasher.write(png);
        Self(format!("/uploads/{category}/{:016x}.png", hasher.finish()))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage backend for images.
///
/// Implementations must be safe to share between threads; comparisons
/// for different orders may load and save concurrently.
pub trait ImageStore: Send + Sync {
    /// Load and decode the image behind `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored there and
    /// [`StoreError::Decode`] if the stored bytes are not a valid image.
    fn load(&self, reference: &ImageRef) -> Result<RgbaImage, StoreError>;

    /// Encode `image` as PNG and store it under `category`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    fn save(&self, image: &RgbaImage, category: ImageCategory) -> Result<ImageRef, StoreError>;
}

/// Distinguishes concurrent temporary files within one process.
static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Image store backed by PNG files under a root directory.
///
/// Files are written to a temporary sibling and renamed into place, so a
/// reference never resolves to a partially written file.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    /// Store files under `root`. Directories are created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidReference`] for references that are
    /// empty or contain `..`, a drive prefix, or other non-normal
    /// components.
    pub fn path_for(&self, reference: &ImageRef) -> Result<PathBuf, StoreError> {
        let relative = Path::new(reference.as_str().trim_start_matches('/'));
        let is_clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !is_clean || relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageStore for FsImageStore {
    fn load(&self, reference: &ImageRef) -> Result<RgbaImage, StoreError> {
        let path = self.path_for(reference)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(reference.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(decode_rgba(&bytes)?)
    }

    fn save(&self, image: &RgbaImage, category: ImageCategory) -> Result<ImageRef, StoreError> {
        let png = encode_png(image)?;
        let reference = ImageRef::for_png(&png, category);
        let path = self.path_for(&reference)?;

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // An interrupted earlier write can leave a truncated file under the
        // right name; only skip the write when the bytes already match.
        if std::fs::read(&path).ok().as_deref() == Some(png.as_slice()) {
            log::debug!("{reference} already stored");
            return Ok(reference);
        }

        let tmp = path.with_extension(format!(
            "png.{}-{}.tmp",
            std::process::id(),
            TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = std::fs::write(&tmp, &png).and_then(|()| std::fs::rename(&tmp, &path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("saved {} ({} bytes)", reference, png.len());
        Ok(reference)
    }
}

/// Image store that keeps encoded PNGs in memory.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: RwLock<HashMap<ImageRef, Vec<u8>>>,
}

impl MemoryImageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct stored images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store raw (possibly invalid) bytes under `reference`.
    pub fn insert_raw(&self, reference: ImageRef, bytes: Vec<u8>) {
        self.images
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference, bytes);
    }
}

impl ImageStore for MemoryImageStore {
    fn load(&self, reference: &ImageRef) -> Result<RgbaImage, StoreError> {
        let images = self.images.read().unwrap_or_else(PoisonError::into_inner);
        let bytes = images
            .get(reference)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;
        Ok(decode_rgba(bytes)?)
    }

    fn save(&self, image: &RgbaImage, category: ImageCategory) -> Result<ImageRef, StoreError> {
        let png = encode_png(image)?;
        let reference = ImageRef::for_png(&png, category);
        self.insert_raw(reference.clone(), png);
        Ok(reference)
    }
}
