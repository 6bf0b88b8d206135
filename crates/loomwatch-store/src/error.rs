//! Errors for image storage, record storage, and the order service.

use loomwatch_engine::EngineError;

/// Errors that can occur while storing, loading, or measuring orders.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An image reference or order id does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// Image bytes were empty, corrupt, or in an unsupported format.
    #[error("{0}")]
    Decode(#[source] EngineError),

    /// The engine rejected the request (invalid mode, bad dimensions).
    #[error(transparent)]
    Engine(EngineError),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record file could not be read or written as JSON.
    #[error("record serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Order input failed validation.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// An order with this number already exists.
    #[error("order number already exists: {0}")]
    DuplicateOrder(String),

    /// An image reference is malformed or escapes the store root.
    #[error("invalid image reference: {0}")]
    InvalidReference(String),
}

impl StoreError {
    /// Returns `true` for an unrecognized progress mode string.
    #[must_use]
    pub const fn is_invalid_mode(&self) -> bool {
        matches!(self, Self::Engine(EngineError::InvalidMode(_)))
    }
}

impl From<EngineError> for StoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ImageDecode(_) | EngineError::EmptyInput => Self::Decode(err),
            other => Self::Engine(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_maps_to_decode() {
        let err = StoreError::from(EngineError::EmptyInput);
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn invalid_mode_maps_to_engine() {
        let err = StoreError::from(EngineError::InvalidMode("bogus".to_owned()));
        assert!(err.is_invalid_mode());
        assert!(err.to_string().contains("bogus"));
    }
}
