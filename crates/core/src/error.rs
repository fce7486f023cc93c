//! Error types for brickstore
//!
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations. Construction-time failures get their own variant so
//! callers can distinguish "this engine never came up" from operational
//! errors on a live engine.

use thiserror::Error;

/// Result type alias for brickstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the persistence layer
#[derive(Debug, Error)]
pub enum Error {
    /// Query or read matched nothing
    #[error("not found")]
    NotFound,

    /// A hydrating read was attempted without choosing a lock preference
    #[error("read preference unset: choose NoLock or MustLock before reading")]
    ReadPreferenceUnset,

    /// Backend setup failed while opening an engine (fatal for that instance)
    #[error("construction failure: {0}")]
    Construction(String),

    /// Operational backend failure (apply, read, update, delete)
    #[error("backend error: {0}")]
    Backend(String),

    /// Clause or document normalization failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation named a collection that was never declared
    #[error("unknown collection: {0}")]
    CollectionMissing(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        assert_eq!(Error::NotFound.to_string(), "not found");
    }

    #[test]
    fn test_error_display_read_preference() {
        let msg = Error::ReadPreferenceUnset.to_string();
        assert!(msg.contains("read preference unset"));
    }

    #[test]
    fn test_error_display_construction() {
        let err = Error::Construction("drop failed".to_string());
        let msg = err.to_string();
        assert!(msg.contains("construction failure"));
        assert!(msg.contains("drop failed"));
    }

    #[test]
    fn test_error_display_backend() {
        let err = Error::Backend("apply failed".to_string());
        assert!(err.to_string().contains("apply failed"));
    }

    #[test]
    fn test_error_display_collection_missing() {
        let err = Error::CollectionMissing("users".to_string());
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let result: std::result::Result<i64, serde_json::Error> =
            serde_json::from_str("not json");
        let err: Error = result.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
