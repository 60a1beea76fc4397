//! Error types for the storage layer

use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Fewer bytes were available than the layout requires
    #[error("Short read in {section}: expected {expected} bytes, got {got}")]
    ShortRead {
        /// Section being read ("weights", "indInG", "ind", ...)
        section: &'static str,
        /// Bytes required
        expected: usize,
        /// Bytes actually available
        got: usize,
    },

    /// Invalid file format or corrupted data
    #[error("Invalid format: {reason}")]
    InvalidFormat {
        /// Reason for invalid format
        reason: String,
    },

    /// Sparse row offsets or column indices violate the projection invariants
    #[error("Invalid projection: {reason}")]
    InvalidProjection {
        /// What is wrong
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        /// Source I/O error
        source: std::io::Error,
    },

    /// Out of bounds access
    #[error("Index {index} out of bounds (max: {max})")]
    OutOfBounds {
        /// Index that was out of bounds
        index: usize,
        /// Maximum allowed index
        max: usize,
    },
}

impl StorageError {
    /// Create an invalid format error
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create an invalid projection error
    pub fn invalid_projection(reason: impl Into<String>) -> Self {
        Self::InvalidProjection {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StorageError::invalid_format("test reason");
        assert!(matches!(err, StorageError::InvalidFormat { .. }));

        let err = StorageError::invalid_projection("indInG[0] != 0");
        assert!(matches!(err, StorageError::InvalidProjection { .. }));
    }

    #[test]
    fn test_short_read_display() {
        let err = StorageError::ShortRead {
            section: "ind",
            expected: 40,
            got: 12,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Short read in ind"));
        assert!(msg.contains("expected 40"));
    }
}
