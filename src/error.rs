//! Error types for food_sync

use std::fmt;

/// Unified error type for food_sync operations
///
/// Provider transport failures never surface here; the API clients collapse
/// them into a tagged fetch outcome and log them. What remains is the store
/// and the JSON column it carries.
#[derive(Debug)]
pub enum SyncError {
    /// Failed to encode or decode JSON
    Parse(serde_json::Error),
    /// Database operation failed
    Database(rusqlite::Error),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Parse(e) => write!(f, "Parse error: {}", e),
            SyncError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Parse(e) => Some(e),
            SyncError::Database(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err)
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Database(err)
    }
}

/// Result alias for food_sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
