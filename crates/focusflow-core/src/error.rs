//! Core error types for focusflow-core.
//!
//! Nothing in the core is fatal to the process: every error here narrows to
//! "this one feature degrades". The variants exist so callers can log or
//! surface the failure precisely.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusflow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Preference or snapshot store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote collaborator errors (catalog or session service)
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Audio engine errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Snapshot decoding errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Preference/snapshot store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The store's mutex was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Failures talking to the catalog or session service.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The backend is configured offline
    #[error("Remote backend is offline")]
    Offline,

    /// Transport-level failure (connect, timeout, TLS)
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("Malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    /// Invalid base URL in configuration
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request was dropped before it produced a reply
    #[error("Remote request abandoned")]
    Abandoned,

    /// Could not build the private runtime or HTTP client
    #[error("Remote client setup failed: {0}")]
    Setup(String),
}

/// Audio engine errors reported to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No track with this key in the loaded catalog
    #[error("Unknown track: {0}")]
    UnknownTrack(String),
}

/// Failures raised by an audio source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The source file could not be found or decoded
    #[error("Audio source not found: {path}")]
    SourceNotFound { path: String },

    /// The platform refused to start playback (autoplay policy, device busy)
    #[error("Playback rejected: {0}")]
    Rejected(String),
}

/// Persisted timer snapshot problems.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Snapshot JSON could not be parsed
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Snapshot parsed but violates an invariant
    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_converts_into_core_error() {
        let err: CoreError = StorageError::Locked.into();
        assert_eq!(err.to_string(), "Storage error: Database is locked");
    }

    #[test]
    fn rusqlite_error_maps_to_query_failed() {
        let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StorageError::QueryFailed(_)));
    }

    #[test]
    fn unknown_track_message_names_the_key() {
        let err = AudioError::UnknownTrack("rain".into());
        assert_eq!(err.to_string(), "Unknown track: rain");
    }
}
