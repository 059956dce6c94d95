//! Error types for the native handle registry.
//!
//! Only corrupt persisted state is fatal. Everything else the registry
//! encounters during normal add/remove traffic degrades silently and never
//! reaches this type.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Persisted state errors
    #[error("Corrupt address file {path:?}: {contents:?} is not a decimal address")]
    CorruptAddressFile { path: PathBuf, contents: String },

    #[error("Address file {path:?} holds unusable slab address {address:#x}")]
    InvalidAddress { path: PathBuf, address: usize },

    #[error("Slab at {address:#x} from {path:?} has {recorded} cells, registry expects {requested}")]
    CapacityMismatch {
        path: PathBuf,
        address: usize,
        recorded: usize,
        requested: usize,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Native memory errors
    #[error("Native allocator returned null for a slab of {cells} cells")]
    Allocation { cells: usize },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RegistryError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error means the persisted slab address cannot be trusted.
    ///
    /// Fatal errors must not be papered over by allocating a fresh slab: the
    /// original slab would be orphaned along with every handle it tracks.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RegistryError::CorruptAddressFile { .. }
                | RegistryError::InvalidAddress { .. }
                | RegistryError::CapacityMismatch { .. }
        )
    }
}
