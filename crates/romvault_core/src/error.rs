use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("Storage backend error: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Metadata store error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("Authentication provider error: {0}")]
    Generic(String),
}

/// Failures surfaced by the asset managers.
///
/// `Display` is the user-facing message. Backend details stay in the
/// `source` chain and are only logged.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Unsupported system: {0}")]
    UnsupportedSystem(String),

    #[error("Invalid save slot {0}, expected a value from 1 to 10")]
    InvalidSlot(i64),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Asset already exists: {0}")]
    DuplicateAsset(String),

    #[error("Access denied")]
    AccessDenied,

    /// A store could not be reached, including a record write that failed
    /// after its object was uploaded.
    #[error("Storage unavailable while {operation}")]
    StorageUnavailable {
        operation: &'static str,
        #[source]
        source: BackendFailure,
    },

    #[error("Could not remove stored object {key}")]
    StorageCleanupFailure {
        key: String,
        #[source]
        source: StorageError,
    },
}

/// The backend error behind [`AssetError::StorageUnavailable`].
#[derive(Error, Debug)]
pub enum BackendFailure {
    #[error(transparent)]
    Object(#[from] StorageError),

    #[error(transparent)]
    Records(#[from] RecordError),
}

impl AssetError {
    /// Stable machine-readable identifier for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            AssetError::NotFound(_) => "not_found",
            AssetError::UnsupportedSystem(_) => "unsupported_system",
            AssetError::InvalidSlot(_) => "invalid_slot",
            AssetError::InvalidFileName(_) => "invalid_file_name",
            AssetError::DuplicateAsset(_) => "duplicate_asset",
            AssetError::AccessDenied => "access_denied",
            AssetError::StorageUnavailable { .. } => "storage_unavailable",
            AssetError::StorageCleanupFailure { .. } => "storage_cleanup_failure",
        }
    }

    pub fn storage(operation: &'static str) -> impl FnOnce(StorageError) -> AssetError {
        move |source| AssetError::StorageUnavailable {
            operation,
            source: source.into(),
        }
    }
}

impl From<RecordError> for AssetError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(what) => AssetError::NotFound(what),
            RecordError::Conflict(what) => AssetError::DuplicateAsset(what),
            other => AssetError::StorageUnavailable {
                operation: "writing metadata",
                source: other.into(),
            },
        }
    }
}
