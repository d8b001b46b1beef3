use std::time::Duration;
use std::{fmt, io};

use serde::Serialize;

use crate::error::mongo::ErrorInfo;

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// Wraps the stage-specific error kinds so the caller can tell an upstream
/// failure from bad data or a downstream failure.
#[derive(Debug)]
pub enum ExportError {
    /// The stored procedure could not produce a usable payload.
    Procedure(ProcedureError),

    /// The payload was not a valid dataset.
    Dataset(DatasetFormatError),

    /// The document store rejected the replacement.
    Store(StoreWriteError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// The run was cancelled before the named stage started.
    Cancelled { stage: &'static str },
}

/// Errors raised while invoking the stored procedure.
#[derive(Debug)]
pub enum ProcedureError {
    /// Tenant identifier is not a positive integer.
    InvalidTenant(i64),

    /// Could not obtain a connection to the relational store.
    Connection(String),

    /// The procedure call itself failed.
    Execution(String),

    /// The call did not complete in time.
    Timeout(Duration),

    /// The output parameter is larger than the configured cap.
    PayloadTooLarge { size: u64, limit: u64 },

    /// The output carries a recognized error marker.
    ErrorMarker { marker: String, excerpt: String },

    /// The output parameter was NULL or empty.
    NoData,
}

/// Errors raised while decoding the procedure payload.
#[derive(Debug)]
pub enum DatasetFormatError {
    /// Payload is not valid JSON.
    Malformed(String),

    /// Top-level JSON value is not an object.
    NotAnObject { found: &'static str },

    /// Records field is absent.
    MissingField(String),

    /// Records field is present but is not an array.
    NotAnArray { field: String, found: &'static str },

    /// An array element could not be turned into a document.
    InvalidRecord { index: usize, reason: String },
}

/// Errors raised while replacing the target collection.
#[derive(Debug)]
pub enum StoreWriteError {
    /// Not connected to the document store.
    Connection(String),

    /// Deleting the previous contents failed.
    Clear { collection: String, info: ErrorInfo },

    /// Bulk insert failed after the collection was cleared.
    ///
    /// The insert is ordered, so the documents before the failing one were
    /// committed. `inserted` is that count, or `None` when the driver could
    /// not say.
    Insert {
        collection: String,
        inserted: Option<u64>,
        info: ErrorInfo,
    },
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Coarse classification callers map to client-facing statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Relational source failed.
    Upstream,
    /// Payload could not be used.
    BadData,
    /// Document store failed.
    Downstream,
    Configuration,
    Cancelled,
    Io,
}

/// State of the target collection after a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// The write step never started.
    Untouched,
    /// Previous contents were deleted and nothing was inserted.
    Cleared,
    /// Previous contents were deleted and only part of the new records
    /// were inserted.
    Partial,
    /// The delete failed, or the insert failed without a committed count;
    /// contents are whatever the server kept.
    Unknown,
}

impl ExportError {
    /// Driver error details, for failures raised by the document store.
    pub fn store_info(&self) -> Option<&ErrorInfo> {
        match self {
            ExportError::Store(
                StoreWriteError::Clear { info, .. } | StoreWriteError::Insert { info, .. },
            ) => Some(info),
            _ => None,
        }
    }

    /// Classify the error for the caller.
    pub fn category(&self) -> FailureCategory {
        match self {
            ExportError::Procedure(_) => FailureCategory::Upstream,
            ExportError::Dataset(_) => FailureCategory::BadData,
            ExportError::Store(_) => FailureCategory::Downstream,
            ExportError::Config(_) => FailureCategory::Configuration,
            ExportError::Io(_) => FailureCategory::Io,
            ExportError::Cancelled { .. } => FailureCategory::Cancelled,
        }
    }

    /// What this failure did to the target collection.
    pub fn target_state(&self) -> TargetState {
        match self {
            ExportError::Store(StoreWriteError::Insert { inserted, .. }) => match inserted {
                Some(0) => TargetState::Cleared,
                Some(_) => TargetState::Partial,
                None => TargetState::Unknown,
            },
            ExportError::Store(StoreWriteError::Clear { .. }) => TargetState::Unknown,
            _ => TargetState::Untouched,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            FailureCategory::Io => 1,
            FailureCategory::Configuration => 2,
            FailureCategory::Upstream => 3,
            FailureCategory::BadData => 4,
            FailureCategory::Downstream => 5,
            FailureCategory::Cancelled => 130,
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Procedure(e) => write!(f, "Procedure error: {e}"),
            ExportError::Dataset(e) => write!(f, "Dataset format error: {e}"),
            ExportError::Store(e) => write!(f, "Store write error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Cancelled { stage } => write!(f, "Export cancelled before {stage}"),
        }
    }
}

impl fmt::Display for ProcedureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureError::InvalidTenant(id) => {
                write!(f, "tenant id must be a positive integer, got {id}")
            }
            ProcedureError::Connection(msg) => {
                write!(f, "procedure execution failed: cannot connect: {msg}")
            }
            ProcedureError::Execution(msg) => write!(f, "procedure execution failed: {msg}"),
            ProcedureError::Timeout(d) => {
                write!(f, "procedure execution failed: timed out after {}s", d.as_secs_f64())
            }
            ProcedureError::PayloadTooLarge { size, limit } => write!(
                f,
                "procedure returned no usable data: output is {size} characters, limit is {limit}"
            ),
            ProcedureError::ErrorMarker { marker, excerpt } => write!(
                f,
                "procedure returned no usable data: output contains error marker '{marker}': {excerpt}"
            ),
            ProcedureError::NoData => {
                write!(f, "procedure returned no usable data: output is empty")
            }
        }
    }
}

impl fmt::Display for DatasetFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFormatError::Malformed(msg) => write!(f, "malformed JSON: {msg}"),
            DatasetFormatError::NotAnObject { found } => {
                write!(f, "expected a JSON object at top level, found {found}")
            }
            DatasetFormatError::MissingField(field) => {
                write!(f, "missing required field '{field}'")
            }
            DatasetFormatError::NotAnArray { field, found } => {
                write!(f, "field '{field}' must be an array, found {found}")
            }
            DatasetFormatError::InvalidRecord { index, reason } => {
                write!(f, "record #{index} is invalid: {reason}")
            }
        }
    }
}

impl fmt::Display for StoreWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreWriteError::Connection(msg) => write!(f, "not connected: {msg}"),
            StoreWriteError::Clear { collection, info } => {
                write!(f, "failed to clear '{collection}': {}", info.summary())
            }
            StoreWriteError::Insert {
                collection,
                inserted: Some(n),
                info,
            } => write!(
                f,
                "bulk insert into '{collection}' failed after clearing it, \
                 {n} document(s) committed: {}",
                info.summary()
            ),
            StoreWriteError::Insert {
                collection,
                inserted: None,
                info,
            } => write!(
                f,
                "bulk insert into '{collection}' failed after clearing it, \
                 committed count unknown: {}",
                info.summary()
            ),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Procedure(e) => Some(e),
            ExportError::Dataset(e) => Some(e),
            ExportError::Store(e) => Some(e),
            ExportError::Config(e) => Some(e),
            ExportError::Io(e) => Some(e),
            ExportError::Cancelled { .. } => None,
        }
    }
}
impl std::error::Error for ProcedureError {}
impl std::error::Error for DatasetFormatError {}
impl std::error::Error for StoreWriteError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<ProcedureError> for ExportError {
    fn from(err: ProcedureError) -> Self {
        ExportError::Procedure(err)
    }
}

impl From<DatasetFormatError> for ExportError {
    fn from(err: DatasetFormatError) -> Self {
        ExportError::Dataset(err)
    }
}

impl From<StoreWriteError> for ExportError {
    fn from(err: StoreWriteError) -> Self {
        ExportError::Store(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<oracle::Error> for ProcedureError {
    fn from(err: oracle::Error) -> Self {
        ProcedureError::Execution(err.to_string())
    }
}

impl From<r2d2::Error> for ProcedureError {
    fn from(err: r2d2::Error) -> Self {
        ProcedureError::Connection(err.to_string())
    }
}
