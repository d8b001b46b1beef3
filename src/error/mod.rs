//! Error handling for the export pipeline.
//!
//! This module provides:
//! - One error kind per pipeline stage (procedure, dataset, store)
//! - A top-level [`ExportError`] with failure classification helpers
//! - Structured error information extracted from MongoDB driver errors
//!
//! # Example
//!
//! ```rust,no_run
//! use oasis_export::error::{ExportError, ProcedureError, TargetState};
//!
//! let err = ExportError::from(ProcedureError::NoData);
//! assert_eq!(err.target_state(), TargetState::Untouched);
//! ```

pub mod kinds;
pub mod mongo;

// Re-export commonly used types
pub use kinds::{
    ConfigError, DatasetFormatError, ExportError, FailureCategory, ProcedureError, Result,
    StoreWriteError, TargetState,
};
pub use mongo::ErrorInfo;
