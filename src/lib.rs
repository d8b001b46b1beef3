//! oasis-export library
//!
//! Moves one tenant's dataset from an Oracle stored procedure into a MongoDB
//! collection. The procedure returns the dataset as a JSON document in a CLOB;
//! the records it carries replace the contents of the target collection.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `dataset`: Payload parsing into records
//! - `error`: Error types and failure classification
//! - `export`: The export pipeline
//! - `gateway`: Stored procedure invocation
//! - `store`: Replace-all writes to the document store
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use oasis_export::config::Config;
//! use oasis_export::connection::ConnectionManager;
//! use oasis_export::dataset::DatasetParser;
//! use oasis_export::export::ExportOrchestrator;
//! use oasis_export::gateway::OracleProcedureGateway;
//! use oasis_export::store::{DocumentStoreWriter, MongoCollectionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_from_file(None)?;
//!     let mut manager = ConnectionManager::new(config.mongodb.clone());
//!     manager.connect().await?;
//!
//!     let orchestrator = ExportOrchestrator::new(
//!         OracleProcedureGateway::from_config(&config.oracle),
//!         DatasetParser::new(config.dataset.records_field.clone()),
//!         DocumentStoreWriter::new(
//!             MongoCollectionStore::new(manager.get_database(&config.mongodb.database)?),
//!             config.mongodb.collection.clone(),
//!         ),
//!         config.procedure_timeout(),
//!     );
//!
//!     let report = orchestrator.export(42).await?;
//!     println!("{}", report.message());
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod dataset;
pub mod error;
pub mod export;
pub mod gateway;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{ExportError, FailureCategory, Result, TargetState};
pub use export::{ExportOrchestrator, ExportReport};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> String {
    format!("oasis-export {}", VERSION)
}
