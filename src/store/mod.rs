//! Document store writing
//!
//! [`DocumentStoreWriter`] replaces the whole contents of one collection:
//! delete everything, then bulk insert the new records. The two steps are
//! separate operations with no transaction around them, so a failed insert
//! leaves the collection empty.

pub mod mongo;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use mongodb::bson::Document;
use tracing::{info, warn};

use crate::error::StoreWriteError;

pub use mongo::MongoCollectionStore;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreWriteError>;

/// The two primitive operations a replace needs.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Delete every document in a collection
    ///
    /// # Arguments
    /// * `collection` - Collection name
    ///
    /// # Returns
    /// * `StoreResult<u64>` - Number of documents deleted
    async fn delete_all(&self, collection: &str) -> StoreResult<u64>;

    /// Insert documents as one bulk operation
    ///
    /// # Arguments
    /// * `collection` - Collection name
    /// * `documents` - Non-empty list of documents
    ///
    /// # Returns
    /// * `StoreResult<u64>` - Number of documents inserted
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<u64>;
}

/// Replaces the contents of one configured collection.
pub struct DocumentStoreWriter<S> {
    store: S,
    collection: String,
}

impl<S: CollectionStore> DocumentStoreWriter<S> {
    /// Create a writer bound to a collection
    ///
    /// # Arguments
    /// * `store` - Backing store
    /// * `collection` - Target collection name
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace every document in the collection with `records`
    ///
    /// An empty `records` clears the collection and inserts nothing.
    ///
    /// # Arguments
    /// * `records` - Documents that make up the new contents
    ///
    /// # Returns
    /// * `StoreResult<u64>` - Number of documents now in the collection
    pub async fn replace_all(&self, records: Vec<Document>) -> StoreResult<u64> {
        let deleted = self.store.delete_all(&self.collection).await?;
        info!("Cleared {} document(s) from '{}'", deleted, self.collection);

        if records.is_empty() {
            info!("No records to insert, '{}' left empty", self.collection);
            return Ok(0);
        }

        let expected = records.len();
        let inserted = self
            .store
            .insert_many(&self.collection, records)
            .await
            .inspect_err(|e| {
                warn!(
                    "Insert into '{}' failed after clear, collection holds only what was committed: {}",
                    self.collection, e
                )
            })?;

        if inserted != expected as u64 {
            warn!(
                "Inserted {} of {} record(s) into '{}'",
                inserted, expected, self.collection
            );
        }

        Ok(inserted)
    }
}
