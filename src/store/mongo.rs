//! MongoDB implementation of [`CollectionStore`].

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::{Collection, Database};
use tracing::debug;

use super::{CollectionStore, StoreResult};
use crate::error::StoreWriteError;
use crate::error::mongo::extract_error_info;

/// Collection store backed by one MongoDB database.
#[derive(Clone)]
pub struct MongoCollectionStore {
    database: Database,
}

impl MongoCollectionStore {
    /// Create a store on a database handle
    ///
    /// # Arguments
    /// * `database` - Database handle from a connected client
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// `database.collection` for a collection in this store.
    pub fn namespace(&self, collection: &str) -> String {
        format!("{}.{}", self.database.name(), collection)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl CollectionStore for MongoCollectionStore {
    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        debug!("Executing deleteMany({{}}) on '{}'", self.namespace(collection));

        let result = self
            .collection(collection)
            .delete_many(doc! {})
            .await
            .map_err(|e| StoreWriteError::Clear {
                collection: collection.to_string(),
                info: extract_error_info(&e),
            })?;

        Ok(result.deleted_count)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<u64> {
        debug!(
            "Executing insertMany of {} document(s) on '{}'",
            documents.len(),
            self.namespace(collection)
        );

        let result = self
            .collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| StoreWriteError::Insert {
                collection: collection.to_string(),
                inserted: committed_before_failure(&e),
                info: extract_error_info(&e),
            })?;

        Ok(result.inserted_ids.len() as u64)
    }
}

/// Documents an ordered `insertMany` committed before it failed.
///
/// The driver stops at the first write error and reports its index into the
/// full input, so every document before it was committed. Other failures
/// leave the count unknown.
fn committed_before_failure(error: &mongodb::error::Error) -> Option<u64> {
    match error.kind.as_ref() {
        ErrorKind::InsertMany(insert_error) => insert_error
            .write_errors
            .as_ref()
            .and_then(|errors| errors.iter().map(|e| e.index).min())
            .map(|index| index as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_count_unknown_without_write_errors() {
        let err = mongodb::error::Error::custom("connection reset by peer");
        assert_eq!(committed_before_failure(&err), None);
    }
}
