//! In-memory [`CollectionStore`] with failure injection, for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use mongodb::bson::Document;

use super::{CollectionStore, StoreResult};
use crate::error::{ErrorInfo, StoreWriteError};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    fail_clear: AtomicBool,
    fail_insert: AtomicBool,
    fail_insert_after: Mutex<Option<usize>>,
    insert_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), documents);
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_clears(&self) {
        self.fail_clear.store(true, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    /// Commit the first `committed` documents of the next insert, then fail.
    pub fn fail_inserts_after(&self, committed: usize) {
        *self.fail_insert_after.lock().unwrap() = Some(committed);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(StoreWriteError::Clear {
                collection: collection.to_string(),
                info: ErrorInfo::from_message("injected delete failure"),
            });
        }
        let removed = self
            .collections
            .lock()
            .unwrap()
            .remove(collection)
            .map_or(0, |docs| docs.len());
        Ok(removed as u64)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<u64> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreWriteError::Insert {
                collection: collection.to_string(),
                inserted: Some(0),
                info: ErrorInfo::from_message("injected insert failure"),
            });
        }
        if let Some(committed) = *self.fail_insert_after.lock().unwrap() {
            let prefix: Vec<Document> = documents.into_iter().take(committed).collect();
            let inserted = prefix.len() as u64;
            self.collections
                .lock()
                .unwrap()
                .entry(collection.to_string())
                .or_default()
                .extend(prefix);
            return Err(StoreWriteError::Insert {
                collection: collection.to_string(),
                inserted: Some(inserted),
                info: ErrorInfo::from_message("E11000 duplicate key error"),
            });
        }
        let count = documents.len() as u64;
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(count)
    }
}
