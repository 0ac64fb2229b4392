//! In-memory record store for tests and embedding callers.
//!
//! Applies the same scope and foreign-key semantics as the Postgres adapter,
//! but record-by-record in process. Individual collections can be marked as
//! failing to exercise composition error paths.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::records::record_id;
use crate::scope::BranchScope;
use crate::store::{ChildRelation, RecordStore};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Value>>,
    failing: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &str, record: Value) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    pub fn extend(&mut self, collection: &str, records: impl IntoIterator<Item = Value>) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
    }

    /// Make every fetch of `collection` fail.
    pub fn fail_collection(&mut self, collection: &str) {
        self.failing.insert(collection.to_string());
    }

    fn rows(&self, collection: &str) -> EngineResult<&[Value]> {
        if self.failing.contains(collection) {
            return Err(EngineError::fetch(collection, "simulated fetch failure"));
        }
        Ok(self
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }
}

impl RecordStore for MemoryStore {
    async fn find(&self, collection: &str, scope: &BranchScope) -> EngineResult<Vec<Value>> {
        Ok(self
            .rows(collection)?
            .iter()
            .filter(|record| scope.permits(record))
            .cloned()
            .collect())
    }

    async fn find_one(
        &self,
        collection: &str,
        id: &str,
        scope: &BranchScope,
    ) -> EngineResult<Option<Value>> {
        let wanted = id.trim();
        if wanted.is_empty() {
            return Ok(None);
        }
        Ok(self
            .rows(collection)?
            .iter()
            .find(|record| scope.permits(record) && record_id(record) == wanted)
            .cloned())
    }

    async fn find_children(
        &self,
        collection: &str,
        relation: ChildRelation,
        entity_id: &str,
        scope: &BranchScope,
    ) -> EngineResult<Vec<Value>> {
        Ok(self
            .rows(collection)?
            .iter()
            .filter(|record| scope.permits(record) && relation.matches(record, entity_id))
            .cloned()
            .collect())
    }
}
