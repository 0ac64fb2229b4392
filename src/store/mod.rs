//! The record-store boundary.
//!
//! The engine treats persistence as a collaborator behind the `RecordStore`
//! trait: every record is an untyped JSON object and every field is
//! possibly absent. Child-record joins go through a declarative map of
//! foreign-key field variants (`ChildRelation`) consulted at
//! query-construction time, so the aggregation code never needs to know
//! which schema generation a child record was written under.

pub mod memory;
pub mod postgres;

use std::future::Future;

use serde_json::Value;

use crate::error::EngineResult;
use crate::records::value_at;
use crate::scope::BranchScope;

pub use memory::MemoryStore;
pub use postgres::PgRecordStore;

/// Foreign-key field variants per parent entity kind, most recent schema
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRelation {
    Agent,
    Vendor,
    Package,
    Branch,
}

impl ChildRelation {
    pub fn key_paths(self) -> &'static [&'static str] {
        match self {
            Self::Agent => &["agentId", "agent_id", "agentInfo.agentId"],
            Self::Vendor => &["vendorId", "vendor_id", "vendorInfo.vendorId"],
            Self::Package => &["packageId", "package_id", "packageInfo.packageId"],
            Self::Branch => &["branchId", "branch_id"],
        }
    }

    /// String-equality match of a child record's foreign key against an
    /// entity id, under any known field variant.
    pub fn matches(self, record: &Value, entity_id: &str) -> bool {
        let wanted = entity_id.trim();
        if wanted.is_empty() {
            return false;
        }
        self.key_paths().iter().any(|path| {
            value_at(record, path).is_some_and(|value| match value {
                Value::String(text) => text.trim() == wanted,
                Value::Number(number) => number.to_string() == wanted,
                _ => false,
            })
        })
    }
}

/// Read-only record retrieval within a branch scope. Implementations apply
/// the scope at query time; the engine never re-checks it.
pub trait RecordStore: Send + Sync {
    /// Every record of one collection visible to the scope.
    fn find(
        &self,
        collection: &str,
        scope: &BranchScope,
    ) -> impl Future<Output = EngineResult<Vec<Value>>> + Send;

    /// A single record by id, `None` when absent or out of scope.
    fn find_one(
        &self,
        collection: &str,
        record_id: &str,
        scope: &BranchScope,
    ) -> impl Future<Output = EngineResult<Option<Value>>> + Send;

    /// Child records whose foreign key matches `entity_id` under any of the
    /// relation's field variants.
    fn find_children(
        &self,
        collection: &str,
        relation: ChildRelation,
        entity_id: &str,
        scope: &BranchScope,
    ) -> impl Future<Output = EngineResult<Vec<Value>>> + Send;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ChildRelation;

    #[test]
    fn matches_any_foreign_key_variant() {
        let relation = ChildRelation::Agent;
        assert!(relation.matches(&json!({ "agentId": "a1" }), "a1"));
        assert!(relation.matches(&json!({ "agent_id": " a1 " }), "a1"));
        assert!(relation.matches(&json!({ "agentInfo": { "agentId": "a1" } }), "a1"));
        assert!(relation.matches(&json!({ "agentId": 42 }), "42"));
        assert!(!relation.matches(&json!({ "agentId": "a2" }), "a1"));
        assert!(!relation.matches(&json!({}), "a1"));
        assert!(!relation.matches(&json!({ "agentId": "a1" }), "  "));
    }

    #[test]
    fn package_variants_cover_nested_info() {
        let relation = ChildRelation::Package;
        assert!(relation.matches(&json!({ "packageInfo": { "packageId": "p7" } }), "p7"));
        assert!(relation.matches(&json!({ "package_id": "p7" }), "p7"));
    }
}
