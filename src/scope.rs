//! Branch scoping for aggregation reads.
//!
//! A `BranchScope` is a request-scoped value handed in by the auth
//! collaborator, never stored data. Stores consult it at query-construction
//! time: a branch-bound caller only sees records tagged with its branch, a
//! super admin (or a scope with no branch at all) sees everything.

use serde_json::Value;

use crate::records::value_at;

/// Branch-tag field variants on records, most recent schema first.
pub const BRANCH_KEY_PATHS: &[&str] = &["branchId", "branch_id"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchScope {
    pub branch_id: Option<String>,
    pub is_super_admin: bool,
}

impl BranchScope {
    pub fn super_admin() -> Self {
        Self {
            branch_id: None,
            is_super_admin: true,
        }
    }

    pub fn for_branch(branch_id: impl Into<String>) -> Self {
        Self {
            branch_id: Some(branch_id.into()),
            is_super_admin: false,
        }
    }

    /// The branch filter the store must apply, if any.
    pub fn branch_filter(&self) -> Option<&str> {
        if self.is_super_admin {
            return None;
        }
        self.branch_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Record-level scope check, matching the query-time filter semantics:
    /// a record must carry the caller's branch tag under one of the known
    /// field variants. Untagged records are not visible to branch-bound
    /// callers.
    pub fn permits(&self, record: &Value) -> bool {
        let Some(branch) = self.branch_filter() else {
            return true;
        };
        BRANCH_KEY_PATHS.iter().any(|path| {
            value_at(record, path)
                .and_then(Value::as_str)
                .is_some_and(|tag| tag.trim() == branch)
        })
    }
}
