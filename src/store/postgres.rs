//! PostgreSQL document store.
//!
//! Each collection is a table of `(id uuid, doc jsonb)` rows; the engine
//! reads documents whole and never writes. Filters are built with
//! `QueryBuilder` against validated, allow-listed identifiers only: the
//! branch tag and foreign-key variants live inside the document, so the
//! WHERE clauses address jsonb paths (`doc->>'agentId'`,
//! `doc#>>'{agentInfo,agentId}'`) with the compared values always bound.

use std::time::Duration;

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::scope::{BranchScope, BRANCH_KEY_PATHS};
use crate::store::{ChildRelation, RecordStore};

const ALLOWED_COLLECTIONS: &[&str] = &[
    "customers",
    "agents",
    "vendors",
    "packages",
    "vendor_bills",
    "loans",
    "money_exchanges",
    "bank_accounts",
    "branches",
];

#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    fetch_limit: i64,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, fetch_limit: i64) -> Self {
        Self {
            pool,
            fetch_limit: fetch_limit.max(1),
        }
    }

    pub async fn connect(config: &EngineConfig) -> EngineResult<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            EngineError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_pool_max_connections)
            .min_connections(config.db_pool_min_connections)
            .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
            .connect(url)
            .await
            .map_err(|error| {
                EngineError::Dependency(format!("Database connection failed: {error}"))
            })?;
        Ok(Self::new(pool, config.fetch_limit))
    }

    async fn list(
        &self,
        collection: &str,
        scope: &BranchScope,
        child: Option<(ChildRelation, &str)>,
    ) -> EngineResult<Vec<Value>> {
        let mut query = build_list_query(collection, scope, child, self.fetch_limit)?;
        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| map_db_error(collection, &error))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.try_get::<Value, _>("doc").ok())
            .collect())
    }
}

impl RecordStore for PgRecordStore {
    async fn find(&self, collection: &str, scope: &BranchScope) -> EngineResult<Vec<Value>> {
        self.list(collection, scope, None).await
    }

    async fn find_one(
        &self,
        collection: &str,
        record_id: &str,
        scope: &BranchScope,
    ) -> EngineResult<Option<Value>> {
        let mut query = build_get_query(collection, record_id, scope)?;
        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_db_error(collection, &error))?;
        Ok(row.and_then(|row| row.try_get::<Value, _>("doc").ok()))
    }

    async fn find_children(
        &self,
        collection: &str,
        relation: ChildRelation,
        entity_id: &str,
        scope: &BranchScope,
    ) -> EngineResult<Vec<Value>> {
        if entity_id.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.list(collection, scope, Some((relation, entity_id))).await
    }
}

fn build_list_query(
    collection: &str,
    scope: &BranchScope,
    child: Option<(ChildRelation, &str)>,
    limit: i64,
) -> EngineResult<QueryBuilder<'static, Postgres>> {
    let table = validate_collection(collection)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT t.doc AS doc FROM ");
    query.push(table).push(" t WHERE 1=1");

    push_branch_clause(&mut query, scope)?;

    if let Some((relation, entity_id)) = child {
        push_variant_clause(&mut query, relation.key_paths(), entity_id)?;
    }

    query.push(" ORDER BY t.id LIMIT ").push_bind(limit.max(1));
    Ok(query)
}

fn build_get_query(
    collection: &str,
    record_id: &str,
    scope: &BranchScope,
) -> EngineResult<QueryBuilder<'static, Postgres>> {
    let table = validate_collection(collection)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT t.doc AS doc FROM ");
    query.push(table).push(" t WHERE (");
    // The id column is uuid-typed; legacy imports keep their original id in
    // the document's `_id`.
    let mut matched_column = false;
    if let Ok(parsed) = uuid::Uuid::parse_str(record_id.trim()) {
        query.push("t.id = ").push_bind(parsed);
        matched_column = true;
    }
    if matched_column {
        query.push(" OR ");
    }
    query
        .push(jsonb_text_expr("_id")?)
        .push(" = ")
        .push_bind(record_id.trim().to_string());
    query.push(")");

    push_branch_clause(&mut query, scope)?;
    query.push(" LIMIT 1");
    Ok(query)
}

fn push_branch_clause(
    query: &mut QueryBuilder<'static, Postgres>,
    scope: &BranchScope,
) -> EngineResult<()> {
    let Some(branch) = scope.branch_filter() else {
        return Ok(());
    };
    query.push(" AND (");
    for (position, path) in BRANCH_KEY_PATHS.iter().enumerate() {
        if position > 0 {
            query.push(" OR ");
        }
        query
            .push(jsonb_text_expr(path)?)
            .push(" = ")
            .push_bind(branch.to_string());
    }
    query.push(")");
    Ok(())
}

fn push_variant_clause(
    query: &mut QueryBuilder<'static, Postgres>,
    paths: &[&str],
    entity_id: &str,
) -> EngineResult<()> {
    query.push(" AND (");
    for (position, path) in paths.iter().enumerate() {
        if position > 0 {
            query.push(" OR ");
        }
        query
            .push(jsonb_text_expr(path)?)
            .push(" = ")
            .push_bind(entity_id.trim().to_string());
    }
    query.push(")");
    Ok(())
}

/// Render a validated dot path as a jsonb text extraction expression.
fn jsonb_text_expr(path: &str) -> EngineResult<String> {
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments {
        validate_key(segment)?;
    }
    if segments.len() == 1 {
        return Ok(format!("t.doc->>'{}'", segments[0]));
    }
    Ok(format!("t.doc#>>'{{{}}}'", segments.join(",")))
}

fn validate_collection(collection: &str) -> EngineResult<&str> {
    let trimmed = collection.trim();
    if ALLOWED_COLLECTIONS.contains(&trimmed) {
        return Ok(trimmed);
    }
    Err(EngineError::Forbidden(format!(
        "Collection '{trimmed}' is not allowed."
    )))
}

/// Document keys come from this crate's own constants, but everything pushed
/// unbound into SQL is validated anyway.
fn validate_key(key: &str) -> EngineResult<&str> {
    if key.is_empty() {
        return Err(EngineError::BadRequest(
            "Document key cannot be empty.".to_string(),
        ));
    }
    if !key
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || character == '_')
    {
        return Err(EngineError::BadRequest(format!(
            "Invalid document key '{key}'."
        )));
    }
    if key.chars().next().is_some_and(|first| first.is_ascii_digit()) {
        return Err(EngineError::BadRequest(format!(
            "Invalid document key '{key}'."
        )));
    }
    Ok(key)
}

fn map_db_error(collection: &str, error: &sqlx::Error) -> EngineError {
    let detail = error.to_string();
    tracing::error!(collection, db_error = %detail, "Database query failed");
    EngineError::fetch(collection, "database query failed")
}
