//! Financial reconciliation and aggregation engine for a Hajj/Umrah travel
//! agency back office.
//!
//! The engine reads untyped JSON records out of a document store and turns
//! them into reconciled financial views: per-entity `{billed, paid, due,
//! advance}` aggregates with a Hajj/Umrah split, per-passenger-type package
//! cost allocation, and a consolidated dashboard. It is a computation
//! library: callers bring their own transport and authentication and hand in
//! a [`scope::BranchScope`] describing what the caller may see.
//!
//! Records are heterogeneous by design. Years of schema drift left the same
//! amount living under different field names across records, so every read
//! goes through ordered candidate-field resolution ([`records::resolve`])
//! instead of typed deserialization.

pub mod aggregate;
pub mod allocator;
pub mod classify;
pub mod config;
pub mod currency;
pub mod dashboard;
pub mod error;
pub mod records;
pub mod scope;
pub mod store;

pub use aggregate::{
    aggregate_agent, aggregate_agents, aggregate_records, aggregate_vendor, package_profit,
    AccountTotals, AgentRollup, EntityAggregate, PackageProfitReport,
};
pub use allocator::{allocate_package_costs, PassengerType, PassengerTypeTotals};
pub use classify::{classify, PackageCategory};
pub use config::EngineConfig;
pub use currency::{to_local, Currency, MoneyFigure};
pub use dashboard::{compose_dashboard, DashboardReport, DateRange};
pub use error::{EngineError, EngineResult};
pub use scope::BranchScope;
pub use store::{ChildRelation, MemoryStore, PgRecordStore, RecordStore};
