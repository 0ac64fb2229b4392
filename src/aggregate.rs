//! Entity financial aggregation and reconciliation.
//!
//! Agent and vendor accounts carry cached `{totalBilled, totalPaid, …}`
//! snapshots that go stale as child records are edited. The authoritative
//! figures are therefore always recomputed by scanning the child records;
//! the cached snapshot is only a fallback when a computed sum is exactly
//! zero (a new or unused account). Due is always derived, never read from
//! a stored field. Advance is the one asymmetry: it is recomputed only when
//! paid strictly exceeds billed and otherwise falls back to the cached
//! value, preserving manually-recorded advances.

use serde::Serialize;
use serde_json::Value;

use crate::allocator::{allocate_package_costs, customer_passenger_type, PassengerType, PassengerTypeTotals};
use crate::classify::{classify, PackageCategory};
use crate::error::EngineResult;
use crate::records::{record_id, resolve_path, round2, value_str};
use crate::scope::BranchScope;
use crate::store::{ChildRelation, RecordStore};

/// Ordered amount-field candidates for one child record type:
/// financial-summary fields first, then payment-summary fields, then flat
/// legacy fields.
#[derive(Debug, Clone, Copy)]
pub struct AmountPaths {
    pub billed: &'static [&'static str],
    pub paid: &'static [&'static str],
}

pub const PACKAGE_AMOUNTS: AmountPaths = AmountPaths {
    billed: &[
        "financialSummary.totalBilled",
        "totals.grandTotal",
        "totalBilled",
        "billTotal",
        "subtotal",
        "totalPrice",
    ],
    paid: &[
        "financialSummary.totalPaid",
        "paymentSummary.totalPaid",
        "totalPaid",
        "paidTotal",
        "advancePayment",
    ],
};

pub const VENDOR_BILL_AMOUNTS: AmountPaths = AmountPaths {
    billed: &["totals.billTotal", "billAmount", "totalAmount", "amount"],
    paid: &["totals.paidTotal", "paidAmount", "payment", "paid"],
};

pub const CUSTOMER_AMOUNTS: AmountPaths = AmountPaths {
    billed: &["totalAmount", "packagePrice", "amount"],
    paid: &["paidAmount", "totalPaid", "paid"],
};

/// Cached snapshot fields on an entity account, per reconciliation scope.
#[derive(Debug, Clone, Copy)]
struct CachePaths {
    billed: &'static [&'static str],
    paid: &'static [&'static str],
    advance: &'static [&'static str],
}

const TOTAL_CACHE: CachePaths = CachePaths {
    billed: &["totalBilled", "totalBill", "billed"],
    paid: &["totalPaid", "paid"],
    advance: &["totalAdvance", "advance"],
};

// The single-j `haj*` spelling is the legacy cache vocabulary.
const HAJJ_CACHE: CachePaths = CachePaths {
    billed: &["hajBilled", "hajjBilled"],
    paid: &["hajPaid", "hajjPaid"],
    advance: &["hajAdvance", "hajjAdvance"],
};

const UMRAH_CACHE: CachePaths = CachePaths {
    billed: &["umrahBilled"],
    paid: &["umrahPaid"],
    advance: &["umrahAdvance"],
};

/// A reconciled `{billed, paid, due, advance}` tuple. `totalDue` is always
/// `max(0, billed − paid)`; it never comes from a stored field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTotals {
    pub total_billed: f64,
    pub total_paid: f64,
    pub total_due: f64,
    pub total_advance: f64,
}

impl AccountTotals {
    fn accumulate(&mut self, other: &AccountTotals) {
        self.total_billed += other.total_billed;
        self.total_paid += other.total_paid;
        self.total_due += other.total_due;
        self.total_advance += other.total_advance;
    }

    pub fn rounded(&self) -> AccountTotals {
        AccountTotals {
            total_billed: round2(self.total_billed),
            total_paid: round2(self.total_paid),
            total_due: round2(self.total_due),
            total_advance: round2(self.total_advance),
        }
    }
}

/// One entity's reconciled totals plus the Hajj/Umrah split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAggregate {
    #[serde(flatten)]
    pub total: AccountTotals,
    pub hajj: AccountTotals,
    pub umrah: AccountTotals,
}

impl EntityAggregate {
    pub(crate) fn accumulate(&mut self, other: &EntityAggregate) {
        self.total.accumulate(&other.total);
        self.hajj.accumulate(&other.hajj);
        self.umrah.accumulate(&other.umrah);
    }

    pub fn rounded(&self) -> EntityAggregate {
        EntityAggregate {
            total: self.total.rounded(),
            hajj: self.hajj.rounded(),
            umrah: self.umrah.rounded(),
        }
    }
}

fn cached(entity: Option<&Value>, paths: &'static [&'static str]) -> f64 {
    entity.map(|record| resolve_path(record, paths)).unwrap_or(0.0)
}

fn reconcile(entity: Option<&Value>, cache: &CachePaths, billed: f64, paid: f64) -> AccountTotals {
    let final_billed = if billed != 0.0 {
        billed
    } else {
        let fallback = cached(entity, cache.billed);
        if fallback != 0.0 {
            tracing::debug!(cached = fallback, "no computed billed sum, using cached snapshot");
        }
        fallback
    };
    let final_paid = if paid != 0.0 { paid } else { cached(entity, cache.paid) };

    let total_due = (final_billed - final_paid).max(0.0);
    // Advance is only re-derived on overpayment; otherwise the cached value
    // survives so manually-recorded advances are not reset to zero.
    let total_advance = if final_paid > final_billed {
        final_paid - final_billed
    } else {
        cached(entity, cache.advance)
    };

    AccountTotals {
        total_billed: final_billed,
        total_paid: final_paid,
        total_due,
        total_advance,
    }
}

/// Aggregate one entity from its already-fetched child records.
///
/// `entity` is the account record whose cached snapshot backs the fallback
/// rules; pass `None` when there is no account record (direct customer
/// aggregation, unknown entity id). Children that are not objects or carry
/// no usable amounts simply contribute zero; this function cannot fail.
pub fn aggregate_records<'a, I>(
    entity: Option<&Value>,
    children: I,
    amounts: &AmountPaths,
) -> EntityAggregate
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut billed = 0.0;
    let mut paid = 0.0;
    let mut hajj_billed = 0.0;
    let mut hajj_paid = 0.0;
    let mut umrah_billed = 0.0;
    let mut umrah_paid = 0.0;

    for child in children {
        if !child.is_object() {
            continue;
        }
        let child_billed = resolve_path(child, amounts.billed);
        let child_paid = resolve_path(child, amounts.paid);
        billed += child_billed;
        paid += child_paid;
        match classify(child) {
            PackageCategory::Hajj => {
                hajj_billed += child_billed;
                hajj_paid += child_paid;
            }
            PackageCategory::Umrah => {
                umrah_billed += child_billed;
                umrah_paid += child_paid;
            }
            PackageCategory::Other => {}
        }
    }

    EntityAggregate {
        total: reconcile(entity, &TOTAL_CACHE, billed, paid),
        hajj: reconcile(entity, &HAJJ_CACHE, hajj_billed, hajj_paid),
        umrah: reconcile(entity, &UMRAH_CACHE, umrah_billed, umrah_paid),
    }
}

/// Aggregate an agent account from its packages. An unknown agent id yields
/// all-zero totals rather than an error.
pub async fn aggregate_agent<S: RecordStore>(
    store: &S,
    scope: &BranchScope,
    agent_id: &str,
) -> EngineResult<EntityAggregate> {
    let entity = store.find_one("agents", agent_id, scope).await?;
    let children = store
        .find_children("packages", ChildRelation::Agent, agent_id, scope)
        .await?;
    Ok(aggregate_records(entity.as_ref(), &children, &PACKAGE_AMOUNTS))
}

/// Aggregate a vendor account from its bills.
pub async fn aggregate_vendor<S: RecordStore>(
    store: &S,
    scope: &BranchScope,
    vendor_id: &str,
) -> EngineResult<EntityAggregate> {
    let entity = store.find_one("vendors", vendor_id, scope).await?;
    let children = store
        .find_children("vendor_bills", ChildRelation::Vendor, vendor_id, scope)
        .await?;
    Ok(aggregate_records(entity.as_ref(), &children, &VENDOR_BILL_AMOUNTS))
}

/// One row of the agent listing view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRollup {
    pub agent_id: String,
    pub name: String,
    #[serde(flatten)]
    pub totals: EntityAggregate,
}

/// Per-agent rollup over already-fetched agents and packages, for the agent
/// listing. Agents without an id are skipped (nothing can reference them).
pub fn aggregate_agents(agents: &[Value], packages: &[Value]) -> Vec<AgentRollup> {
    agents
        .iter()
        .filter_map(|agent| {
            let agent_id = record_id(agent);
            if agent_id.is_empty() {
                return None;
            }
            let children = packages
                .iter()
                .filter(|package| ChildRelation::Agent.matches(package, &agent_id));
            let totals = aggregate_records(Some(agent), children, &PACKAGE_AMOUNTS).rounded();
            Some(AgentRollup {
                name: value_str(agent, "name"),
                agent_id,
                totals,
            })
        })
        .collect()
}

/// Headcounts assigned to one package, by passenger type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Headcounts {
    pub adult: u64,
    pub child: u64,
    pub infant: u64,
}

/// Package profit/loss view: allocated per-unit costs scaled by assigned
/// headcount against realized customer payments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageProfitReport {
    pub package_id: String,
    pub category: PackageCategory,
    pub headcounts: Headcounts,
    pub unit_costs: PassengerTypeTotals,
    pub total_cost: f64,
    pub total_billed: f64,
    pub total_paid: f64,
    pub total_due: f64,
    pub profit: f64,
}

/// Compute one package's profit/loss from its assigned customers.
///
/// `customers` must already be filtered to this package (the store joins on
/// the packageId field variants). Profit is realized: collected payments
/// minus allocated cost, so an undersold package shows a loss until
/// collection catches up.
pub fn package_profit(package: &Value, customers: &[Value]) -> PackageProfitReport {
    let unit_costs = allocate_package_costs(package);

    let mut headcounts = Headcounts::default();
    let mut total_billed = 0.0;
    let mut total_paid = 0.0;
    for customer in customers {
        if !customer.is_object() {
            continue;
        }
        match customer_passenger_type(customer) {
            PassengerType::Adult => headcounts.adult += 1,
            PassengerType::Child => headcounts.child += 1,
            PassengerType::Infant => headcounts.infant += 1,
        }
        total_billed += resolve_path(customer, CUSTOMER_AMOUNTS.billed);
        total_paid += resolve_path(customer, CUSTOMER_AMOUNTS.paid);
    }

    let total_cost =
        unit_costs.total_for_headcounts(headcounts.adult, headcounts.child, headcounts.infant);

    PackageProfitReport {
        package_id: record_id(package),
        category: classify(package),
        headcounts,
        unit_costs,
        total_cost: round2(total_cost),
        total_billed: round2(total_billed),
        total_paid: round2(total_paid),
        total_due: round2((total_billed - total_paid).max(0.0)),
        profit: round2(total_paid - total_cost),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{
        aggregate_agents, aggregate_records, package_profit, AccountTotals, CUSTOMER_AMOUNTS,
        PACKAGE_AMOUNTS, VENDOR_BILL_AMOUNTS,
    };

    fn totals(billed: f64, paid: f64, due: f64, advance: f64) -> AccountTotals {
        AccountTotals {
            total_billed: billed,
            total_paid: paid,
            total_due: due,
            total_advance: advance,
        }
    }

    #[test]
    fn computed_sums_beat_the_cached_snapshot() {
        let agent = json!({ "totalBilled": 500, "totalPaid": 100 });
        let packages = vec![
            json!({ "packageType": "Hajj", "totalBilled": 300, "totalPaid": 250 }),
            json!({ "packageType": "Umrah", "totalBilled": 500, "totalPaid": 100 }),
        ];
        let aggregate = aggregate_records(Some(&agent), &packages, &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.total, totals(800.0, 350.0, 450.0, 0.0));
        assert_eq!(aggregate.hajj, totals(300.0, 250.0, 50.0, 0.0));
        assert_eq!(aggregate.umrah, totals(500.0, 100.0, 400.0, 0.0));
    }

    #[test]
    fn cache_backs_an_account_with_no_children() {
        let agent = json!({ "totalBilled": 500, "totalPaid": 200, "totalAdvance": 75 });
        let aggregate = aggregate_records(Some(&agent), &[], &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.total, totals(500.0, 200.0, 300.0, 75.0));
    }

    #[test]
    fn due_is_always_derived_never_cached() {
        // A stale stored due of 9999 must be ignored.
        let agent = json!({ "totalBilled": 500, "totalPaid": 500, "totalDue": 9999 });
        let aggregate = aggregate_records(Some(&agent), &[], &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.total.total_due, 0.0);
    }

    #[test]
    fn advance_recomputes_only_on_overpayment() {
        // Overpaid: advance is derived.
        let bills = vec![json!({ "billAmount": 100, "paidAmount": 140 })];
        let aggregate = aggregate_records(None, &bills, &VENDOR_BILL_AMOUNTS);
        assert_eq!(aggregate.total.total_advance, 40.0);
        assert_eq!(aggregate.total.total_due, 0.0);

        // Not overpaid: the cached advance survives.
        let vendor = json!({ "totalAdvance": 55 });
        let bills = vec![json!({ "billAmount": 100, "paidAmount": 60 })];
        let aggregate = aggregate_records(Some(&vendor), &bills, &VENDOR_BILL_AMOUNTS);
        assert_eq!(aggregate.total.total_advance, 55.0);
        assert_eq!(aggregate.total.total_due, 40.0);
    }

    #[test]
    fn category_split_sums_to_total_for_classified_children() {
        let packages = vec![
            json!({ "packageType": "Hajj", "totalBilled": 120.40, "totalPaid": 80.10 }),
            json!({ "packageType": "Umrah", "totalBilled": 310.25, "totalPaid": 200.00 }),
            json!({ "packageType": "হজ্জ", "totalBilled": 69.35, "totalPaid": 10.50 }),
        ];
        let aggregate = aggregate_records(None, &packages, &PACKAGE_AMOUNTS);
        let split_billed = aggregate.hajj.total_billed + aggregate.umrah.total_billed;
        let split_paid = aggregate.hajj.total_paid + aggregate.umrah.total_paid;
        assert!((split_billed - aggregate.total.total_billed).abs() < 1e-9);
        assert!((split_paid - aggregate.total.total_paid).abs() < 1e-9);
    }

    #[test]
    fn unclassified_children_count_in_the_grand_total_only() {
        let packages = vec![json!({ "totalBilled": 100, "totalPaid": 40 })];
        let aggregate = aggregate_records(None, &packages, &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.total.total_billed, 100.0);
        assert_eq!(aggregate.hajj.total_billed, 0.0);
        assert_eq!(aggregate.umrah.total_billed, 0.0);
    }

    #[test]
    fn malformed_children_are_skipped_not_fatal() {
        let children: Vec<Value> = vec![
            json!("garbage"),
            json!({ "totalBilled": "not a number", "totalPaid": null }),
            json!({ "totalBilled": 50 }),
        ];
        let aggregate = aggregate_records(None, &children, &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.total, totals(50.0, 0.0, 50.0, 0.0));
    }

    #[test]
    fn empty_entity_and_children_yield_zeros() {
        let aggregate = aggregate_records(None, &[], &CUSTOMER_AMOUNTS);
        assert_eq!(aggregate.total, AccountTotals::default());
        assert_eq!(aggregate.hajj, AccountTotals::default());
        assert_eq!(aggregate.umrah, AccountTotals::default());
    }

    #[test]
    fn financial_summary_fields_take_precedence_over_legacy() {
        let packages = vec![json!({
            "financialSummary": { "totalBilled": "80,000" },
            "totalPrice": 1,
            "paymentSummary": { "totalPaid": 30_000 },
            "advancePayment": 2
        })];
        let aggregate = aggregate_records(None, &packages, &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.total.total_billed, 80000.0);
        assert_eq!(aggregate.total.total_paid, 30000.0);
    }

    #[test]
    fn legacy_haj_cache_fields_back_the_split() {
        let agent = json!({ "hajBilled": 700, "hajPaid": 300, "umrahBilled": 120 });
        let aggregate = aggregate_records(Some(&agent), &[], &PACKAGE_AMOUNTS);
        assert_eq!(aggregate.hajj, totals(700.0, 300.0, 400.0, 0.0));
        assert_eq!(aggregate.umrah, totals(120.0, 0.0, 120.0, 0.0));
    }

    #[test]
    fn agent_listing_rolls_up_per_agent() {
        let agents = vec![
            json!({ "_id": "a1", "name": "Karim Travels", "totalBilled": 999 }),
            json!({ "id": "a2", "name": "Madina Tours" }),
            json!({ "name": "no id, skipped" }),
        ];
        let packages = vec![
            json!({ "agentId": "a1", "packageType": "Hajj", "totalBilled": 400, "totalPaid": 100 }),
            json!({ "packageInfo": { "packageId": "x" }, "agent_id": "a2", "totalBilled": 50, "totalPaid": 50 }),
            json!({ "agentInfo": { "agentId": "a1" }, "packageType": "Umrah", "totalBilled": 60, "totalPaid": 90 }),
        ];
        let rollups = aggregate_agents(&agents, &packages);
        assert_eq!(rollups.len(), 2);
        assert_eq!(rollups[0].agent_id, "a1");
        assert_eq!(rollups[0].name, "Karim Travels");
        // Computed 460 wins over the cached 999.
        assert_eq!(rollups[0].totals.total.total_billed, 460.0);
        assert_eq!(rollups[0].totals.total.total_paid, 190.0);
        assert_eq!(rollups[1].agent_id, "a2");
        assert_eq!(rollups[1].totals.total.total_billed, 50.0);
    }

    #[tokio::test]
    async fn store_backed_agent_aggregation() {
        use crate::scope::BranchScope;
        use crate::store::MemoryStore;

        let mut store = MemoryStore::new();
        store.insert("agents", json!({ "_id": "a1", "totalBilled": 999 }));
        store.insert(
            "packages",
            json!({ "agentId": "a1", "packageType": "Hajj", "totalBilled": 300, "totalPaid": 120 }),
        );
        store.insert(
            "packages",
            json!({ "agentInfo": { "agentId": "a1" }, "totalBilled": 160, "totalPaid": 160 }),
        );
        store.insert("packages", json!({ "agentId": "a2", "totalBilled": 5000 }));

        let scope = BranchScope::super_admin();
        let aggregate = super::aggregate_agent(&store, &scope, "a1")
            .await
            .expect("aggregation succeeds");
        assert_eq!(aggregate.total.total_billed, 460.0);
        assert_eq!(aggregate.total.total_paid, 280.0);
        assert_eq!(aggregate.hajj.total_billed, 300.0);

        // Unknown entity id yields all-zero totals, not an error.
        let unknown = super::aggregate_agent(&store, &scope, "missing")
            .await
            .expect("aggregation succeeds");
        assert_eq!(unknown.total, AccountTotals::default());
    }

    #[test]
    fn package_profit_scales_unit_costs_by_headcount() {
        let package = json!({
            "_id": "p9",
            "packageType": "Umrah",
            "airFare": { "adult": 1000, "child": 600 },
            "visaFee": 200
        });
        let customers = vec![
            json!({ "passengerType": "adult", "totalAmount": 1500, "paidAmount": 1500 }),
            json!({ "passengerType": "adult", "totalAmount": 1500, "paidAmount": 500 }),
            json!({ "passengerType": "child", "totalAmount": 900, "paidAmount": 900 }),
        ];
        let report = package_profit(&package, &customers);
        assert_eq!(report.package_id, "p9");
        assert_eq!(report.headcounts.adult, 2);
        assert_eq!(report.headcounts.child, 1);
        assert_eq!(report.unit_costs.adult, 1200.0);
        assert_eq!(report.unit_costs.child, 800.0);
        // cost = 2×1200 + 1×800; revenue realized = 2900
        assert_eq!(report.total_cost, 3200.0);
        assert_eq!(report.total_billed, 3900.0);
        assert_eq!(report.total_paid, 2900.0);
        assert_eq!(report.total_due, 1000.0);
        assert_eq!(report.profit, -300.0);
    }
}
