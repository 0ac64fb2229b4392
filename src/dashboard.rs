//! Consolidated dashboard composition.
//!
//! One call fans out over every relevant collection within the caller's
//! branch scope, runs the aggregation engine on each domain, and folds the
//! results into a single report. The record-set fetches are mutually
//! independent reads and run concurrently; a failure of any one fetch fails
//! the whole composition (carrying the collection name) — partial financial
//! totals presented as complete are worse than an explicit error.
//!
//! Revenue recognition is realized, not contracted: `totalRevenue` counts
//! amounts actually paid, never billed, so uncollected contracts do not
//! overstate income. `totalExpenses` counts only cash-out events (vendor
//! payments, loan disbursement, currency-exchange buy cost), never
//! accrued-but-unpaid liabilities.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tokio::try_join;

use crate::aggregate::{
    aggregate_records, EntityAggregate, CUSTOMER_AMOUNTS, PACKAGE_AMOUNTS, VENDOR_BILL_AMOUNTS,
};
use crate::classify::{classify, PackageCategory};
use crate::error::EngineResult;
use crate::records::{parse_record_date, record_id, resolve_path, round2, value_str};
use crate::scope::BranchScope;
use crate::store::{ChildRelation, RecordStore};

const LOAN_DIRECTION_FIELDS: &[&str] = &["loanType", "type"];
const LOAN_AMOUNT_FIELDS: &[&str] = &["loanAmount", "amount"];
const LOAN_REPAID_FIELDS: &[&str] = &["repaidAmount", "paidAmount"];
const EXCHANGE_SAR_FIELDS: &[&str] = &["sarAmount", "foreignAmount"];
const EXCHANGE_COST_FIELDS: &[&str] = &["bdtCost", "totalCost"];
const EXCHANGE_RATE_FIELDS: &[&str] = &["rate", "exchangeRate"];
const BANK_BALANCE_FIELDS: &[&str] = &["currentBalance", "balance", "amount"];

/// Inclusive date window applied to dated activity records (customers,
/// packages, bills, loans, exchanges). Undated records are kept: legacy rows
/// without a creation date must still count rather than silently vanish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_pilgrims: usize,
    pub hajj_pilgrims: usize,
    pub umrah_pilgrims: usize,
    pub total_agents: usize,
    pub total_vendors: usize,
    pub total_packages: usize,
    pub total_loans: usize,
    pub bank_accounts: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrandTotals {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_due: f64,
    pub total_assets: f64,
    pub net_profit: f64,
}

/// Reconciled totals for one domain, with its record count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTotals {
    pub count: usize,
    #[serde(flatten)]
    pub totals: EntityAggregate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTotals {
    pub count: usize,
    pub total_given: f64,
    pub total_taken: f64,
    pub outstanding_given: f64,
    pub outstanding_taken: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTotals {
    pub count: usize,
    pub sar_purchased: f64,
    pub local_cost: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTotals {
    pub count: usize,
    pub total_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub overview: Overview,
    pub grand_totals: GrandTotals,
    pub pilgrims: DomainTotals,
    pub agents: DomainTotals,
    pub vendors: DomainTotals,
    pub loans: LoanTotals,
    pub exchange: ExchangeTotals,
    pub banks: BankTotals,
    /// Branch selector, populated only for super-admin callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<BranchOption>>,
}

/// Compose the consolidated dashboard for one caller.
pub async fn compose_dashboard<S: RecordStore>(
    store: &S,
    scope: &BranchScope,
    range: Option<DateRange>,
) -> EngineResult<DashboardReport> {
    let (mut customers, agents, vendors, mut packages, mut vendor_bills, mut loans, mut exchanges, banks) = try_join!(
        store.find("customers", scope),
        store.find("agents", scope),
        store.find("vendors", scope),
        store.find("packages", scope),
        store.find("vendor_bills", scope),
        store.find("loans", scope),
        store.find("money_exchanges", scope),
        store.find("bank_accounts", scope),
    )?;

    if let Some(range) = range {
        let keep = |record: &Value| match parse_record_date(record) {
            Some(date) => range.contains(date),
            None => true,
        };
        customers.retain(keep);
        packages.retain(keep);
        vendor_bills.retain(keep);
        loans.retain(keep);
        exchanges.retain(keep);
    }

    let mut hajj_pilgrims = 0;
    let mut umrah_pilgrims = 0;
    for customer in &customers {
        match classify(customer) {
            PackageCategory::Hajj => hajj_pilgrims += 1,
            PackageCategory::Umrah => umrah_pilgrims += 1,
            PackageCategory::Other => {}
        }
    }

    let pilgrims = DomainTotals {
        count: customers.len(),
        totals: aggregate_records(None, &customers, &CUSTOMER_AMOUNTS).rounded(),
    };

    let mut agent_totals = EntityAggregate::default();
    for agent in &agents {
        let agent_id = record_id(agent);
        if agent_id.is_empty() {
            continue;
        }
        let children = packages
            .iter()
            .filter(|package| ChildRelation::Agent.matches(package, &agent_id));
        agent_totals.accumulate(&aggregate_records(Some(agent), children, &PACKAGE_AMOUNTS));
    }
    let agents_domain = DomainTotals {
        count: agents.len(),
        totals: agent_totals.rounded(),
    };

    let mut vendor_totals = EntityAggregate::default();
    for vendor in &vendors {
        let vendor_id = record_id(vendor);
        if vendor_id.is_empty() {
            continue;
        }
        let children = vendor_bills
            .iter()
            .filter(|bill| ChildRelation::Vendor.matches(bill, &vendor_id));
        vendor_totals.accumulate(&aggregate_records(
            Some(vendor),
            children,
            &VENDOR_BILL_AMOUNTS,
        ));
    }
    let vendors_domain = DomainTotals {
        count: vendors.len(),
        totals: vendor_totals.rounded(),
    };

    let mut loan_totals = LoanTotals {
        count: loans.len(),
        ..LoanTotals::default()
    };
    for loan in &loans {
        let amount = resolve_path(loan, LOAN_AMOUNT_FIELDS);
        let repaid = resolve_path(loan, LOAN_REPAID_FIELDS);
        let outstanding = (amount - repaid).max(0.0);
        let direction = LOAN_DIRECTION_FIELDS
            .iter()
            .map(|field| value_str(loan, field))
            .find(|tag| !tag.is_empty())
            .unwrap_or_default()
            .to_ascii_lowercase();
        // Unlabeled loans are disbursements: the books predate the
        // loanType field and only recorded money lent out.
        if direction == "taken" {
            loan_totals.total_taken += amount;
            loan_totals.outstanding_taken += outstanding;
        } else {
            loan_totals.total_given += amount;
            loan_totals.outstanding_given += outstanding;
        }
    }
    loan_totals.total_given = round2(loan_totals.total_given);
    loan_totals.total_taken = round2(loan_totals.total_taken);
    loan_totals.outstanding_given = round2(loan_totals.outstanding_given);
    loan_totals.outstanding_taken = round2(loan_totals.outstanding_taken);

    let mut exchange = ExchangeTotals {
        count: exchanges.len(),
        ..ExchangeTotals::default()
    };
    for record in &exchanges {
        let sar = resolve_path(record, EXCHANGE_SAR_FIELDS);
        let mut cost = resolve_path(record, EXCHANGE_COST_FIELDS);
        if cost == 0.0 {
            cost = sar * resolve_path(record, EXCHANGE_RATE_FIELDS);
        }
        exchange.sar_purchased += sar;
        exchange.local_cost += cost;
    }
    exchange.sar_purchased = round2(exchange.sar_purchased);
    exchange.local_cost = round2(exchange.local_cost);

    let banks_domain = BankTotals {
        count: banks.len(),
        total_balance: round2(
            banks
                .iter()
                .map(|account| resolve_path(account, BANK_BALANCE_FIELDS))
                .sum(),
        ),
    };

    let total_revenue = pilgrims.totals.total.total_paid + agents_domain.totals.total.total_paid;
    let total_expenses =
        vendors_domain.totals.total.total_paid + loan_totals.total_given + exchange.local_cost;
    let total_due = pilgrims.totals.total.total_due + agents_domain.totals.total.total_due;
    // Assets = cash at bank + receivables still due in.
    let total_assets = banks_domain.total_balance + total_due;

    let grand_totals = GrandTotals {
        total_revenue: round2(total_revenue),
        total_expenses: round2(total_expenses),
        total_due: round2(total_due),
        total_assets: round2(total_assets),
        net_profit: round2(total_revenue - total_expenses),
    };

    let branches = if scope.is_super_admin {
        let rows = store.find("branches", scope).await?;
        Some(
            rows.iter()
                .map(|branch| BranchOption {
                    id: record_id(branch),
                    name: value_str(branch, "name"),
                })
                .collect(),
        )
    } else {
        None
    };

    let report = DashboardReport {
        overview: Overview {
            total_pilgrims: customers.len(),
            hajj_pilgrims,
            umrah_pilgrims,
            total_agents: agents.len(),
            total_vendors: vendors.len(),
            total_packages: packages.len(),
            total_loans: loans.len(),
            bank_accounts: banks.len(),
        },
        grand_totals,
        pilgrims,
        agents: agents_domain,
        vendors: vendors_domain,
        loans: loan_totals,
        exchange,
        banks: banks_domain,
        branches,
    };

    tracing::info!(
        pilgrims = report.overview.total_pilgrims,
        agents = report.overview.total_agents,
        vendors = report.overview.total_vendors,
        net_profit = report.grand_totals.net_profit,
        "dashboard composed"
    );

    Ok(report)
}
