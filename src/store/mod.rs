//! Persistence boundary.
//!
//! The engine only reads. Every query the aggregations need goes through
//! [`SalesStore`]; `postgres` is the production implementation and `memory`
//! backs tests and local tooling.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    AdExpense, AddOn, CategoryTotal, Deal, DealBundle, Delivery, ManagerPlan, ManagerReport,
    Participation, Payment, ProductionCost, SalaryCorrection, SalaryPay, SalesPerson, Team,
};
use crate::period::{DateRange, Period};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Which slice of the company a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Scope {
    Company,
    BusinessLine(i64),
    Team(i64),
    /// Rows owned by (or, for deals, shared with) one salesperson
    Person(i64),
}

impl Scope {
    /// (business line, team, person) filters, `None` meaning "any"
    pub fn filters(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match *self {
            Scope::Company => (None, None, None),
            Scope::BusinessLine(id) => (Some(id), None, None),
            Scope::Team(id) => (None, Some(id), None),
            Scope::Person(id) => (None, None, Some(id)),
        }
    }

    /// Whether a row tagged with this line/team falls in scope.
    /// Person scopes are resolved by the store, not here.
    pub fn covers(&self, business_line_id: i64, team_id: i64) -> bool {
        match *self {
            Scope::Company | Scope::Person(_) => true,
            Scope::BusinessLine(id) => id == business_line_id,
            Scope::Team(id) => id == team_id,
        }
    }
}

/// Read-only queries over the CRM database.
///
/// Deal-derived rows (deals, participations, add-ons, payments, deliveries)
/// never include reservations, returned deals or soft-deleted deals.
#[async_trait]
pub trait SalesStore: Send + Sync {
    async fn sales_person(&self, id: i64) -> Result<Option<SalesPerson>>;

    async fn team(&self, id: i64) -> Result<Option<Team>>;

    /// People in scope who were employed at some point during `range`
    async fn sales_people(&self, scope: Scope, range: DateRange) -> Result<Vec<SalesPerson>>;

    /// Deals sold within `range`
    async fn deals(&self, scope: Scope, range: DateRange) -> Result<Vec<Deal>>;

    /// Participant shares of deals sold within `range`
    async fn participations(
        &self,
        person_ids: &[i64],
        range: DateRange,
    ) -> Result<Vec<Participation>>;

    /// Add-ons sold within `range`
    async fn add_ons(&self, scope: Scope, range: DateRange) -> Result<Vec<AddOn>>;

    /// Payments dated within `range` on deals the person shares or sold an add-on on
    async fn payments_for_person(&self, person_id: i64, range: DateRange) -> Result<Vec<Payment>>;

    /// Deals with all participants, add-ons and payments ever recorded
    async fn deal_bundles(&self, deal_ids: &[i64]) -> Result<Vec<DealBundle>>;

    async fn manager_reports(&self, scope: Scope, range: DateRange) -> Result<Vec<ManagerReport>>;

    async fn manager_plans(&self, person_ids: &[i64], period: Period) -> Result<Vec<ManagerPlan>>;

    async fn salary_pays(&self, person_ids: &[i64], period: Period) -> Result<Vec<SalaryPay>>;

    async fn salary_corrections(
        &self,
        person_ids: &[i64],
        period: Period,
    ) -> Result<Vec<SalaryCorrection>>;

    async fn ad_expenses(&self, scope: Scope, range: DateRange) -> Result<Vec<AdExpense>>;

    /// Deliveries shipped or delivered within `range`
    async fn deliveries(&self, scope: Scope, range: DateRange) -> Result<Vec<Delivery>>;

    async fn production_costs(&self, deal_ids: &[i64]) -> Result<Vec<ProductionCost>>;

    /// Categorized postings of the period, summed per (category, project)
    async fn category_totals(&self, period: Period) -> Result<Vec<CategoryTotal>>;
}
