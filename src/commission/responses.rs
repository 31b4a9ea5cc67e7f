//! Commission aggregates handed to the API layer.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::period::Period;
use crate::rules::{BonusRates, SalesRole};

use super::calculators::{ratio, SalaryBreakdown};
use super::proration::{Allocation, AllocationSummary};
use super::ranking::Ranking;

/// One salesperson's commission for a period
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPersonCommission {
    pub sales_person_id: i64,
    pub full_name: String,
    pub role: SalesRole,
    pub business_line_id: i64,
    pub team_id: i64,
    pub is_intern: bool,
    pub period: Period,
    pub deals_count: usize,
    pub deal_sales: Decimal,
    pub dops_count: usize,
    pub dop_sales: Decimal,
    pub plan: Decimal,
    pub rates: BonusRates,
    pub shifts: usize,
    pub calls: i64,
    pub same_day_deals: usize,
    pub payments: AllocationSummary,
    pub salary: SalaryBreakdown,
    pub allocations: Vec<Allocation>,
}

/// Sums over a set of salespeople, ratios recomputed from the sums
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTotals {
    pub total_sales: Decimal,
    pub plan: Decimal,
    pub sales_to_plan: Decimal,
    pub bonus: Decimal,
    pub top_bonus: Decimal,
    pub salary: Decimal,
    pub paid: Decimal,
    pub to_pay: Decimal,
}

impl CommissionTotals {
    pub fn from_members<'a>(members: impl IntoIterator<Item = &'a SalesPersonCommission>) -> Self {
        let mut totals = members.into_iter().fold(Self::default(), |mut acc, m| {
            acc.total_sales += m.salary.total_sales;
            acc.plan += m.plan;
            acc.bonus += m.salary.bonus;
            acc.top_bonus += m.salary.top_bonus;
            acc.salary += m.salary.salary;
            acc.paid += m.salary.paid;
            acc.to_pay += m.salary.to_pay;
            acc
        });
        totals.sales_to_plan = ratio(totals.total_sales, totals.plan);
        totals
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCommission {
    pub team_id: i64,
    pub title: String,
    pub business_line_id: i64,
    pub period: Period,
    pub members: Vec<SalesPersonCommission>,
    pub totals: CommissionTotals,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCommission {
    pub business_line_id: i64,
    pub period: Period,
    pub members: Vec<SalesPersonCommission>,
    pub rankings: Vec<Ranking>,
    pub totals: CommissionTotals,
}
