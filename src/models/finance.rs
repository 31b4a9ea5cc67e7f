//! Finance-side rows: categorized postings and production costs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Sum of operation_positions for one (category, project) pair in a period
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category_id: i64,
    pub project_id: Option<i64>,
    pub amount: Decimal,
}

/// Cost booked by production against a deal's task/order
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductionCost {
    pub deal_id: i64,
    /// Cost kind, see `pnl::categories::CostKind`
    pub kind: String,
    /// Material or wire name as entered by production
    pub name: String,
    pub amount: Decimal,
    /// Penalty withheld from the worker, zero for materials
    pub penalty: Decimal,
}
