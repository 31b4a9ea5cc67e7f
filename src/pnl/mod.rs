//! Profit-and-loss waterfall per business line and combined.

pub mod categories;
pub mod services;
pub mod waterfall;

pub use categories::{CategoryBook, CostKind, LineItem};
pub use services::{pnl_statement, pnl_trailing};
pub use waterfall::{
    build_line, build_statement, shipped_deals, CogsBreakdown, CommercialCosts, LineStatement,
    OperatingExpenses, PnlStatement, ShippedDeals, UnallocatedCosts,
};
