//! Sales compensation engine.
//!
//! Turns deal, add-on and payment rows into per-salesperson commission for a
//! calendar period and ranks salespeople for top-performer bonuses.

pub mod calculators;
pub mod proration;
pub mod ranking;
pub mod responses;
pub mod services;

// Re-export commonly used items
pub use calculators::{compose_salary, round_money, SalaryBreakdown, SalaryInputs};
pub use proration::{allocate, split_payment, Allocation, AllocationSummary, RateBook, TargetType};
pub use ranking::{rank_cohort, CohortMember, RankingMetric, TopResult};
pub use responses::{CommissionTotals, LineCommission, SalesPersonCommission, TeamCommission};
pub use services::{business_line_commission, person_commission, team_commission};
