//! Period aggregation engine: day-bucketed sales statistics per team,
//! business line or the whole company.

pub mod aggregation;
pub mod services;

pub use aggregation::{
    run_rate, Aggregate, BreakdownEntry, DayBucket, DeliveryFunnel, DerivedMetrics, PeriodInputs,
    PeriodStatistics, PeriodTotals, SortedBreakdowns, DAY_BUCKETS,
};
pub use services::{company_statistics, period_statistics};
