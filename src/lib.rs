//! Sales compensation and financial aggregation engine for the sign-production CRM.
//!
//! Reads deals, add-ons, payments, deliveries, manager reports and categorized
//! bank postings through [`SalesStore`] and derives:
//! - per-salesperson commission for a period ([`commission`])
//! - day-bucketed sales statistics per team, business line or company ([`statistics`])
//! - a multi-period profit-and-loss waterfall ([`pnl`])

pub mod cache;
pub mod commission;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod period;
pub mod pnl;
pub mod rules;
pub mod statistics;
pub mod store;
pub mod telemetry;

pub use commission::round_money;
pub use config::EngineConfig;
pub use engine::{Actor, Engine};
pub use error::{EngineError, Result};
pub use period::Period;
pub use store::{MemoryStore, PgStore, SalesStore, Scope};
