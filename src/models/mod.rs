//! Entity rows read from the relational store

pub mod finance;
pub mod sales;

pub use finance::{CategoryTotal, ProductionCost};
pub use sales::{
    AdExpense, AddOn, Deal, DealBundle, DealParticipant, Delivery, ManagerPlan, ManagerReport,
    Participation, Payment, SalaryCorrection, SalaryPay, SalesPerson, Team,
};
