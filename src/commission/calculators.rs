//! Core commission calculation functions.
//!
//! Pure functions for compensation math - no database access.

use rust_decimal::prelude::*;
use serde::Serialize;

use crate::rules::BonusRates;

use super::proration::AllocationSummary;

/// Round to specified decimal places, halves away from zero.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use crm_finance::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(3));
/// assert_eq!(round_money(dec!(-2.5), 0), dec!(-3));
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Guard-then-divide: a zero denominator yields zero
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Dimensionless ratio rounded to 4 places
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    round_money(safe_div(numerator, denominator), 4)
}

/// Monetary ratio (average bill, cost per lead) rounded to 2 places
pub fn money_ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    round_money(safe_div(numerator, denominator), 2)
}

/// Everything salary composition needs for one person and period
#[derive(Debug, Clone, Default)]
pub struct SalaryInputs {
    pub deal_sales: Decimal,
    pub dop_sales: Decimal,
    pub plan: Decimal,
    pub rates: BonusRates,
    pub payments: AllocationSummary,
    pub shift_bonus: Decimal,
    pub role_top_up: Decimal,
    pub top_bonus: Decimal,
    pub corrections: Decimal,
    pub paid: Decimal,
}

/// Components of a salesperson's pay for a period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryBreakdown {
    pub total_sales: Decimal,
    pub sales_to_plan: Decimal,
    pub remainder: Decimal,
    pub bonus: Decimal,
    pub flat_bonus: Decimal,
    pub shift_bonus: Decimal,
    pub role_top_up: Decimal,
    pub top_bonus: Decimal,
    pub corrections: Decimal,
    pub salary: Decimal,
    pub paid: Decimal,
    pub to_pay: Decimal,
}

/// Compose total salary from its parts.
///
/// The percentage bonus comes from payments received in the period (see
/// `proration`), the flat bonus from the band the period's own sales reached.
pub fn compose_salary(inputs: &SalaryInputs) -> SalaryBreakdown {
    let total_sales = inputs.deal_sales + inputs.dop_sales;
    let bonus = inputs.payments.total_bonus();

    let salary = round_money(
        bonus
            + inputs.rates.flat_bonus
            + inputs.shift_bonus
            + inputs.role_top_up
            + inputs.top_bonus
            + inputs.corrections,
        2,
    );

    SalaryBreakdown {
        total_sales,
        sales_to_plan: ratio(total_sales, inputs.plan),
        remainder: (inputs.plan - total_sales).max(Decimal::ZERO),
        bonus,
        flat_bonus: inputs.rates.flat_bonus,
        shift_bonus: inputs.shift_bonus,
        role_top_up: inputs.role_top_up,
        top_bonus: inputs.top_bonus,
        corrections: inputs.corrections,
        salary,
        paid: inputs.paid,
        to_pay: salary - inputs.paid,
    }
}
