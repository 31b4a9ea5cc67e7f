//! Versioned business rule tables.
//!
//! Every numeric or categorical rule the engine applies lives here so each band
//! and each named exception can be enumerated independently of control flow.
//! The lookup in [`compute_bonus`] is pure: no I/O, no clock.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::period::Period;

/// Identifier of the rule set below
pub const RULES_VERSION: &str = "2025-03";

// ==================== business lines ====================

/// Business line A (neon signs)
pub const PRIMARY_LINE_ID: i64 = 1;
/// Business line B
pub const SECONDARY_LINE_ID: i64 = 3;
/// Lines the company-wide views are assembled from
pub const BUSINESS_LINE_IDS: &[i64] = &[PRIMARY_LINE_ID, SECONDARY_LINE_ID];

// ==================== commission ladders ====================

/// One band of a descending threshold ladder.
///
/// A band matches when `total_sales < upper_bound`; `None` is the open top band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub upper_bound: Option<Decimal>,
    pub percentage: Decimal,
    pub flat_bonus: Decimal,
}

const fn band(upper_bound: Decimal, percentage: Decimal, flat_bonus: Decimal) -> Band {
    Band {
        upper_bound: Some(upper_bound),
        percentage,
        flat_bonus,
    }
}

const fn top_band(percentage: Decimal, flat_bonus: Decimal) -> Band {
    Band {
        upper_bound: None,
        percentage,
        flat_bonus,
    }
}

pub const PRIMARY_LADDER: &[Band] = &[
    band(dec!(400000), dec!(0.03), dec!(0)),
    band(dec!(600000), dec!(0.035), dec!(2000)),
    band(dec!(800000), dec!(0.04), dec!(4500)),
    band(dec!(1000000), dec!(0.04), dec!(7500)),
    band(dec!(1250000), dec!(0.045), dec!(10480)),
    band(dec!(1500000), dec!(0.05), dec!(13000)),
    top_band(dec!(0.05), dec!(16000)),
];

// Four bands against seven for staff; kept as observed.
pub const PRIMARY_INTERN_LADDER: &[Band] = &[
    band(dec!(250000), dec!(0.025), dec!(0)),
    band(dec!(450000), dec!(0.03), dec!(0)),
    band(dec!(700000), dec!(0.035), dec!(2000)),
    top_band(dec!(0.04), dec!(5000)),
];

pub const PRIMARY_ADD_ON_PERCENTAGE: Decimal = dec!(0.1);

pub const SECONDARY_LADDER: &[Band] = &[
    band(dec!(300000), dec!(0.03), dec!(0)),
    band(dec!(500000), dec!(0.035), dec!(0)),
    band(dec!(700000), dec!(0.04), dec!(0)),
    band(dec!(1000000), dec!(0.045), dec!(0)),
    top_band(dec!(0.05), SECONDARY_BIG_DEAL_BONUS),
];

pub const SECONDARY_INTERN_LADDER: &[Band] = &[
    band(dec!(300000), dec!(0.025), dec!(0)),
    band(dec!(500000), dec!(0.03), dec!(0)),
    band(dec!(700000), dec!(0.035), dec!(0)),
    band(dec!(1000000), dec!(0.04), dec!(0)),
    top_band(dec!(0.045), SECONDARY_BIG_DEAL_BONUS),
];

/// Flat bonus attached to the top band of business line B
pub const SECONDARY_BIG_DEAL_BONUS: Decimal = dec!(10000);

/// Team paid a fixed percentage regardless of sales
pub const OVERRIDE_TEAM_ID: i64 = 19;
pub const OVERRIDE_TEAM_PERCENTAGE: Decimal = dec!(0.07);
/// From this period on the override team drops to the reduced percentage
pub const OVERRIDE_TEAM_REDUCED_FROM: (i32, u32) = (2025, 3);
pub const OVERRIDE_TEAM_REDUCED_PERCENTAGE: Decimal = dec!(0.05);

/// Business-development role ladder: plan reached / not reached
pub const BUSINESS_DEVELOPMENT_PLAN_MET: Decimal = dec!(0.01);
pub const BUSINESS_DEVELOPMENT_PLAN_MISSED: Decimal = dec!(0.005);

/// Team lead top-up: share of the team's total sales
pub const TEAM_LEAD_TOP_UP: Decimal = dec!(0.01);
/// Ops director top-up: share of the business line's total sales
pub const OPS_DIRECTOR_TOP_UP: Decimal = dec!(0.005);

// ==================== roles ====================

/// Sales roles known to the compensation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SalesRole {
    /// "MOP"
    SalesRep,
    /// "ROP"
    TeamLead,
    /// "DO"
    OpsDirector,
    /// "MOV"
    BusinessDevelopment,
    Other,
}

impl SalesRole {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "MOP" => SalesRole::SalesRep,
            "ROP" => SalesRole::TeamLead,
            "DO" => SalesRole::OpsDirector,
            "MOV" => SalesRole::BusinessDevelopment,
            _ => SalesRole::Other,
        }
    }

    /// Roles paid a percentage of their own sales
    pub fn earns_sales_commission(&self) -> bool {
        matches!(
            self,
            SalesRole::SalesRep | SalesRole::TeamLead | SalesRole::BusinessDevelopment
        )
    }

    /// Roles competing in the top-performer rankings
    pub fn is_ranked(&self) -> bool {
        matches!(self, SalesRole::SalesRep | SalesRole::BusinessDevelopment)
    }
}

// ==================== ranking ====================

/// Teams running their own incentive scheme, never ranked
pub const RANKING_EXCLUDED_TEAMS: &[i64] = &[OVERRIDE_TEAM_ID, 22];
/// A ranking bonus requires strictly more shifts than this
pub const MIN_SHIFTS_FOR_TOP_BONUS: usize = 12;
/// Decay step for business line A: 3000 / 2000 / 1000
pub const TOP_BONUS_STEP: Decimal = dec!(1000);
pub const PRIMARY_TOP_PLACES: usize = 3;
pub const SECONDARY_TOP_PLACES: usize = 1;
pub const SECONDARY_TOP_BONUS: Decimal = dec!(2000);
/// Add-on type ranked on its own
pub const RANKED_ADD_ON_TYPE: &str = "Диммер";

// ==================== maket types ====================

pub const MAKET_DESIGNER: &str = "Дизайнерский";
pub const MAKET_FROM_TEMPLATE: &str = "Из шаблона";
pub const MAKET_PROMOTIONAL: &str = "Рекламный";
pub const MAKET_FROM_MAILING: &str = "Из рассылки";
pub const MAKET_VISUALIZER: &str = "Визуализатор";

/// Every maket type statistics pre-seeds a bucket for
pub const KNOWN_MAKET_TYPES: &[&str] = &[
    MAKET_DESIGNER,
    MAKET_FROM_TEMPLATE,
    MAKET_PROMOTIONAL,
    MAKET_FROM_MAILING,
    MAKET_VISUALIZER,
];

/// Maket types that did not need a designer
pub const NO_DESIGNER_MAKET_TYPES: &[&str] = &[
    MAKET_FROM_TEMPLATE,
    MAKET_PROMOTIONAL,
    MAKET_FROM_MAILING,
    MAKET_VISUALIZER,
];

pub fn is_no_designer_maket(maket_type: &str) -> bool {
    NO_DESIGNER_MAKET_TYPES.contains(&maket_type)
}

// ==================== P&L ====================

/// Project tag of each business line on bank-statement postings
pub const PRIMARY_PROJECT_ID: i64 = 11;
pub const SECONDARY_PROJECT_ID: i64 = 12;

/// Expense category ids of the operation-position tree
pub mod categories {
    pub const RENT: i64 = 41;
    pub const AD_SPEND: i64 = 52;
    pub const DESIGN_TEAM: i64 = 55;
    pub const DESIGN_LEAD: i64 = 56;
    pub const SALES_DIRECTOR: i64 = 58;
    pub const MARKETING_CHANNELS: i64 = 60;
    /// VK advertising; its total feeds next month's cashback
    pub const VK_ADS: i64 = 61;
    pub const ACCOUNTING: i64 = 70;
    pub const HR: i64 = 71;
    pub const BANK_FEES: i64 = 72;
    pub const ENGINEERING: i64 = 73;
    pub const INTEREST_EXPENSE: i64 = 80;
    pub const DEPOSIT_INTEREST: i64 = 81;
    pub const DIVIDENDS: i64 = 90;
}

pub const VAT_RATE: Decimal = dec!(0.05);
pub const PROFIT_TAX_RATE: Decimal = dec!(0.01);
pub const PAYROLL_TAX_RATE: Decimal = dec!(0);
/// Share of last month's VK ad spend returned as cashback
pub const VK_CASHBACK_RATE: Decimal = dec!(0.17);

/// Keyword marking acoustic wire in production cost names
pub const ACOUSTIC_WIRE_KEYWORD: &str = "акуст";

// ==================== lookup ====================

/// Rates in effect for one salesperson in one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusRates {
    pub bonus_percentage: Decimal,
    pub add_on_percentage: Decimal,
    pub flat_bonus: Decimal,
}

/// First band whose upper bound exceeds `total_sales`
pub fn match_band(ladder: &[Band], total_sales: Decimal) -> Option<&Band> {
    ladder.iter().find(|band| match band.upper_bound {
        Some(bound) => total_sales < bound,
        None => true,
    })
}

/// Commission rates for a salesperson's total sales in a period.
///
/// Unknown business lines and roles outside sales yield zero rates.
pub fn compute_bonus(
    total_sales: Decimal,
    business_line_id: i64,
    team_id: i64,
    is_intern: bool,
    role: SalesRole,
    period: Period,
) -> BonusRates {
    if !role.earns_sales_commission() {
        return BonusRates::default();
    }

    let ladder = match (business_line_id, is_intern) {
        (PRIMARY_LINE_ID, false) => PRIMARY_LADDER,
        (PRIMARY_LINE_ID, true) => PRIMARY_INTERN_LADDER,
        (SECONDARY_LINE_ID, false) => SECONDARY_LADDER,
        (SECONDARY_LINE_ID, true) => SECONDARY_INTERN_LADDER,
        _ => return BonusRates::default(),
    };

    let Some(band) = match_band(ladder, total_sales) else {
        return BonusRates::default();
    };

    let mut bonus_percentage = band.percentage;
    if team_id == OVERRIDE_TEAM_ID {
        let (year, month) = OVERRIDE_TEAM_REDUCED_FROM;
        bonus_percentage = if (period.year(), period.month()) >= (year, month) {
            OVERRIDE_TEAM_REDUCED_PERCENTAGE
        } else {
            OVERRIDE_TEAM_PERCENTAGE
        };
    }

    let add_on_percentage = if business_line_id == SECONDARY_LINE_ID {
        bonus_percentage
    } else {
        PRIMARY_ADD_ON_PERCENTAGE
    };

    BonusRates {
        bonus_percentage,
        add_on_percentage,
        flat_bonus: band.flat_bonus,
    }
}

/// Business-development percentage: depends on the plan, not on absolute sales
pub fn business_development_rate(total_sales: Decimal, plan: Decimal) -> Decimal {
    if plan > Decimal::ZERO && total_sales >= plan {
        BUSINESS_DEVELOPMENT_PLAN_MET
    } else {
        BUSINESS_DEVELOPMENT_PLAN_MISSED
    }
}
