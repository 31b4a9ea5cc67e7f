//! Category sums and production cost kinds feeding the P&L.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::EngineError;
use crate::models::CategoryTotal;
use crate::rules::{categories, PRIMARY_LINE_ID, PRIMARY_PROJECT_ID, SECONDARY_LINE_ID, SECONDARY_PROJECT_ID};

/// A period's postings summed per (category, project), loaded once per period
#[derive(Debug, Clone, Default)]
pub struct CategoryBook {
    totals: HashMap<(i64, Option<i64>), Decimal>,
}

impl CategoryBook {
    pub fn from_totals(rows: &[CategoryTotal]) -> Self {
        let mut totals: HashMap<(i64, Option<i64>), Decimal> = HashMap::new();
        for row in rows {
            *totals.entry((row.category_id, row.project_id)).or_default() += row.amount;
        }
        Self { totals }
    }

    /// Postings of the category tagged with exactly this project
    pub fn project(&self, category_id: i64, project_id: i64) -> Decimal {
        self.totals
            .get(&(category_id, Some(project_id)))
            .copied()
            .unwrap_or_default()
    }

    /// Postings of the category under any project, untagged ones included
    pub fn any_project(&self, category_id: i64) -> Decimal {
        self.totals
            .iter()
            .filter(|((category, _), _)| *category == category_id)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Postings of the category not tagged with any of `projects`, untagged
    /// ones included
    pub fn unallocated(&self, category_id: i64, projects: &[i64]) -> Decimal {
        self.totals
            .iter()
            .filter(|((category, project), _)| {
                *category == category_id && !project.is_some_and(|p| projects.contains(&p))
            })
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Category sum for a business line, or company-wide for `None`
    pub fn item(&self, item: LineItem, project_id: Option<i64>) -> Decimal {
        match project_id {
            Some(project) => self.project(item.category_id(), project),
            None => self.any_project(item.category_id()),
        }
    }
}

/// Project tag carried by a business line's postings
pub fn project_for_line(business_line_id: i64) -> Option<i64> {
    match business_line_id {
        PRIMARY_LINE_ID => Some(PRIMARY_PROJECT_ID),
        SECONDARY_LINE_ID => Some(SECONDARY_PROJECT_ID),
        _ => None,
    }
}

/// P&L line items sourced from categorized postings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LineItem {
    Rent,
    AdSpend,
    DesignTeam,
    DesignLead,
    SalesDirector,
    MarketingChannels,
    VkAds,
    Accounting,
    Hr,
    BankFees,
    Engineering,
    InterestExpense,
    DepositInterest,
    Dividends,
}

impl LineItem {
    pub fn category_id(&self) -> i64 {
        match self {
            LineItem::Rent => categories::RENT,
            LineItem::AdSpend => categories::AD_SPEND,
            LineItem::DesignTeam => categories::DESIGN_TEAM,
            LineItem::DesignLead => categories::DESIGN_LEAD,
            LineItem::SalesDirector => categories::SALES_DIRECTOR,
            LineItem::MarketingChannels => categories::MARKETING_CHANNELS,
            LineItem::VkAds => categories::VK_ADS,
            LineItem::Accounting => categories::ACCOUNTING,
            LineItem::Hr => categories::HR,
            LineItem::BankFees => categories::BANK_FEES,
            LineItem::Engineering => categories::ENGINEERING,
            LineItem::InterestExpense => categories::INTEREST_EXPENSE,
            LineItem::DepositInterest => categories::DEPOSIT_INTEREST,
            LineItem::Dividends => categories::DIVIDENDS,
        }
    }
}

/// Kind of a production cost row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CostKind {
    Board,
    Screen,
    PowerAdapter,
    Lighting,
    /// Split into acoustic and control wire by name
    Wire,
    Acrylic,
    Film,
    Packaging,
    SpareParts,
    Assembler,
    Packer,
    LogisticsShift,
    Miller,
    Installer,
    Repair,
}

impl CostKind {
    /// Worker pay, booked net of penalties
    pub fn is_labour(&self) -> bool {
        matches!(
            self,
            CostKind::Assembler | CostKind::Packer | CostKind::LogisticsShift | CostKind::Miller
        )
    }
}

impl FromStr for CostKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "board" => CostKind::Board,
            "screen" => CostKind::Screen,
            "adapter" => CostKind::PowerAdapter,
            "lighting" => CostKind::Lighting,
            "wire" => CostKind::Wire,
            "acrylic" => CostKind::Acrylic,
            "film" => CostKind::Film,
            "packaging" => CostKind::Packaging,
            "spare_parts" => CostKind::SpareParts,
            "assembler" => CostKind::Assembler,
            "packer" => CostKind::Packer,
            "logistics" => CostKind::LogisticsShift,
            "miller" => CostKind::Miller,
            "installer" => CostKind::Installer,
            "repair" => CostKind::Repair,
            other => return Err(EngineError::Internal(format!("unknown cost kind {}", other))),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn total(category_id: i64, project_id: Option<i64>, amount: Decimal) -> CategoryTotal {
        CategoryTotal {
            category_id,
            project_id,
            amount,
        }
    }

    #[test]
    fn test_project_and_any_project_lookups() {
        let book = CategoryBook::from_totals(&[
            total(categories::AD_SPEND, Some(PRIMARY_PROJECT_ID), dec!(1000)),
            total(categories::AD_SPEND, Some(SECONDARY_PROJECT_ID), dec!(400)),
            total(categories::AD_SPEND, None, dec!(50)),
        ]);

        assert_eq!(book.project(categories::AD_SPEND, PRIMARY_PROJECT_ID), dec!(1000));
        assert_eq!(book.any_project(categories::AD_SPEND), dec!(1450));
        assert_eq!(book.item(LineItem::AdSpend, Some(SECONDARY_PROJECT_ID)), dec!(400));
        assert_eq!(book.item(LineItem::Hr, None), dec!(0));
    }

    #[test]
    fn test_unallocated_skips_line_projects() {
        let book = CategoryBook::from_totals(&[
            total(categories::RENT, Some(PRIMARY_PROJECT_ID), dec!(1000)),
            total(categories::RENT, Some(SECONDARY_PROJECT_ID), dec!(400)),
            total(categories::RENT, Some(99), dec!(70)),
            total(categories::RENT, None, dec!(30)),
        ]);
        let lines = [PRIMARY_PROJECT_ID, SECONDARY_PROJECT_ID];
        assert_eq!(book.unallocated(categories::RENT, &lines), dec!(100));
        assert_eq!(book.unallocated(categories::AD_SPEND, &lines), dec!(0));
    }

    #[test]
    fn test_project_for_line() {
        assert_eq!(project_for_line(PRIMARY_LINE_ID), Some(PRIMARY_PROJECT_ID));
        assert_eq!(project_for_line(SECONDARY_LINE_ID), Some(SECONDARY_PROJECT_ID));
        assert_eq!(project_for_line(42), None);
    }

    #[test]
    fn test_cost_kind_parse() {
        assert_eq!("wire".parse::<CostKind>().unwrap(), CostKind::Wire);
        assert!("assembler".parse::<CostKind>().unwrap().is_labour());
        assert!(!"film".parse::<CostKind>().unwrap().is_labour());
        assert!("laser".parse::<CostKind>().is_err());
    }
}
