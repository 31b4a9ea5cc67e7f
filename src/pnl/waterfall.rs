//! P&L waterfall: revenue down to net profit, per business line and combined.
//!
//! Pure arithmetic over already loaded rows. Every subtotal is exact to the
//! cent: line items are rounded once, subtotals are plain sums and differences.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::commission::calculators::{ratio, round_money};
use crate::models::{Delivery, ProductionCost};
use crate::period::Period;
use crate::rules::{
    ACOUSTIC_WIRE_KEYWORD, BUSINESS_LINE_IDS, PAYROLL_TAX_RATE, PROFIT_TAX_RATE, VAT_RATE,
    VK_CASHBACK_RATE,
};

use super::categories::{project_for_line, CategoryBook, CostKind, LineItem};

/// Deals shipped in a period, one (latest) delivery per deal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippedDeals {
    pub deal_ids: Vec<i64>,
    /// Deal price plus add-ons of every shipped deal
    pub revenue: Decimal,
    /// Carrier cost of free-type shipments
    pub free_delivery: Decimal,
}

/// Collapse the period's deliveries to the latest shipped one per deal
pub fn shipped_deals(deliveries: &[Delivery], period: Period) -> ShippedDeals {
    let mut latest: HashMap<i64, &Delivery> = HashMap::new();
    for delivery in deliveries {
        let Some(ship_date) = delivery.ship_date else {
            continue;
        };
        if !delivery.is_shipped() || !period.contains(ship_date) {
            continue;
        }
        latest
            .entry(delivery.deal_id)
            .and_modify(|kept| {
                if (ship_date, delivery.id) > (kept.ship_date.unwrap_or(ship_date), kept.id) {
                    *kept = delivery;
                }
            })
            .or_insert(delivery);
    }

    let mut kept: Vec<&Delivery> = latest.into_values().collect();
    kept.sort_by_key(|d| d.deal_id);

    ShippedDeals {
        deal_ids: kept.iter().map(|d| d.deal_id).collect(),
        revenue: kept.iter().map(|d| d.order_value()).sum(),
        free_delivery: kept
            .iter()
            .filter(|d| d.is_free())
            .map(|d| d.price)
            .sum(),
    }
}

/// Cost of goods sold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CogsBreakdown {
    pub board: Decimal,
    pub screen: Decimal,
    pub power_adapter: Decimal,
    pub lighting: Decimal,
    pub acoustic_wire: Decimal,
    pub control_wire: Decimal,
    pub acrylic: Decimal,
    pub film: Decimal,
    pub packaging: Decimal,
    pub spare_parts: Decimal,
    pub assembler: Decimal,
    pub packer: Decimal,
    pub logistics_shift: Decimal,
    pub miller: Decimal,
    pub installers: Decimal,
    pub repairs: Decimal,
    pub free_delivery: Decimal,
    pub rent: Decimal,
    pub total: Decimal,
}

impl CogsBreakdown {
    /// `costs` must already be limited to the shipped deals
    pub fn from_costs(costs: &[ProductionCost], free_delivery: Decimal, rent: Decimal) -> Self {
        let mut cogs = Self {
            free_delivery,
            rent,
            ..Self::default()
        };

        for cost in costs {
            let kind = match cost.kind.parse::<CostKind>() {
                Ok(kind) => kind,
                Err(err) => {
                    warn!(deal_id = cost.deal_id, error = %err, "Skipping production cost");
                    continue;
                }
            };
            let amount = if kind.is_labour() {
                cost.amount - cost.penalty
            } else {
                cost.amount
            };
            let slot = match kind {
                CostKind::Board => &mut cogs.board,
                CostKind::Screen => &mut cogs.screen,
                CostKind::PowerAdapter => &mut cogs.power_adapter,
                CostKind::Lighting => &mut cogs.lighting,
                CostKind::Wire if is_acoustic_wire(&cost.name) => &mut cogs.acoustic_wire,
                CostKind::Wire => &mut cogs.control_wire,
                CostKind::Acrylic => &mut cogs.acrylic,
                CostKind::Film => &mut cogs.film,
                CostKind::Packaging => &mut cogs.packaging,
                CostKind::SpareParts => &mut cogs.spare_parts,
                CostKind::Assembler => &mut cogs.assembler,
                CostKind::Packer => &mut cogs.packer,
                CostKind::LogisticsShift => &mut cogs.logistics_shift,
                CostKind::Miller => &mut cogs.miller,
                CostKind::Installer => &mut cogs.installers,
                CostKind::Repair => &mut cogs.repairs,
            };
            *slot += amount;
        }

        cogs.total = cogs.board
            + cogs.screen
            + cogs.power_adapter
            + cogs.lighting
            + cogs.acoustic_wire
            + cogs.control_wire
            + cogs.acrylic
            + cogs.film
            + cogs.packaging
            + cogs.spare_parts
            + cogs.assembler
            + cogs.packer
            + cogs.logistics_shift
            + cogs.miller
            + cogs.installers
            + cogs.repairs
            + cogs.free_delivery
            + cogs.rent;
        cogs
    }
}

fn is_acoustic_wire(name: &str) -> bool {
    name.to_lowercase().contains(ACOUSTIC_WIRE_KEYWORD)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialCosts {
    pub ad_spend: Decimal,
    pub vk_ads: Decimal,
    pub design_team: Decimal,
    pub design_lead: Decimal,
    pub sales_director: Decimal,
    /// Salaries of the line's salespeople for the period
    pub sales_compensation: Decimal,
    pub marketing_channels: Decimal,
    pub total: Decimal,
}

/// One business line down to marginal income
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatement {
    pub business_line_id: i64,
    pub revenue: Decimal,
    pub cogs: CogsBreakdown,
    pub gross_profit: Decimal,
    pub gross_margin: Decimal,
    pub vat: Decimal,
    pub commercial: CommercialCosts,
    pub marginal_income: Decimal,
    pub marginal_margin: Decimal,
}

/// Everything one business line's statement is built from
#[derive(Debug, Clone, Default)]
pub struct LineInputs {
    pub business_line_id: i64,
    pub project_id: Option<i64>,
    pub shipped: ShippedDeals,
    pub costs: Vec<ProductionCost>,
    pub sales_compensation: Decimal,
}

pub fn build_line(inputs: &LineInputs, book: &CategoryBook) -> LineStatement {
    let project = inputs.project_id;
    let revenue = inputs.shipped.revenue;

    let cogs = CogsBreakdown::from_costs(
        &inputs.costs,
        inputs.shipped.free_delivery,
        book.item(LineItem::Rent, project),
    );
    let gross_profit = revenue - cogs.total;
    let vat = round_money(revenue * VAT_RATE, 2);

    let mut commercial = CommercialCosts {
        ad_spend: book.item(LineItem::AdSpend, project),
        vk_ads: book.item(LineItem::VkAds, project),
        design_team: book.item(LineItem::DesignTeam, project),
        design_lead: book.item(LineItem::DesignLead, project),
        sales_director: book.item(LineItem::SalesDirector, project),
        sales_compensation: inputs.sales_compensation,
        marketing_channels: book.item(LineItem::MarketingChannels, project),
        total: Decimal::ZERO,
    };
    commercial.total = commercial.ad_spend
        + commercial.vk_ads
        + commercial.design_team
        + commercial.design_lead
        + commercial.sales_director
        + commercial.sales_compensation
        + commercial.marketing_channels;

    let marginal_income = gross_profit - vat - commercial.total;

    LineStatement {
        business_line_id: inputs.business_line_id,
        revenue,
        gross_margin: ratio(gross_profit, revenue),
        marginal_margin: ratio(marginal_income, revenue),
        cogs,
        gross_profit,
        vat,
        commercial,
        marginal_income,
    }
}

/// Overheads carried once for the whole company
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingExpenses {
    pub accounting: Decimal,
    pub hr: Decimal,
    pub bank_fees: Decimal,
    pub engineering: Decimal,
    pub total: Decimal,
}

impl OperatingExpenses {
    pub fn from_book(book: &CategoryBook) -> Self {
        let mut opex = Self {
            accounting: book.item(LineItem::Accounting, None),
            hr: book.item(LineItem::Hr, None),
            bank_fees: book.item(LineItem::BankFees, None),
            engineering: book.item(LineItem::Engineering, None),
            total: Decimal::ZERO,
        };
        opex.total = opex.accounting + opex.hr + opex.bank_fees + opex.engineering;
        opex
    }
}

/// Per-line categories posted without a business-line project, booked once
/// for the company next to operating expenses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnallocatedCosts {
    pub rent: Decimal,
    pub ad_spend: Decimal,
    pub vk_ads: Decimal,
    pub design_team: Decimal,
    pub design_lead: Decimal,
    pub sales_director: Decimal,
    pub marketing_channels: Decimal,
    pub total: Decimal,
}

impl UnallocatedCosts {
    pub fn from_book(book: &CategoryBook) -> Self {
        let projects: Vec<i64> = BUSINESS_LINE_IDS
            .iter()
            .filter_map(|&id| project_for_line(id))
            .collect();
        let amount = |item: LineItem| book.unallocated(item.category_id(), &projects);

        let mut costs = Self {
            rent: amount(LineItem::Rent),
            ad_spend: amount(LineItem::AdSpend),
            vk_ads: amount(LineItem::VkAds),
            design_team: amount(LineItem::DesignTeam),
            design_lead: amount(LineItem::DesignLead),
            sales_director: amount(LineItem::SalesDirector),
            marketing_channels: amount(LineItem::MarketingChannels),
            total: Decimal::ZERO,
        };
        costs.total = costs.rent
            + costs.ad_spend
            + costs.vk_ads
            + costs.design_team
            + costs.design_lead
            + costs.sales_director
            + costs.marketing_channels;
        costs
    }
}

/// Signed statement for a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlStatement {
    pub period: Period,
    pub lines: Vec<LineStatement>,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub vat: Decimal,
    pub marginal_income: Decimal,
    pub opex: OperatingExpenses,
    pub unallocated: UnallocatedCosts,
    pub ebitda: Decimal,
    pub ebitda_margin: Decimal,
    pub interest_expense: Decimal,
    pub deposit_interest: Decimal,
    /// Rebate on the previous period's VK ad spend
    pub vk_cashback: Decimal,
    pub profit_before_tax: Decimal,
    pub taxable_base: Decimal,
    pub taxes_profit: Decimal,
    pub taxes_payroll: Decimal,
    pub tax_load: Decimal,
    pub net_profit: Decimal,
    /// Memo only, not subtracted from net profit
    pub dividends: Decimal,
}

/// Combine line statements into the company statement.
///
/// `previous` is the category book of the period before `period`; only the VK
/// cashback reads it.
pub fn build_statement(
    period: Period,
    lines: Vec<LineStatement>,
    book: &CategoryBook,
    previous: &CategoryBook,
) -> PnlStatement {
    let revenue: Decimal = lines.iter().map(|l| l.revenue).sum();
    let cogs: Decimal = lines.iter().map(|l| l.cogs.total).sum();
    let gross_profit: Decimal = lines.iter().map(|l| l.gross_profit).sum();
    let vat: Decimal = lines.iter().map(|l| l.vat).sum();
    let marginal_income: Decimal = lines.iter().map(|l| l.marginal_income).sum();

    let opex = OperatingExpenses::from_book(book);
    let unallocated = UnallocatedCosts::from_book(book);
    let ebitda = marginal_income - opex.total - unallocated.total;

    let interest_expense = book.item(LineItem::InterestExpense, None);
    let deposit_interest = book.item(LineItem::DepositInterest, None);
    let vk_cashback = round_money(previous.item(LineItem::VkAds, None) * VK_CASHBACK_RATE, 2);
    let profit_before_tax = ebitda - interest_expense + deposit_interest + vk_cashback;

    let taxable_base = revenue - vat;
    let taxes_profit = round_money(taxable_base * PROFIT_TAX_RATE, 2);
    let taxes_payroll = round_money(taxable_base * PAYROLL_TAX_RATE, 2);
    let net_profit = profit_before_tax - taxes_payroll - taxes_profit;

    PnlStatement {
        period,
        lines,
        revenue,
        cogs,
        gross_profit,
        vat,
        marginal_income,
        ebitda,
        ebitda_margin: ratio(ebitda, revenue),
        opex,
        unallocated,
        interest_expense,
        deposit_interest,
        vk_cashback,
        profit_before_tax,
        taxable_base,
        taxes_profit,
        taxes_payroll,
        tax_load: ratio(taxes_profit + taxes_payroll, taxable_base),
        net_profit,
        dividends: book.item(LineItem::Dividends, None),
    }
}
