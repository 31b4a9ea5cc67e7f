//! Period proration allocator.
//!
//! Attributes every payment received in a period to the obligations it
//! covers: first the deal balance, then (once the deal is fully paid) the
//! add-ons sold against it. Amounts land in the period the money arrived,
//! while the commission percentage stays the one in effect when the deal or
//! add-on was sold.

use std::collections::{BTreeSet, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::models::{DealBundle, Payment};
use crate::period::Period;
use crate::rules::BonusRates;

use super::calculators::{round_money, safe_div};

/// What part of a deal a payment share was attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    Deal,
    AddOn,
}

/// One person's share of one period's payments on a deal or add-on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub target_type: TargetType,
    /// Deal id for deal shares, add-on id for add-on shares
    pub target_id: i64,
    pub deal_id: i64,
    pub sales_person_id: i64,
    pub paying_period: Period,
    pub sale_period: Period,
    pub allocated_amount: Decimal,
    /// Percentage in effect in `sale_period`
    pub percentage: Decimal,
}

impl Allocation {
    /// Unrounded commission earned on this share
    pub fn bonus(&self) -> Decimal {
        self.allocated_amount * self.percentage
    }

    /// Paid for something sold in the paying period itself
    pub fn is_current_sale(&self) -> bool {
        self.sale_period == self.paying_period
    }
}

/// Split of a deal's current-period payments between deal and add-on balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DealSplit {
    pub deal_portion: Decimal,
    pub add_on_portion: Decimal,
}

/// Split `current` payments given what had been paid before the period.
///
/// Once the deal price is covered, the excess goes to add-ons; if it was
/// covered before this period, everything paid now does.
pub fn split_payment(deal_price: Decimal, prior: Decimal, current: Decimal) -> DealSplit {
    if deal_price < prior + current {
        let add_on_portion = if deal_price < prior {
            current
        } else {
            prior + current - deal_price
        };
        DealSplit {
            deal_portion: (deal_price - prior).max(Decimal::ZERO),
            add_on_portion,
        }
    } else {
        DealSplit {
            deal_portion: current,
            add_on_portion: Decimal::ZERO,
        }
    }
}

/// Percentage lookup by (salesperson, sale period, target)
pub trait RateLookup {
    fn percentage(&self, sales_person_id: i64, sale_period: Period, target: TargetType) -> Decimal;
}

impl<F> RateLookup for F
where
    F: Fn(i64, Period, TargetType) -> Decimal,
{
    fn percentage(&self, sales_person_id: i64, sale_period: Period, target: TargetType) -> Decimal {
        self(sales_person_id, sale_period, target)
    }
}

/// Rates memoised per (salesperson, sale period). Missing keys read as zero.
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    rates: HashMap<(i64, Period), BonusRates>,
}

impl RateBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sales_person_id: i64, period: Period, rates: BonusRates) {
        self.rates.insert((sales_person_id, period), rates);
    }

    pub fn contains(&self, sales_person_id: i64, period: Period) -> bool {
        self.rates.contains_key(&(sales_person_id, period))
    }

    pub fn get(&self, sales_person_id: i64, period: Period) -> BonusRates {
        self.rates
            .get(&(sales_person_id, period))
            .copied()
            .unwrap_or_default()
    }

    /// (salesperson, sale period) pairs an allocation over `bundles` may look up
    pub fn required_keys(bundles: &[DealBundle], person: Option<i64>) -> BTreeSet<(i64, Period)> {
        let wanted = |id: i64| person.map_or(true, |p| p == id);
        let mut keys = BTreeSet::new();
        for bundle in bundles {
            let deal_period = Period::of(bundle.deal.sale_date);
            for participant in bundle.participants.iter().filter(|p| wanted(p.sales_person_id)) {
                keys.insert((participant.sales_person_id, deal_period));
            }
            for add_on in bundle.add_ons.iter().filter(|o| wanted(o.sales_person_id)) {
                keys.insert((add_on.sales_person_id, Period::of(add_on.sale_date)));
            }
        }
        keys
    }
}

impl RateLookup for RateBook {
    fn percentage(&self, sales_person_id: i64, sale_period: Period, target: TargetType) -> Decimal {
        let rates = self.get(sales_person_id, sale_period);
        match target {
            TargetType::Deal => rates.bonus_percentage,
            TargetType::AddOn => rates.add_on_percentage,
        }
    }
}

/// Allocate the period's payments.
///
/// `payments` are the payments dated inside `period`. Each deal is processed
/// once, on its earliest payment in `(date, id)` order; later payments on the
/// same deal are already included in the period sum. With `person` set only
/// that person's shares are returned.
pub fn allocate(
    bundles: &[DealBundle],
    payments: &[Payment],
    period: Period,
    person: Option<i64>,
    rates: &impl RateLookup,
) -> Vec<Allocation> {
    let by_deal: HashMap<i64, &DealBundle> = bundles.iter().map(|b| (b.deal.id, b)).collect();

    let mut ordered: Vec<&Payment> = payments.iter().filter(|p| period.contains(p.date)).collect();
    ordered.sort_by_key(|p| (p.date, p.id));

    let mut seen: HashSet<i64> = HashSet::new();
    let mut allocations = Vec::new();

    for payment in ordered {
        if !seen.insert(payment.deal_id) {
            continue;
        }
        let Some(bundle) = by_deal.get(&payment.deal_id) else {
            warn!(deal_id = payment.deal_id, "Payment references a deal outside the bundle set");
            continue;
        };
        allocate_deal(bundle, period, person, rates, &mut allocations);
    }

    allocations
}

fn allocate_deal(
    bundle: &DealBundle,
    period: Period,
    person: Option<i64>,
    rates: &impl RateLookup,
    out: &mut Vec<Allocation>,
) {
    let deal = &bundle.deal;
    let range = period.range();

    let prior: Decimal = bundle
        .payments
        .iter()
        .filter(|p| p.date < range.start)
        .map(|p| p.price)
        .sum();
    let current: Decimal = bundle
        .payments
        .iter()
        .filter(|p| range.contains(p.date))
        .map(|p| p.price)
        .sum();

    let split = split_payment(deal.price, prior, current);

    let shares: Decimal = bundle.participants.iter().map(|p| p.price).sum();
    if shares > deal.price {
        warn!(
            deal_id = deal.id,
            %shares,
            deal_price = %deal.price,
            "Participant shares exceed the deal price"
        );
    }

    if !split.deal_portion.is_zero() {
        let sale_period = Period::of(deal.sale_date);
        for participant in &bundle.participants {
            if person.is_some_and(|id| id != participant.sales_person_id) {
                continue;
            }
            let amount = round_money(
                safe_div(split.deal_portion * participant.price, deal.price),
                2,
            );
            out.push(Allocation {
                target_type: TargetType::Deal,
                target_id: deal.id,
                deal_id: deal.id,
                sales_person_id: participant.sales_person_id,
                paying_period: period,
                sale_period,
                allocated_amount: amount,
                percentage: rates.percentage(
                    participant.sales_person_id,
                    sale_period,
                    TargetType::Deal,
                ),
            });
        }
    }

    if !split.add_on_portion.is_zero() {
        let eligible: Vec<_> = bundle
            .add_ons
            .iter()
            .filter(|o| o.sale_date < range.end)
            .collect();
        let add_ons_total: Decimal = eligible.iter().map(|o| o.price).sum();
        if eligible.is_empty() {
            warn!(
                deal_id = deal.id,
                overpaid = %split.add_on_portion,
                "Payment exceeds the deal price with no add-on to attribute it to"
            );
        }
        for add_on in eligible {
            if person.is_some_and(|id| id != add_on.sales_person_id) {
                continue;
            }
            let sale_period = Period::of(add_on.sale_date);
            let amount = round_money(
                safe_div(split.add_on_portion * add_on.price, add_ons_total),
                2,
            );
            out.push(Allocation {
                target_type: TargetType::AddOn,
                target_id: add_on.id,
                deal_id: deal.id,
                sales_person_id: add_on.sales_person_id,
                paying_period: period,
                sale_period,
                allocated_amount: amount,
                percentage: rates.percentage(add_on.sales_person_id, sale_period, TargetType::AddOn),
            });
        }
    }
}

/// Allocations of every payment period of a deal, oldest period first
pub fn allocate_history(bundle: &DealBundle, rates: &impl RateLookup) -> Vec<Allocation> {
    let mut periods: Vec<Period> = bundle.payments.iter().map(|p| Period::of(p.date)).collect();
    periods.sort();
    periods.dedup();

    periods
        .into_iter()
        .flat_map(|period| {
            allocate(
                std::slice::from_ref(bundle),
                &bundle.payments,
                period,
                None,
                rates,
            )
        })
        .collect()
}

/// Per-period totals of one person's allocations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    /// Paid in the period for deals sold in the period
    pub deals_pays: Decimal,
    pub dops_pays: Decimal,
    /// Paid in the period for deals sold earlier
    pub prev_periods_deals_pays: Decimal,
    pub prev_periods_dops_pays: Decimal,
    pub deals_bonus: Decimal,
    pub dops_bonus: Decimal,
    pub prev_periods_deals_bonus: Decimal,
    pub prev_periods_dops_bonus: Decimal,
}

impl AllocationSummary {
    pub fn from_allocations(allocations: &[Allocation]) -> Self {
        let mut summary = Self::default();
        for allocation in allocations {
            let bonus = allocation.bonus();
            match (allocation.target_type, allocation.is_current_sale()) {
                (TargetType::Deal, true) => {
                    summary.deals_pays += allocation.allocated_amount;
                    summary.deals_bonus += bonus;
                }
                (TargetType::AddOn, true) => {
                    summary.dops_pays += allocation.allocated_amount;
                    summary.dops_bonus += bonus;
                }
                (TargetType::Deal, false) => {
                    summary.prev_periods_deals_pays += allocation.allocated_amount;
                    summary.prev_periods_deals_bonus += bonus;
                }
                (TargetType::AddOn, false) => {
                    summary.prev_periods_dops_pays += allocation.allocated_amount;
                    summary.prev_periods_dops_bonus += bonus;
                }
            }
        }
        summary
    }

    /// Percentage bonus over all allocations, rounded once at the end
    pub fn total_bonus(&self) -> Decimal {
        round_money(
            self.deals_bonus
                + self.dops_bonus
                + self.prev_periods_deals_bonus
                + self.prev_periods_dops_bonus,
            2,
        )
    }

    pub fn total_pays(&self) -> Decimal {
        self.deals_pays + self.dops_pays + self.prev_periods_deals_pays + self.prev_periods_dops_pays
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddOn, Deal, DealParticipant};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn deal(id: i64, price: Decimal, sale_date: NaiveDate) -> Deal {
        Deal {
            id,
            title: format!("Сделка {}", id),
            price,
            sale_date,
            status: "Создана".to_string(),
            reservation: false,
            deleted_at: None,
            business_line_id: 1,
            team_id: 2,
            maket_type: "Дизайнерский".to_string(),
            source: "ВК".to_string(),
            ad_tag: String::new(),
            first_contact_date: None,
        }
    }

    fn participant(deal_id: i64, person: i64, price: Decimal) -> DealParticipant {
        DealParticipant {
            deal_id,
            sales_person_id: person,
            price,
        }
    }

    fn add_on(id: i64, deal_id: i64, person: i64, price: Decimal, sale_date: NaiveDate) -> AddOn {
        AddOn {
            id,
            deal_id,
            sales_person_id: person,
            price,
            sale_date,
            dop_type: "Диммер".to_string(),
            business_line_id: 1,
            team_id: 2,
        }
    }

    fn payment(id: i64, deal_id: i64, price: Decimal, date: NaiveDate) -> Payment {
        Payment {
            id,
            deal_id,
            price,
            date,
        }
    }

    /// 3% on deals sold in January, 4% later; add-ons always 10%
    fn rates(_person: i64, sale_period: Period, target: TargetType) -> Decimal {
        match target {
            TargetType::AddOn => dec!(0.1),
            TargetType::Deal if sale_period == "2025-01".parse::<Period>().unwrap() => dec!(0.03),
            TargetType::Deal => dec!(0.04),
        }
    }

    // ==================== split_payment ====================

    #[test]
    fn test_split_not_yet_covered() {
        let split = split_payment(dec!(100000), dec!(20000), dec!(30000));
        assert_eq!(split.deal_portion, dec!(30000));
        assert_eq!(split.add_on_portion, dec!(0));
    }

    #[test]
    fn test_split_covered_this_period() {
        let split = split_payment(dec!(100000), dec!(80000), dec!(30000));
        assert_eq!(split.deal_portion, dec!(20000));
        assert_eq!(split.add_on_portion, dec!(10000));
    }

    #[test]
    fn test_split_covered_before_period() {
        let split = split_payment(dec!(100000), dec!(110000), dec!(5000));
        assert_eq!(split.deal_portion, dec!(0));
        assert_eq!(split.add_on_portion, dec!(5000));
    }

    #[test]
    fn test_split_exact_cover_stays_on_deal() {
        let split = split_payment(dec!(100000), dec!(0), dec!(100000));
        assert_eq!(split.deal_portion, dec!(100000));
        assert_eq!(split.add_on_portion, dec!(0));
    }

    // ==================== allocate ====================

    #[test]
    fn test_cross_period_deal_then_add_on() {
        let bundle = DealBundle {
            deal: deal(1, dec!(100000), date(2025, 1, 10)),
            participants: vec![participant(1, 7, dec!(100000))],
            add_ons: vec![add_on(50, 1, 7, dec!(20000), date(2025, 2, 3))],
            payments: vec![
                payment(1, 1, dec!(100000), date(2025, 1, 12)),
                payment(2, 1, dec!(20000), date(2025, 2, 5)),
            ],
        };

        let january = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-01"),
            Some(7),
            &rates,
        );
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].target_type, TargetType::Deal);
        assert_eq!(january[0].allocated_amount, dec!(100000));
        assert_eq!(january[0].percentage, dec!(0.03));

        let february = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-02"),
            Some(7),
            &rates,
        );
        assert_eq!(february.len(), 1);
        assert_eq!(february[0].target_type, TargetType::AddOn);
        assert_eq!(february[0].target_id, 50);
        assert_eq!(february[0].allocated_amount, dec!(20000));
        assert!(february[0].is_current_sale());
    }

    #[test]
    fn test_rate_fixed_at_sale_period() {
        let bundle = DealBundle {
            deal: deal(1, dec!(100000), date(2025, 1, 10)),
            participants: vec![participant(1, 7, dec!(100000))],
            add_ons: vec![],
            payments: vec![
                payment(1, 1, dec!(40000), date(2025, 1, 12)),
                payment(2, 1, dec!(60000), date(2025, 3, 1)),
            ],
        };

        let march = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-03"),
            None,
            &rates,
        );
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].allocated_amount, dec!(60000));
        assert_eq!(march[0].sale_period, period("2025-01"));
        assert_eq!(march[0].percentage, dec!(0.03));
        assert!(!march[0].is_current_sale());

        let summary = AllocationSummary::from_allocations(&march);
        assert_eq!(summary.prev_periods_deals_pays, dec!(60000));
        assert_eq!(summary.total_bonus(), dec!(1800));
    }

    #[test]
    fn test_deal_processed_once_per_period() {
        let bundle = DealBundle {
            deal: deal(1, dec!(90000), date(2025, 1, 10)),
            participants: vec![participant(1, 7, dec!(90000))],
            add_ons: vec![],
            payments: vec![
                payment(3, 1, dec!(30000), date(2025, 1, 20)),
                payment(1, 1, dec!(30000), date(2025, 1, 11)),
                payment(2, 1, dec!(30000), date(2025, 1, 15)),
            ],
        };

        let result = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-01"),
            None,
            &rates,
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].allocated_amount, dec!(90000));
    }

    #[test]
    fn test_split_across_participants_rounds_each_share() {
        let bundle = DealBundle {
            deal: deal(1, dec!(100000), date(2025, 1, 10)),
            participants: vec![
                participant(1, 7, dec!(33333)),
                participant(1, 8, dec!(66667)),
            ],
            add_ons: vec![],
            payments: vec![payment(1, 1, dec!(10000), date(2025, 1, 12))],
        };

        let result = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-01"),
            None,
            &rates,
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].allocated_amount, dec!(3333.30));
        assert_eq!(result[1].allocated_amount, dec!(6666.70));
    }

    #[test]
    fn test_add_on_portion_split_by_price_share() {
        let bundle = DealBundle {
            deal: deal(1, dec!(50000), date(2025, 1, 10)),
            participants: vec![participant(1, 7, dec!(50000))],
            add_ons: vec![
                add_on(10, 1, 7, dec!(10000), date(2025, 1, 10)),
                add_on(11, 1, 8, dec!(30000), date(2025, 1, 11)),
                add_on(12, 1, 8, dec!(5000), date(2025, 4, 1)),
            ],
            payments: vec![payment(1, 1, dec!(70000), date(2025, 1, 12))],
        };

        let result = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-01"),
            None,
            &rates,
        );
        let add_ons: Vec<&Allocation> = result
            .iter()
            .filter(|a| a.target_type == TargetType::AddOn)
            .collect();
        assert_eq!(add_ons.len(), 2);
        assert_eq!(add_ons[0].allocated_amount, dec!(5000));
        assert_eq!(add_ons[1].allocated_amount, dec!(15000));
        assert_eq!(add_ons[1].sales_person_id, 8);
    }

    #[test]
    fn test_zero_price_deal_allocates_zero() {
        let bundle = DealBundle {
            deal: deal(1, dec!(0), date(2025, 1, 10)),
            participants: vec![participant(1, 7, dec!(0))],
            add_ons: vec![],
            payments: vec![payment(1, 1, dec!(1000), date(2025, 1, 12))],
        };

        let result = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-01"),
            None,
            &rates,
        );
        assert!(result.iter().all(|a| a.allocated_amount.is_zero()));
    }

    #[test]
    fn test_oversubscribed_participants_are_tolerated() {
        let bundle = DealBundle {
            deal: deal(1, dec!(1000), date(2025, 1, 10)),
            participants: vec![participant(1, 7, dec!(800)), participant(1, 8, dec!(800))],
            add_ons: vec![],
            payments: vec![payment(1, 1, dec!(1000), date(2025, 1, 12))],
        };

        let result = allocate(
            std::slice::from_ref(&bundle),
            &bundle.payments,
            period("2025-01"),
            None,
            &rates,
        );
        let total: Decimal = result.iter().map(|a| a.allocated_amount).sum();
        assert_eq!(total, dec!(1600));
    }

    // ==================== conservation ====================

    #[test]
    fn test_deal_allocations_conserve_payments() {
        let cases = [
            (dec!(100000), vec![dec!(30000), dec!(50000), dec!(40000)]),
            (dec!(100000), vec![dec!(10000), dec!(10000)]),
            (dec!(77777), vec![dec!(77777)]),
            (dec!(120000), vec![dec!(1), dec!(119998), dec!(500)]),
        ];

        for (price, amounts) in cases {
            let payments: Vec<Payment> = amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| payment(i as i64, 1, *amount, date(2025, 1 + i as u32, 3)))
                .collect();
            let bundle = DealBundle {
                deal: deal(1, price, date(2025, 1, 1)),
                participants: vec![
                    participant(1, 7, price * dec!(0.3)),
                    participant(1, 8, price * dec!(0.7)),
                ],
                add_ons: vec![],
                payments,
            };

            let history = allocate_history(&bundle, &rates);
            let paid: Decimal = amounts.iter().copied().sum();
            let expected = price.min(paid);
            let allocated: Decimal = history
                .iter()
                .filter(|a| a.target_type == TargetType::Deal)
                .map(|a| a.allocated_amount)
                .sum();
            let tolerance = dec!(0.01) * Decimal::from(bundle.participants.len() * amounts.len());
            assert!(
                (allocated - expected).abs() <= tolerance,
                "price {} paid {} allocated {}",
                price,
                paid,
                allocated
            );
        }
    }
}
