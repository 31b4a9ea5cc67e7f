//! Period aggregation: day buckets, totals, breakdowns and derived ratios.
//!
//! [`Aggregate`] holds only raw sums so two aggregates can be merged; every
//! ratio is derived in [`Aggregate::finish`] from the (merged) sums.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commission::calculators::{money_ratio, ratio, round_money, safe_div};
use crate::models::{AdExpense, AddOn, Deal, Delivery, ManagerReport, Participation};
use crate::period::Period;
use crate::rules::KNOWN_MAKET_TYPES;
use crate::store::Scope;

/// Buckets are always 1..=31, whatever the month length
pub const DAY_BUCKETS: usize = 31;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    /// 1-based day of month
    pub day: u32,
    pub deals_amount: Decimal,
    pub dops_amount: Decimal,
    pub calls: i64,
    pub chat_redirects: i64,
    pub ad_spend: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownValue {
    pub count: usize,
    pub amount: Decimal,
}

impl BreakdownValue {
    fn add(&mut self, other: BreakdownValue) {
        self.count += other.count;
        self.amount += other.amount;
    }
}

/// Dynamically keyed sums; ordering by value happens only in [`Self::sorted`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakdownMap {
    entries: BTreeMap<String, BreakdownValue>,
}

impl BreakdownMap {
    pub fn seeded(keys: &[&str]) -> Self {
        Self {
            entries: keys
                .iter()
                .map(|k| (k.to_string(), BreakdownValue::default()))
                .collect(),
        }
    }

    pub fn record(&mut self, key: &str, amount: Decimal) {
        self.entries.entry(key.to_string()).or_default().add(BreakdownValue {
            count: 1,
            amount,
        });
    }

    pub fn merge(&mut self, other: &BreakdownMap) {
        for (key, value) in &other.entries {
            self.entries.entry(key.clone()).or_default().add(*value);
        }
    }

    pub fn get(&self, key: &str) -> Option<BreakdownValue> {
        self.entries.get(key).copied()
    }

    /// Entries by amount descending, key ascending on ties
    pub fn sorted(&self) -> Vec<BreakdownEntry> {
        let mut entries: Vec<BreakdownEntry> = self
            .entries
            .iter()
            .map(|(key, value)| BreakdownEntry {
                key: key.clone(),
                count: value.count,
                amount: value.amount,
            })
            .collect();
        entries.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.key.cmp(&b.key)));
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub key: String,
    pub count: usize,
    pub amount: Decimal,
}

/// Shipped vs delivered vs free deliveries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFunnel {
    pub shipped_count: usize,
    pub shipped_value: Decimal,
    pub delivered_count: usize,
    pub delivered_value: Decimal,
    pub free_count: usize,
    /// Carrier cost of free deliveries
    pub free_value: Decimal,
}

impl DeliveryFunnel {
    fn merge(&mut self, other: &DeliveryFunnel) {
        self.shipped_count += other.shipped_count;
        self.shipped_value += other.shipped_value;
        self.delivered_count += other.delivered_count;
        self.delivered_value += other.delivered_value;
        self.free_count += other.free_count;
        self.free_value += other.free_value;
    }
}

/// Additive period sums
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub deals_count: usize,
    pub deals_amount: Decimal,
    pub dops_count: usize,
    pub dops_amount: Decimal,
    pub same_day_deals: usize,
    pub plan: Decimal,
    pub calls: i64,
    pub makets: i64,
    pub same_day_makets: i64,
    pub chat_redirects: i64,
    pub ad_spend: Decimal,
    pub deliveries: DeliveryFunnel,
}

impl PeriodTotals {
    pub fn total_sales(&self) -> Decimal {
        self.deals_amount + self.dops_amount
    }

    fn merge(&mut self, other: &PeriodTotals) {
        self.deals_count += other.deals_count;
        self.deals_amount += other.deals_amount;
        self.dops_count += other.dops_count;
        self.dops_amount += other.dops_amount;
        self.same_day_deals += other.same_day_deals;
        self.plan += other.plan;
        self.calls += other.calls;
        self.makets += other.makets;
        self.same_day_makets += other.same_day_makets;
        self.chat_redirects += other.chat_redirects;
        self.ad_spend += other.ad_spend;
        self.deliveries.merge(&other.deliveries);
    }
}

/// Ratios derived from [`PeriodTotals`]; zero whenever a denominator is zero
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub total_sales: Decimal,
    pub sales_to_plan: Decimal,
    pub average_bill: Decimal,
    /// Run-rate projection of the month's sales
    pub temp: Decimal,
    pub call_cost: Decimal,
    pub drr: Decimal,
    pub conversion_deals_to_calls: Decimal,
    pub conversion_makets_to_calls: Decimal,
    pub conversion_deals_to_makets: Decimal,
}

impl DerivedMetrics {
    pub fn derive(totals: &PeriodTotals, period: Period, today: NaiveDate) -> Self {
        let total_sales = totals.total_sales();
        let deals = Decimal::from(totals.deals_count);
        let calls = Decimal::from(totals.calls);
        let makets = Decimal::from(totals.makets);

        Self {
            total_sales,
            sales_to_plan: ratio(total_sales, totals.plan),
            average_bill: money_ratio(totals.deals_amount, deals),
            temp: run_rate(total_sales, period, today),
            call_cost: money_ratio(totals.ad_spend, calls),
            drr: ratio(totals.ad_spend, total_sales),
            conversion_deals_to_calls: ratio(deals, calls),
            conversion_makets_to_calls: ratio(makets, calls),
            conversion_deals_to_makets: ratio(deals, makets),
        }
    }
}

/// `total / days_elapsed * days_in_month`, rounded to whole units
pub fn run_rate(total_sales: Decimal, period: Period, today: NaiveDate) -> Decimal {
    let elapsed = Decimal::from(period.days_elapsed(today));
    let days = Decimal::from(period.days_in_month());
    round_money(safe_div(total_sales * days, elapsed), 0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakdowns {
    pub source: BreakdownMap,
    pub ad_tag: BreakdownMap,
    pub maket_type: BreakdownMap,
    pub ad_source: BreakdownMap,
}

/// Reprice deals at the participant shares in `shares`; deals without a
/// matching share are dropped
pub fn deals_at_share(deals: Vec<Deal>, shares: &[Participation]) -> Vec<Deal> {
    let mut by_deal: HashMap<i64, Decimal> = HashMap::new();
    for share in shares {
        *by_deal.entry(share.deal_id).or_default() += share.price;
    }
    deals
        .into_iter()
        .filter_map(|deal| {
            let price = *by_deal.get(&deal.id)?;
            Some(Deal { price, ..deal })
        })
        .collect()
}

/// Raw rows of one scope and period
#[derive(Debug, Clone, Default)]
pub struct PeriodInputs {
    pub deals: Vec<Deal>,
    pub add_ons: Vec<AddOn>,
    pub reports: Vec<ManagerReport>,
    pub ad_expenses: Vec<AdExpense>,
    pub deliveries: Vec<Delivery>,
    pub plan: Decimal,
}

/// Mergeable accumulator for one or more scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub days: Vec<DayBucket>,
    pub totals: PeriodTotals,
    pub breakdowns: Breakdowns,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            days: (1..=DAY_BUCKETS as u32)
                .map(|day| DayBucket {
                    day,
                    ..DayBucket::default()
                })
                .collect(),
            totals: PeriodTotals::default(),
            breakdowns: Breakdowns {
                maket_type: BreakdownMap::seeded(KNOWN_MAKET_TYPES),
                ..Breakdowns::default()
            },
        }
    }
}

impl Aggregate {
    /// Fold a scope's rows into a fresh aggregate. Rows outside `period` are ignored.
    pub fn from_inputs(period: Period, inputs: &PeriodInputs) -> Self {
        let mut agg = Self::default();
        agg.totals.plan = inputs.plan;

        for deal in inputs.deals.iter().filter(|d| period.contains(d.sale_date)) {
            agg.day(deal.sale_date).deals_amount += deal.price;
            agg.totals.deals_count += 1;
            agg.totals.deals_amount += deal.price;
            if deal.is_same_day() {
                agg.totals.same_day_deals += 1;
            }
            agg.breakdowns.source.record(&deal.source, deal.price);
            if !deal.ad_tag.is_empty() {
                agg.breakdowns.ad_tag.record(&deal.ad_tag, deal.price);
            }
            agg.breakdowns.maket_type.record(&deal.maket_type, deal.price);
        }

        for add_on in inputs.add_ons.iter().filter(|o| period.contains(o.sale_date)) {
            agg.day(add_on.sale_date).dops_amount += add_on.price;
            agg.totals.dops_count += 1;
            agg.totals.dops_amount += add_on.price;
        }

        for report in inputs.reports.iter().filter(|r| period.contains(r.date)) {
            let bucket = agg.day(report.date);
            bucket.calls += i64::from(report.calls);
            bucket.chat_redirects += i64::from(report.chat_redirects);
            agg.totals.calls += i64::from(report.calls);
            agg.totals.makets += i64::from(report.makets);
            agg.totals.same_day_makets += i64::from(report.same_day_makets);
            agg.totals.chat_redirects += i64::from(report.chat_redirects);
        }

        for expense in inputs.ad_expenses.iter().filter(|e| period.contains(e.date)) {
            agg.day(expense.date).ad_spend += expense.price;
            agg.totals.ad_spend += expense.price;
            agg.breakdowns.ad_source.record(&expense.source, expense.price);
        }

        let in_period = |date: Option<NaiveDate>| date.is_some_and(|d| period.contains(d));
        let funnel = &mut agg.totals.deliveries;
        for delivery in &inputs.deliveries {
            if delivery.is_shipped() && in_period(delivery.ship_date) {
                funnel.shipped_count += 1;
                funnel.shipped_value += delivery.order_value();
                if delivery.is_free() {
                    funnel.free_count += 1;
                    funnel.free_value += delivery.price;
                }
            }
            if delivery.is_delivered() && in_period(delivery.delivered_date) {
                funnel.delivered_count += 1;
                funnel.delivered_value += delivery.order_value();
            }
        }

        agg
    }

    fn day(&mut self, date: NaiveDate) -> &mut DayBucket {
        // day() is 1..=31 and there are always 31 buckets
        let index = (date.day() as usize - 1).min(DAY_BUCKETS - 1);
        &mut self.days[index]
    }

    /// Sum another aggregate into this one
    pub fn merge(mut self, other: &Aggregate) -> Self {
        for (mine, theirs) in self.days.iter_mut().zip(&other.days) {
            mine.deals_amount += theirs.deals_amount;
            mine.dops_amount += theirs.dops_amount;
            mine.calls += theirs.calls;
            mine.chat_redirects += theirs.chat_redirects;
            mine.ad_spend += theirs.ad_spend;
        }
        self.totals.merge(&other.totals);
        self.breakdowns.source.merge(&other.breakdowns.source);
        self.breakdowns.ad_tag.merge(&other.breakdowns.ad_tag);
        self.breakdowns.maket_type.merge(&other.breakdowns.maket_type);
        self.breakdowns.ad_source.merge(&other.breakdowns.ad_source);
        self
    }

    /// Freeze into the published shape, deriving every ratio from the sums
    pub fn finish(self, scope: Scope, period: Period, today: NaiveDate) -> PeriodStatistics {
        let metrics = DerivedMetrics::derive(&self.totals, period, today);
        PeriodStatistics {
            scope,
            period,
            days: self.days,
            metrics,
            breakdowns: SortedBreakdowns {
                source: self.breakdowns.source.sorted(),
                ad_tag: self.breakdowns.ad_tag.sorted(),
                maket_type: self.breakdowns.maket_type.sorted(),
                ad_source: self.breakdowns.ad_source.sorted(),
            },
            totals: self.totals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortedBreakdowns {
    pub source: Vec<BreakdownEntry>,
    pub ad_tag: Vec<BreakdownEntry>,
    pub maket_type: Vec<BreakdownEntry>,
    pub ad_source: Vec<BreakdownEntry>,
}

/// Published statistics of one scope and period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStatistics {
    pub scope: Scope,
    pub period: Period,
    pub days: Vec<DayBucket>,
    pub totals: PeriodTotals,
    pub metrics: DerivedMetrics,
    pub breakdowns: SortedBreakdowns,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MAKET_DESIGNER;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn deal(id: i64, price: Decimal, day: u32, source: &str, maket: &str) -> Deal {
        Deal {
            id,
            title: format!("Сделка {}", id),
            price,
            sale_date: date(2025, 2, day),
            status: "Создана".to_string(),
            reservation: false,
            deleted_at: None,
            business_line_id: 1,
            team_id: 2,
            maket_type: maket.to_string(),
            source: source.to_string(),
            ad_tag: String::new(),
            first_contact_date: None,
        }
    }

    fn report(day: u32, calls: i32, makets: i32) -> ManagerReport {
        ManagerReport {
            id: i64::from(day),
            sales_person_id: 7,
            date: date(2025, 2, day),
            calls,
            makets,
            same_day_makets: 0,
            chat_redirects: 1,
            is_intern: false,
            shift_cost: dec!(1500),
            business_line_id: 1,
            team_id: 2,
        }
    }

    // ==================== run-rate ====================

    #[test]
    fn test_temp_mid_month() {
        assert_eq!(
            run_rate(dec!(140000), period("2025-02"), date(2025, 2, 14)),
            dec!(280000)
        );
    }

    #[test]
    fn test_temp_past_month_is_total() {
        assert_eq!(
            run_rate(dec!(140000), period("2025-02"), date(2025, 5, 1)),
            dec!(140000)
        );
    }

    #[test]
    fn test_temp_rounds_to_whole_units() {
        assert_eq!(
            run_rate(dec!(100), period("2025-01"), date(2025, 1, 3)),
            dec!(1033)
        );
    }

    // ==================== buckets ====================

    #[test]
    fn test_short_month_still_has_31_buckets() {
        let agg = Aggregate::from_inputs(period("2025-02"), &PeriodInputs::default());
        assert_eq!(agg.days.len(), DAY_BUCKETS);
        assert_eq!(agg.days[0].day, 1);
        assert_eq!(agg.days[30].day, 31);
        assert!(agg.days.iter().all(|d| d.deals_amount.is_zero()));
    }

    #[test]
    fn test_rows_land_in_their_day() {
        let inputs = PeriodInputs {
            deals: vec![
                deal(1, dec!(10000), 3, "ВК", MAKET_DESIGNER),
                deal(2, dec!(5000), 3, "Авито", MAKET_DESIGNER),
            ],
            reports: vec![report(3, 10, 4)],
            ..PeriodInputs::default()
        };
        let agg = Aggregate::from_inputs(period("2025-02"), &inputs);
        assert_eq!(agg.days[2].deals_amount, dec!(15000));
        assert_eq!(agg.days[2].calls, 10);
        assert_eq!(agg.totals.deals_count, 2);
        assert_eq!(agg.totals.makets, 4);
    }

    // ==================== breakdowns ====================

    #[test]
    fn test_breakdown_sorted_at_read_time() {
        let mut map = BreakdownMap::default();
        map.record("Авито", dec!(100));
        map.record("ВК", dec!(300));
        map.record("Авито", dec!(250));

        let sorted = map.sorted();
        assert_eq!(sorted[0].key, "Авито");
        assert_eq!(sorted[0].amount, dec!(350));
        assert_eq!(sorted[0].count, 2);
        assert_eq!(sorted[1].key, "ВК");
    }

    #[test]
    fn test_maket_types_pre_seeded() {
        let stats = Aggregate::default().finish(Scope::Company, period("2025-02"), date(2025, 3, 1));
        assert_eq!(stats.breakdowns.maket_type.len(), KNOWN_MAKET_TYPES.len());
        assert!(stats.breakdowns.maket_type.iter().all(|e| e.count == 0));
    }

    // ==================== derived metrics ====================

    #[test]
    fn test_zero_denominators_yield_zero() {
        let metrics = DerivedMetrics::derive(
            &PeriodTotals::default(),
            period("2025-02"),
            date(2025, 2, 10),
        );
        assert_eq!(metrics, DerivedMetrics::default());
    }

    #[test]
    fn test_metrics_from_totals() {
        let totals = PeriodTotals {
            deals_count: 4,
            deals_amount: dec!(200000),
            dops_amount: dec!(20000),
            plan: dec!(440000),
            calls: 40,
            makets: 10,
            ad_spend: dec!(22000),
            ..PeriodTotals::default()
        };
        let metrics = DerivedMetrics::derive(&totals, period("2025-02"), date(2025, 3, 1));
        assert_eq!(metrics.total_sales, dec!(220000));
        assert_eq!(metrics.sales_to_plan, dec!(0.5));
        assert_eq!(metrics.average_bill, dec!(50000));
        assert_eq!(metrics.call_cost, dec!(550));
        assert_eq!(metrics.drr, dec!(0.1));
        assert_eq!(metrics.conversion_deals_to_calls, dec!(0.1));
        assert_eq!(metrics.conversion_makets_to_calls, dec!(0.25));
        assert_eq!(metrics.conversion_deals_to_makets, dec!(0.4));
    }

    #[test]
    fn test_person_view_counts_own_share() {
        let share = |deal_id: i64, price: Decimal| Participation {
            deal_id,
            sales_person_id: 7,
            price,
            deal_price: dec!(100000),
            sale_date: date(2025, 2, 3),
            maket_type: MAKET_DESIGNER.to_string(),
            first_contact_date: None,
            business_line_id: 1,
            team_id: 2,
        };
        let deals = vec![
            deal(1, dec!(100000), 3, "ВК", MAKET_DESIGNER),
            deal(2, dec!(50000), 4, "ВК", MAKET_DESIGNER),
        ];

        let own = deals_at_share(deals, &[share(1, dec!(40000))]);
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].price, dec!(40000));

        let agg = Aggregate::from_inputs(
            period("2025-02"),
            &PeriodInputs {
                deals: own,
                ..PeriodInputs::default()
            },
        );
        assert_eq!(agg.totals.deals_amount, dec!(40000));
        assert_eq!(agg.breakdowns.source.get("ВК").map(|v| v.amount), Some(dec!(40000)));
    }

    // ==================== merge ====================

    #[test]
    fn test_merge_recomputes_ratios_from_sums() {
        let p = period("2025-02");
        let a = Aggregate::from_inputs(
            p,
            &PeriodInputs {
                deals: vec![deal(1, dec!(100000), 5, "ВК", MAKET_DESIGNER)],
                reports: vec![report(5, 10, 2)],
                ..PeriodInputs::default()
            },
        );
        let b = Aggregate::from_inputs(
            p,
            &PeriodInputs {
                deals: vec![
                    deal(2, dec!(30000), 6, "ВК", MAKET_DESIGNER),
                    deal(3, dec!(30000), 6, "Авито", MAKET_DESIGNER),
                ],
                reports: vec![report(6, 90, 8)],
                ..PeriodInputs::default()
            },
        );

        let merged = a.merge(&b).finish(Scope::Company, p, date(2025, 3, 1));
        assert_eq!(merged.totals.deals_count, 3);
        assert_eq!(merged.totals.calls, 100);
        // 3 / 100, not the mean of 0.1 and 0.0222
        assert_eq!(merged.metrics.conversion_deals_to_calls, dec!(0.03));
        assert_eq!(merged.days[4].deals_amount, dec!(100000));
        assert_eq!(merged.days[5].deals_amount, dec!(60000));

        let vk = merged
            .breakdowns
            .source
            .iter()
            .find(|e| e.key == "ВК")
            .unwrap();
        assert_eq!(vk.amount, dec!(130000));
        assert_eq!(vk.count, 2);
    }

    #[test]
    fn test_delivery_funnel() {
        let delivery = |id: i64, status: &str, kind: &str| Delivery {
            id,
            deal_id: id,
            price: dec!(700),
            ship_date: Some(date(2025, 2, 3)),
            delivered_date: Some(date(2025, 2, 8)),
            status: status.to_string(),
            delivery_type: kind.to_string(),
            business_line_id: 1,
            team_id: 2,
            deal_price: dec!(10000),
            dops_price: dec!(1000),
        };
        let inputs = PeriodInputs {
            deliveries: vec![
                delivery(1, Delivery::STATUS_SHIPPED, "СДЭК"),
                delivery(2, Delivery::STATUS_DELIVERED, Delivery::TYPE_FREE),
                delivery(3, "Создана", "СДЭК"),
            ],
            ..PeriodInputs::default()
        };
        let funnel = Aggregate::from_inputs(period("2025-02"), &inputs).totals.deliveries;
        assert_eq!(funnel.shipped_count, 2);
        assert_eq!(funnel.shipped_value, dec!(22000));
        assert_eq!(funnel.delivered_count, 1);
        assert_eq!(funnel.free_count, 1);
        assert_eq!(funnel.free_value, dec!(700));
    }
}
