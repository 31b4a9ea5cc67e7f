//! Top-performer rankings and the bonuses they award.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::rules::{
    PRIMARY_LINE_ID, PRIMARY_TOP_PLACES, RANKING_EXCLUDED_TEAMS, SECONDARY_LINE_ID,
    SECONDARY_TOP_BONUS, SECONDARY_TOP_PLACES, MIN_SHIFTS_FOR_TOP_BONUS, TOP_BONUS_STEP,
};

use super::calculators::ratio;

/// One salesperson's period figures as seen by the ranker
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortMember {
    pub sales_person_id: i64,
    pub full_name: String,
    pub team_id: i64,
    pub total_sales: Decimal,
    pub dop_sales: Decimal,
    /// Sales of the separately ranked add-on type
    pub ranked_add_on_sales: Decimal,
    /// Participant share of deals whose maket needed no designer
    pub no_designer_sales: Decimal,
    pub same_day_deals: usize,
    pub calls: i64,
    pub shifts: usize,
}

impl CohortMember {
    /// Same-day deals per inbound lead
    pub fn same_day_conversion(&self) -> Decimal {
        ratio(Decimal::from(self.same_day_deals), Decimal::from(self.calls))
    }

    fn metric(&self, metric: RankingMetric) -> Decimal {
        match metric {
            RankingMetric::TotalSales => self.total_sales,
            RankingMetric::DopSales => self.dop_sales,
            RankingMetric::RankedAddOnSales => self.ranked_add_on_sales,
            RankingMetric::NoDesignerSales => self.no_designer_sales,
            RankingMetric::SameDayConversion => self.same_day_conversion(),
        }
    }

    fn earns_top_bonus(&self) -> bool {
        !self.total_sales.is_zero() && self.shifts > MIN_SHIFTS_FOR_TOP_BONUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RankingMetric {
    TotalSales,
    DopSales,
    RankedAddOnSales,
    NoDesignerSales,
    SameDayConversion,
}

impl RankingMetric {
    pub const ALL: [RankingMetric; 5] = [
        RankingMetric::TotalSales,
        RankingMetric::DopSales,
        RankingMetric::RankedAddOnSales,
        RankingMetric::NoDesignerSales,
        RankingMetric::SameDayConversion,
    ];

    /// Business line B does not rank the single add-on type
    pub const SECONDARY: [RankingMetric; 4] = [
        RankingMetric::TotalSales,
        RankingMetric::DopSales,
        RankingMetric::NoDesignerSales,
        RankingMetric::SameDayConversion,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// 1-based
    pub place: usize,
    pub sales_person_id: i64,
    pub full_name: String,
    pub value: Decimal,
    /// Zero when the member is listed but not eligible
    pub bonus: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    pub metric: RankingMetric,
    pub entries: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopResult {
    pub rankings: Vec<Ranking>,
    /// Accumulated top bonus per salesperson
    pub top_bonus: BTreeMap<i64, Decimal>,
}

impl TopResult {
    pub fn bonus_for(&self, sales_person_id: i64) -> Decimal {
        self.top_bonus
            .get(&sales_person_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Rank a business line's cohort.
///
/// Excluded teams are dropped first. Each metric is ranked independently
/// with a stable descending sort, so ties keep cohort order and exactly the
/// top places are listed. Unknown business lines produce no rankings.
pub fn rank_cohort(members: &[CohortMember], business_line_id: i64) -> TopResult {
    let (metrics, places): (&[RankingMetric], usize) = match business_line_id {
        PRIMARY_LINE_ID => (&RankingMetric::ALL, PRIMARY_TOP_PLACES),
        SECONDARY_LINE_ID => (&RankingMetric::SECONDARY, SECONDARY_TOP_PLACES),
        _ => return TopResult::default(),
    };

    let cohort: Vec<&CohortMember> = members
        .iter()
        .filter(|m| !RANKING_EXCLUDED_TEAMS.contains(&m.team_id))
        .collect();

    let mut result = TopResult::default();
    for &metric in metrics {
        let mut sorted = cohort.clone();
        sorted.sort_by(|a, b| b.metric(metric).cmp(&a.metric(metric)));

        let entries = sorted
            .into_iter()
            .take(places)
            .enumerate()
            .map(|(index, member)| {
                let bonus = if member.earns_top_bonus() {
                    place_bonus(business_line_id, places, index)
                } else {
                    Decimal::ZERO
                };
                if !bonus.is_zero() {
                    *result.top_bonus.entry(member.sales_person_id).or_default() += bonus;
                }
                RankedEntry {
                    place: index + 1,
                    sales_person_id: member.sales_person_id,
                    full_name: member.full_name.clone(),
                    value: member.metric(metric),
                    bonus,
                }
            })
            .collect();

        result.rankings.push(Ranking { metric, entries });
    }

    result
}

fn place_bonus(business_line_id: i64, places: usize, index: usize) -> Decimal {
    if business_line_id == SECONDARY_LINE_ID {
        SECONDARY_TOP_BONUS
    } else {
        Decimal::from(places - index) * TOP_BONUS_STEP
    }
}
