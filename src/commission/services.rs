//! Commission service functions with store access.
//!
//! A business line is always computed as a whole: top bonuses depend on the
//! line's cohort and role top-ups on team and line totals, so person and team
//! reports are cut out of the line computation.

use std::collections::HashMap;

use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::models::{AddOn, ManagerReport, Participation, SalesPerson};
use crate::period::Period;
use crate::rules::{self, BonusRates, SalesRole};
use crate::store::{SalesStore, Scope};

use super::calculators::{compose_salary, round_money, SalaryInputs};
use super::proration::{allocate, Allocation, AllocationSummary, RateBook};
use super::ranking::{rank_cohort, CohortMember, TopResult};
use super::responses::{CommissionTotals, LineCommission, SalesPersonCommission, TeamCommission};

/// A person's own sales within one period
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PeriodSales {
    pub deals_count: usize,
    pub deal_sales: Decimal,
    pub dops_count: usize,
    pub dop_sales: Decimal,
    pub ranked_add_on_sales: Decimal,
    pub no_designer_sales: Decimal,
    pub same_day_deals: usize,
}

impl PeriodSales {
    pub fn collect(person_id: i64, participations: &[Participation], add_ons: &[AddOn]) -> Self {
        let mut sales = Self::default();
        for share in participations.iter().filter(|p| p.sales_person_id == person_id) {
            sales.deals_count += 1;
            sales.deal_sales += share.price;
            if rules::is_no_designer_maket(&share.maket_type) {
                sales.no_designer_sales += share.price;
            }
            if share.is_same_day() {
                sales.same_day_deals += 1;
            }
        }
        for add_on in add_ons.iter().filter(|o| o.sales_person_id == person_id) {
            sales.dops_count += 1;
            sales.dop_sales += add_on.price;
            if add_on.dop_type == rules::RANKED_ADD_ON_TYPE {
                sales.ranked_add_on_sales += add_on.price;
            }
        }
        sales
    }

    pub fn total(&self) -> Decimal {
        self.deal_sales + self.dop_sales
    }
}

#[derive(Debug, Clone, Default)]
struct ShiftStats {
    shifts: usize,
    calls: i64,
    shift_bonus: Decimal,
}

fn shift_stats(reports: &[ManagerReport]) -> HashMap<i64, ShiftStats> {
    let mut stats: HashMap<i64, ShiftStats> = HashMap::new();
    for report in reports {
        let entry = stats.entry(report.sales_person_id).or_default();
        entry.shifts += 1;
        entry.calls += i64::from(report.calls);
        entry.shift_bonus += report.shift_cost;
    }
    stats
}

/// Rates for a person's sales in a period, business development included
pub(crate) fn rates_for(
    person: &SalesPerson,
    total_sales: Decimal,
    plan: Decimal,
    period: Period,
) -> BonusRates {
    let role = SalesRole::from_code(&person.role);
    let mut rates = rules::compute_bonus(
        total_sales,
        person.business_line_id,
        person.team_id,
        person.is_intern,
        role,
        period,
    );
    if role == SalesRole::BusinessDevelopment {
        let percentage = rules::business_development_rate(total_sales, plan);
        rates.bonus_percentage = percentage;
        rates.add_on_percentage = percentage;
    }
    rates
}

/// Rates of an earlier sale period, from that period's own sales and plan.
///
/// Team, line and intern flag are the person's current ones.
async fn historical_rates(
    store: &dyn SalesStore,
    person: &SalesPerson,
    period: Period,
) -> Result<BonusRates> {
    let range = period.range();
    let ids = [person.id];
    let (participations, add_ons, plans) = tokio::try_join!(
        store.participations(&ids, range),
        store.add_ons(Scope::Person(person.id), range),
        store.manager_plans(&ids, period),
    )?;

    let sales = PeriodSales::collect(person.id, &participations, &add_ons);
    let plan = plans.first().map(|p| p.plan).unwrap_or_default();
    Ok(rates_for(person, sales.total(), plan, period))
}

/// Allocations of the period's payments to one person
async fn person_allocations(
    store: &dyn SalesStore,
    person: &SalesPerson,
    period: Period,
    current: BonusRates,
) -> Result<Vec<Allocation>> {
    let payments = store.payments_for_person(person.id, period.range()).await?;
    if payments.is_empty() {
        return Ok(Vec::new());
    }

    let mut deal_ids: Vec<i64> = payments.iter().map(|p| p.deal_id).collect();
    deal_ids.sort_unstable();
    deal_ids.dedup();
    let bundles = store.deal_bundles(&deal_ids).await?;

    let mut book = RateBook::new();
    book.insert(person.id, period, current);
    let missing: Vec<Period> = RateBook::required_keys(&bundles, Some(person.id))
        .into_iter()
        .filter(|&(id, sale_period)| !book.contains(id, sale_period))
        .map(|(_, sale_period)| sale_period)
        .collect();

    debug!(
        sales_person_id = person.id,
        %period,
        deals = bundles.len(),
        historical_periods = missing.len(),
        "Allocating payments"
    );

    let fetched = try_join_all(
        missing
            .iter()
            .map(|&sale_period| historical_rates(store, person, sale_period)),
    )
    .await?;
    for (sale_period, rates) in missing.into_iter().zip(fetched) {
        book.insert(person.id, sale_period, rates);
    }

    Ok(allocate(&bundles, &payments, period, Some(person.id), &book))
}

/// Everything one business line's period computation reads
struct LineData {
    people: Vec<SalesPerson>,
    sales: HashMap<i64, PeriodSales>,
    shifts: HashMap<i64, ShiftStats>,
    plans: HashMap<i64, Decimal>,
    paid: HashMap<i64, Decimal>,
    corrections: HashMap<i64, Decimal>,
}

async fn load_line(
    store: &dyn SalesStore,
    business_line_id: i64,
    period: Period,
    include: Option<&SalesPerson>,
) -> Result<LineData> {
    let range = period.range();
    let mut people = store
        .sales_people(Scope::BusinessLine(business_line_id), range)
        .await?;
    if let Some(person) = include {
        if !people.iter().any(|p| p.id == person.id) {
            people.push(person.clone());
        }
    }
    let ids: Vec<i64> = people.iter().map(|p| p.id).collect();

    let (participations, add_ons, reports, plans, pays, corrections) = tokio::try_join!(
        store.participations(&ids, range),
        store.add_ons(Scope::BusinessLine(business_line_id), range),
        store.manager_reports(Scope::BusinessLine(business_line_id), range),
        store.manager_plans(&ids, period),
        store.salary_pays(&ids, period),
        store.salary_corrections(&ids, period),
    )?;

    let sales = ids
        .iter()
        .map(|&id| (id, PeriodSales::collect(id, &participations, &add_ons)))
        .collect();

    // duplicates: the first plan row wins
    let mut plan_map: HashMap<i64, Decimal> = HashMap::new();
    for plan in &plans {
        plan_map.entry(plan.sales_person_id).or_insert(plan.plan);
    }

    let mut paid: HashMap<i64, Decimal> = HashMap::new();
    for pay in &pays {
        *paid.entry(pay.sales_person_id).or_default() += pay.price;
    }

    let mut correction_map: HashMap<i64, Decimal> = HashMap::new();
    for correction in &corrections {
        *correction_map.entry(correction.sales_person_id).or_default() +=
            correction.signed_amount();
    }

    Ok(LineData {
        people,
        sales,
        shifts: shift_stats(&reports),
        plans: plan_map,
        paid,
        corrections: correction_map,
    })
}

impl LineData {
    fn sales_of(&self, id: i64) -> PeriodSales {
        self.sales.get(&id).cloned().unwrap_or_default()
    }

    fn shifts_of(&self, id: i64) -> ShiftStats {
        self.shifts.get(&id).cloned().unwrap_or_default()
    }

    fn amount(map: &HashMap<i64, Decimal>, id: i64) -> Decimal {
        map.get(&id).copied().unwrap_or_default()
    }

    fn cohort(&self) -> Vec<CohortMember> {
        self.people
            .iter()
            .filter(|p| SalesRole::from_code(&p.role).is_ranked())
            .map(|p| {
                let sales = self.sales_of(p.id);
                let shifts = self.shifts_of(p.id);
                CohortMember {
                    sales_person_id: p.id,
                    full_name: p.full_name.clone(),
                    team_id: p.team_id,
                    total_sales: sales.total(),
                    dop_sales: sales.dop_sales,
                    ranked_add_on_sales: sales.ranked_add_on_sales,
                    no_designer_sales: sales.no_designer_sales,
                    same_day_deals: sales.same_day_deals,
                    calls: shifts.calls,
                    shifts: shifts.shifts,
                }
            })
            .collect()
    }

    fn team_sales(&self) -> HashMap<i64, Decimal> {
        let mut totals: HashMap<i64, Decimal> = HashMap::new();
        for person in &self.people {
            *totals.entry(person.team_id).or_default() += self.sales_of(person.id).total();
        }
        totals
    }

    fn line_sales(&self) -> Decimal {
        self.people
            .iter()
            .map(|p| self.sales_of(p.id).total())
            .sum()
    }
}

fn role_top_up(
    person: &SalesPerson,
    team_sales: &HashMap<i64, Decimal>,
    line_sales: Decimal,
) -> Decimal {
    match SalesRole::from_code(&person.role) {
        SalesRole::TeamLead => round_money(
            rules::TEAM_LEAD_TOP_UP * LineData::amount(team_sales, person.team_id),
            2,
        ),
        SalesRole::OpsDirector => round_money(rules::OPS_DIRECTOR_TOP_UP * line_sales, 2),
        _ => Decimal::ZERO,
    }
}

async fn compute_line(
    store: &dyn SalesStore,
    business_line_id: i64,
    period: Period,
    include: Option<&SalesPerson>,
) -> Result<LineCommission> {
    let data = load_line(store, business_line_id, period, include).await?;

    let current_rates: Vec<BonusRates> = data
        .people
        .iter()
        .map(|p| {
            rates_for(
                p,
                data.sales_of(p.id).total(),
                LineData::amount(&data.plans, p.id),
                period,
            )
        })
        .collect();

    let top: TopResult = rank_cohort(&data.cohort(), business_line_id);
    let team_sales = data.team_sales();
    let line_sales = data.line_sales();

    let allocations = try_join_all(data.people.iter().zip(&current_rates).map(
        |(person, &rates)| async move {
            if SalesRole::from_code(&person.role).earns_sales_commission() {
                person_allocations(store, person, period, rates).await
            } else {
                Ok(Vec::new())
            }
        },
    ))
    .await?;

    let members: Vec<SalesPersonCommission> = data
        .people
        .iter()
        .zip(current_rates)
        .zip(allocations)
        .map(|((person, rates), allocations)| {
            let sales = data.sales_of(person.id);
            let shifts = data.shifts_of(person.id);
            let plan = LineData::amount(&data.plans, person.id);
            let payments = AllocationSummary::from_allocations(&allocations);

            let salary = compose_salary(&SalaryInputs {
                deal_sales: sales.deal_sales,
                dop_sales: sales.dop_sales,
                plan,
                rates,
                payments: payments.clone(),
                shift_bonus: shifts.shift_bonus,
                role_top_up: role_top_up(person, &team_sales, line_sales),
                top_bonus: top.bonus_for(person.id),
                corrections: LineData::amount(&data.corrections, person.id),
                paid: LineData::amount(&data.paid, person.id),
            });

            SalesPersonCommission {
                sales_person_id: person.id,
                full_name: person.full_name.clone(),
                role: SalesRole::from_code(&person.role),
                business_line_id: person.business_line_id,
                team_id: person.team_id,
                is_intern: person.is_intern,
                period,
                deals_count: sales.deals_count,
                deal_sales: sales.deal_sales,
                dops_count: sales.dops_count,
                dop_sales: sales.dop_sales,
                plan,
                rates,
                shifts: shifts.shifts,
                calls: shifts.calls,
                same_day_deals: sales.same_day_deals,
                payments,
                salary,
                allocations,
            }
        })
        .collect();

    let totals = CommissionTotals::from_members(&members);
    info!(
        business_line_id,
        %period,
        members = members.len(),
        salary = %totals.salary,
        "Computed business line commission"
    );

    Ok(LineCommission {
        business_line_id,
        period,
        members,
        rankings: top.rankings,
        totals,
    })
}

/// Commission of every salesperson of a business line
pub async fn business_line_commission(
    store: &dyn SalesStore,
    business_line_id: i64,
    period: Period,
) -> Result<LineCommission> {
    compute_line(store, business_line_id, period, None).await
}

/// Commission of a team's members plus team totals
pub async fn team_commission(
    store: &dyn SalesStore,
    team_id: i64,
    period: Period,
) -> Result<TeamCommission> {
    let team = store
        .team(team_id)
        .await?
        .ok_or_else(|| EngineError::not_found("team", team_id))?;

    let line = compute_line(store, team.business_line_id, period, None).await?;
    let members: Vec<SalesPersonCommission> = line
        .members
        .into_iter()
        .filter(|m| m.team_id == team.id)
        .collect();
    let totals = CommissionTotals::from_members(&members);

    Ok(TeamCommission {
        team_id: team.id,
        title: team.title,
        business_line_id: team.business_line_id,
        period,
        members,
        totals,
    })
}

/// Commission of one salesperson
pub async fn person_commission(
    store: &dyn SalesStore,
    sales_person_id: i64,
    period: Period,
) -> Result<SalesPersonCommission> {
    let person = store
        .sales_person(sales_person_id)
        .await?
        .ok_or_else(|| EngineError::not_found("sales person", sales_person_id))?;

    let line = compute_line(store, person.business_line_id, period, Some(&person)).await?;
    line.members
        .into_iter()
        .find(|m| m.sales_person_id == sales_person_id)
        .ok_or_else(|| EngineError::not_found("sales person", sales_person_id))
}
