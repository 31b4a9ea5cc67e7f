//! In-memory store
//!
//! Mirrors the filtering rules of the Postgres queries. Used by tests and by
//! tooling that replays exported data.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{
    AdExpense, AddOn, CategoryTotal, Deal, DealBundle, DealParticipant, Delivery, ManagerPlan,
    ManagerReport, Participation, Payment, ProductionCost, SalaryCorrection, SalaryPay,
    SalesPerson, Team,
};
use crate::period::{DateRange, Period};

use super::{SalesStore, Scope};

#[derive(Debug, Clone)]
struct Posting {
    date: NaiveDate,
    category_id: i64,
    project_id: Option<i64>,
    amount: Decimal,
}

#[derive(Debug, Default)]
struct Tables {
    people: Vec<SalesPerson>,
    teams: Vec<Team>,
    deals: Vec<Deal>,
    participants: Vec<DealParticipant>,
    add_ons: Vec<AddOn>,
    payments: Vec<Payment>,
    reports: Vec<ManagerReport>,
    plans: Vec<ManagerPlan>,
    pays: Vec<SalaryPay>,
    corrections: Vec<SalaryCorrection>,
    ad_expenses: Vec<AdExpense>,
    deliveries: Vec<Delivery>,
    production_costs: Vec<ProductionCost>,
    postings: Vec<Posting>,
}

impl Tables {
    fn countable_deal(&self, deal_id: i64) -> Option<&Deal> {
        self.deals
            .iter()
            .find(|d| d.id == deal_id && d.is_countable())
    }

    fn shares_deal(&self, person_id: i64, deal_id: i64) -> bool {
        self.participants
            .iter()
            .any(|p| p.deal_id == deal_id && p.sales_person_id == person_id)
    }

    fn person(&self, id: i64) -> Option<&SalesPerson> {
        self.people.iter().find(|p| p.id == id)
    }
}

/// Thread-safe in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_person(&self, person: SalesPerson) {
        self.tables.write().await.people.push(person);
    }

    pub async fn insert_team(&self, team: Team) {
        self.tables.write().await.teams.push(team);
    }

    /// Insert a deal together with its participant shares
    pub async fn insert_deal(&self, deal: Deal, participants: Vec<DealParticipant>) {
        let mut tables = self.tables.write().await;
        tables.deals.push(deal);
        tables.participants.extend(participants);
    }

    pub async fn insert_add_on(&self, add_on: AddOn) {
        self.tables.write().await.add_ons.push(add_on);
    }

    pub async fn insert_payment(&self, payment: Payment) {
        self.tables.write().await.payments.push(payment);
    }

    pub async fn insert_report(&self, report: ManagerReport) {
        self.tables.write().await.reports.push(report);
    }

    pub async fn insert_plan(&self, plan: ManagerPlan) {
        self.tables.write().await.plans.push(plan);
    }

    pub async fn insert_salary_pay(&self, pay: SalaryPay) {
        self.tables.write().await.pays.push(pay);
    }

    pub async fn insert_correction(&self, correction: SalaryCorrection) {
        self.tables.write().await.corrections.push(correction);
    }

    pub async fn insert_ad_expense(&self, expense: AdExpense) {
        self.tables.write().await.ad_expenses.push(expense);
    }

    /// Deal-derived fields (line, team, deal and add-on value) are filled on read
    pub async fn insert_delivery(&self, delivery: Delivery) {
        self.tables.write().await.deliveries.push(delivery);
    }

    pub async fn insert_production_cost(&self, cost: ProductionCost) {
        self.tables.write().await.production_costs.push(cost);
    }

    /// Record a categorized bank-statement posting
    pub async fn insert_posting(
        &self,
        date: NaiveDate,
        category_id: i64,
        project_id: Option<i64>,
        amount: Decimal,
    ) {
        self.tables.write().await.postings.push(Posting {
            date,
            category_id,
            project_id,
            amount,
        });
    }
}

#[async_trait]
impl SalesStore for MemoryStore {
    async fn sales_person(&self, id: i64) -> Result<Option<SalesPerson>> {
        Ok(self.tables.read().await.person(id).cloned())
    }

    async fn team(&self, id: i64) -> Result<Option<Team>> {
        let tables = self.tables.read().await;
        Ok(tables.teams.iter().find(|t| t.id == id).cloned())
    }

    async fn sales_people(&self, scope: Scope, range: DateRange) -> Result<Vec<SalesPerson>> {
        let tables = self.tables.read().await;
        let mut people: Vec<SalesPerson> = tables
            .people
            .iter()
            .filter(|p| p.active_on_or_after(range.start))
            .filter(|p| match scope {
                Scope::Person(id) => p.id == id,
                _ => scope.covers(p.business_line_id, p.team_id),
            })
            .cloned()
            .collect();
        people.sort_by_key(|p| p.id);
        Ok(people)
    }

    async fn deals(&self, scope: Scope, range: DateRange) -> Result<Vec<Deal>> {
        let tables = self.tables.read().await;
        let mut deals: Vec<Deal> = tables
            .deals
            .iter()
            .filter(|d| d.is_countable() && range.contains(d.sale_date))
            .filter(|d| match scope {
                Scope::Person(id) => tables.shares_deal(id, d.id),
                _ => scope.covers(d.business_line_id, d.team_id),
            })
            .cloned()
            .collect();
        deals.sort_by_key(|d| (d.sale_date, d.id));
        Ok(deals)
    }

    async fn participations(
        &self,
        person_ids: &[i64],
        range: DateRange,
    ) -> Result<Vec<Participation>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Participation> = tables
            .participants
            .iter()
            .filter(|p| person_ids.contains(&p.sales_person_id))
            .filter_map(|p| {
                let deal = tables.countable_deal(p.deal_id)?;
                if !range.contains(deal.sale_date) {
                    return None;
                }
                Some(Participation {
                    deal_id: deal.id,
                    sales_person_id: p.sales_person_id,
                    price: p.price,
                    deal_price: deal.price,
                    sale_date: deal.sale_date,
                    maket_type: deal.maket_type.clone(),
                    first_contact_date: deal.first_contact_date,
                    business_line_id: deal.business_line_id,
                    team_id: deal.team_id,
                })
            })
            .collect();
        rows.sort_by_key(|r| (r.sale_date, r.deal_id, r.sales_person_id));
        Ok(rows)
    }

    async fn add_ons(&self, scope: Scope, range: DateRange) -> Result<Vec<AddOn>> {
        let tables = self.tables.read().await;
        let mut add_ons: Vec<AddOn> = tables
            .add_ons
            .iter()
            .filter(|o| range.contains(o.sale_date))
            .filter(|o| tables.countable_deal(o.deal_id).is_some())
            .filter(|o| match scope {
                Scope::Person(id) => o.sales_person_id == id,
                _ => scope.covers(o.business_line_id, o.team_id),
            })
            .cloned()
            .collect();
        add_ons.sort_by_key(|o| (o.sale_date, o.id));
        Ok(add_ons)
    }

    async fn payments_for_person(&self, person_id: i64, range: DateRange) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .iter()
            .filter(|p| range.contains(p.date))
            .filter(|p| tables.countable_deal(p.deal_id).is_some())
            .filter(|p| {
                tables.shares_deal(person_id, p.deal_id)
                    || tables
                        .add_ons
                        .iter()
                        .any(|o| o.deal_id == p.deal_id && o.sales_person_id == person_id)
            })
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.date, p.id));
        Ok(payments)
    }

    async fn deal_bundles(&self, deal_ids: &[i64]) -> Result<Vec<DealBundle>> {
        let tables = self.tables.read().await;
        let mut bundles: Vec<DealBundle> = tables
            .deals
            .iter()
            .filter(|d| deal_ids.contains(&d.id) && d.is_countable())
            .map(|deal| {
                let mut payments: Vec<Payment> = tables
                    .payments
                    .iter()
                    .filter(|p| p.deal_id == deal.id)
                    .cloned()
                    .collect();
                payments.sort_by_key(|p| (p.date, p.id));
                DealBundle {
                    deal: deal.clone(),
                    participants: tables
                        .participants
                        .iter()
                        .filter(|p| p.deal_id == deal.id)
                        .cloned()
                        .collect(),
                    add_ons: tables
                        .add_ons
                        .iter()
                        .filter(|o| o.deal_id == deal.id)
                        .cloned()
                        .collect(),
                    payments,
                }
            })
            .collect();
        bundles.sort_by_key(|b| b.deal.id);
        Ok(bundles)
    }

    async fn manager_reports(&self, scope: Scope, range: DateRange) -> Result<Vec<ManagerReport>> {
        let tables = self.tables.read().await;
        let mut reports: Vec<ManagerReport> = tables
            .reports
            .iter()
            .filter(|r| range.contains(r.date))
            .filter(|r| match scope {
                Scope::Person(id) => r.sales_person_id == id,
                _ => scope.covers(r.business_line_id, r.team_id),
            })
            .cloned()
            .collect();
        reports.sort_by_key(|r| (r.date, r.id));
        Ok(reports)
    }

    async fn manager_plans(&self, person_ids: &[i64], period: Period) -> Result<Vec<ManagerPlan>> {
        let key = period.to_string();
        let tables = self.tables.read().await;
        Ok(tables
            .plans
            .iter()
            .filter(|p| person_ids.contains(&p.sales_person_id) && p.period == key)
            .cloned()
            .collect())
    }

    async fn salary_pays(&self, person_ids: &[i64], period: Period) -> Result<Vec<SalaryPay>> {
        let key = period.to_string();
        let tables = self.tables.read().await;
        Ok(tables
            .pays
            .iter()
            .filter(|p| person_ids.contains(&p.sales_person_id) && p.period == key)
            .cloned()
            .collect())
    }

    async fn salary_corrections(
        &self,
        person_ids: &[i64],
        period: Period,
    ) -> Result<Vec<SalaryCorrection>> {
        let key = period.to_string();
        let tables = self.tables.read().await;
        Ok(tables
            .corrections
            .iter()
            .filter(|c| person_ids.contains(&c.sales_person_id) && c.period == key)
            .cloned()
            .collect())
    }

    async fn ad_expenses(&self, scope: Scope, range: DateRange) -> Result<Vec<AdExpense>> {
        if let Scope::Person(_) = scope {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        Ok(tables
            .ad_expenses
            .iter()
            .filter(|e| range.contains(e.date) && scope.covers(e.business_line_id, e.team_id))
            .cloned()
            .collect())
    }

    async fn deliveries(&self, scope: Scope, range: DateRange) -> Result<Vec<Delivery>> {
        let tables = self.tables.read().await;
        let in_range = |date: Option<NaiveDate>| date.map(|d| range.contains(d)).unwrap_or(false);
        let mut deliveries: Vec<Delivery> = tables
            .deliveries
            .iter()
            .filter(|dl| in_range(dl.ship_date) || in_range(dl.delivered_date))
            .filter_map(|dl| {
                let deal = tables.countable_deal(dl.deal_id)?;
                let covered = match scope {
                    Scope::Person(id) => tables.shares_deal(id, deal.id),
                    _ => scope.covers(deal.business_line_id, deal.team_id),
                };
                if !covered {
                    return None;
                }
                let dops_price = tables
                    .add_ons
                    .iter()
                    .filter(|o| o.deal_id == deal.id)
                    .map(|o| o.price)
                    .sum();
                Some(Delivery {
                    business_line_id: deal.business_line_id,
                    team_id: deal.team_id,
                    deal_price: deal.price,
                    dops_price,
                    ..dl.clone()
                })
            })
            .collect();
        deliveries.sort_by_key(|d| (d.ship_date, d.id));
        Ok(deliveries)
    }

    async fn production_costs(&self, deal_ids: &[i64]) -> Result<Vec<ProductionCost>> {
        let tables = self.tables.read().await;
        Ok(tables
            .production_costs
            .iter()
            .filter(|c| deal_ids.contains(&c.deal_id))
            .cloned()
            .collect())
    }

    async fn category_totals(&self, period: Period) -> Result<Vec<CategoryTotal>> {
        let tables = self.tables.read().await;
        let mut sums: HashMap<(i64, Option<i64>), Decimal> = HashMap::new();
        for posting in tables.postings.iter().filter(|p| period.contains(p.date)) {
            *sums
                .entry((posting.category_id, posting.project_id))
                .or_insert(Decimal::ZERO) += posting.amount;
        }
        let mut totals: Vec<CategoryTotal> = sums
            .into_iter()
            .map(|((category_id, project_id), amount)| CategoryTotal {
                category_id,
                project_id,
                amount,
            })
            .collect();
        totals.sort_by_key(|t| (t.category_id, t.project_id));
        Ok(totals)
    }
}
