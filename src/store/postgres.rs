//! PostgreSQL implementation of [`SalesStore`].
//!
//! Scope filters are bound as nullable parameters so each query has a single
//! statement text regardless of scope.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{
    AdExpense, AddOn, CategoryTotal, Deal, DealBundle, DealParticipant, Delivery, ManagerPlan,
    ManagerReport, Participation, Payment, ProductionCost, SalaryCorrection, SalaryPay,
    SalesPerson, Team,
};
use crate::period::{DateRange, Period};

use super::{SalesStore, Scope};

/// Store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool using the configured URL and size
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SalesStore for PgStore {
    async fn sales_person(&self, id: i64) -> Result<Option<SalesPerson>> {
        let person = sqlx::query_as::<_, SalesPerson>(
            r#"
            SELECT
                u.id, u.full_name, r.short_name AS role,
                u.workspace_id AS business_line_id, u.group_id AS team_id,
                u.is_intern, u.fired_at
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
              AND u.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(person)
    }

    async fn team(&self, id: i64) -> Result<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, title, workspace_id AS business_line_id
            FROM groups
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(team)
    }

    async fn sales_people(&self, scope: Scope, range: DateRange) -> Result<Vec<SalesPerson>> {
        let (line, team, person) = scope.filters();
        let people = sqlx::query_as::<_, SalesPerson>(
            r#"
            SELECT
                u.id, u.full_name, r.short_name AS role,
                u.workspace_id AS business_line_id, u.group_id AS team_id,
                u.is_intern, u.fired_at
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.deleted_at IS NULL
              AND (u.fired_at IS NULL OR u.fired_at::date >= $4)
              AND ($1::bigint IS NULL OR u.workspace_id = $1)
              AND ($2::bigint IS NULL OR u.group_id = $2)
              AND ($3::bigint IS NULL OR u.id = $3)
            ORDER BY u.id
            "#,
        )
        .bind(line)
        .bind(team)
        .bind(person)
        .bind(range.start)
        .fetch_all(&self.pool)
        .await?;

        Ok(people)
    }

    async fn deals(&self, scope: Scope, range: DateRange) -> Result<Vec<Deal>> {
        let (line, team, person) = scope.filters();
        let deals = sqlx::query_as::<_, Deal>(
            r#"
            SELECT
                d.id, d.title, d.price, d.sale_date, d.status, d.reservation, d.deleted_at,
                d.workspace_id AS business_line_id, d.group_id AS team_id,
                d.maket_type, d.source, d.ad_tag,
                c.first_contact_date
            FROM deals d
            LEFT JOIN clients c ON c.id = d.client_id
            WHERE d.sale_date >= $4 AND d.sale_date < $5
              AND d.reservation = false
              AND d.status <> 'Возврат'
              AND d.deleted_at IS NULL
              AND ($1::bigint IS NULL OR d.workspace_id = $1)
              AND ($2::bigint IS NULL OR d.group_id = $2)
              AND ($3::bigint IS NULL OR EXISTS (
                    SELECT 1 FROM deal_users du WHERE du.deal_id = d.id AND du.user_id = $3))
            ORDER BY d.sale_date, d.id
            "#,
        )
        .bind(line)
        .bind(team)
        .bind(person)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(deals)
    }

    async fn participations(
        &self,
        person_ids: &[i64],
        range: DateRange,
    ) -> Result<Vec<Participation>> {
        let rows = sqlx::query_as::<_, Participation>(
            r#"
            SELECT
                du.deal_id, du.user_id AS sales_person_id, du.price,
                d.price AS deal_price, d.sale_date, d.maket_type,
                c.first_contact_date,
                d.workspace_id AS business_line_id, d.group_id AS team_id
            FROM deal_users du
            JOIN deals d ON d.id = du.deal_id
            LEFT JOIN clients c ON c.id = d.client_id
            WHERE du.user_id = ANY($1)
              AND d.sale_date >= $2 AND d.sale_date < $3
              AND d.reservation = false
              AND d.status <> 'Возврат'
              AND d.deleted_at IS NULL
            ORDER BY d.sale_date, du.deal_id, du.user_id
            "#,
        )
        .bind(person_ids)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn add_ons(&self, scope: Scope, range: DateRange) -> Result<Vec<AddOn>> {
        let (line, team, person) = scope.filters();
        let add_ons = sqlx::query_as::<_, AddOn>(
            r#"
            SELECT
                o.id, o.deal_id, o.user_id AS sales_person_id, o.price, o.sale_date,
                o.type AS dop_type,
                o.workspace_id AS business_line_id, o.group_id AS team_id
            FROM dops o
            JOIN deals d ON d.id = o.deal_id
            WHERE o.sale_date >= $4 AND o.sale_date < $5
              AND o.deleted_at IS NULL
              AND d.reservation = false
              AND d.status <> 'Возврат'
              AND d.deleted_at IS NULL
              AND ($1::bigint IS NULL OR o.workspace_id = $1)
              AND ($2::bigint IS NULL OR o.group_id = $2)
              AND ($3::bigint IS NULL OR o.user_id = $3)
            ORDER BY o.sale_date, o.id
            "#,
        )
        .bind(line)
        .bind(team)
        .bind(person)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(add_ons)
    }

    async fn payments_for_person(&self, person_id: i64, range: DateRange) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.id, p.deal_id, p.price, p.date
            FROM payments p
            JOIN deals d ON d.id = p.deal_id
            WHERE p.date >= $2 AND p.date < $3
              AND d.reservation = false
              AND d.status <> 'Возврат'
              AND d.deleted_at IS NULL
              AND (
                EXISTS (SELECT 1 FROM deal_users du WHERE du.deal_id = d.id AND du.user_id = $1)
                OR EXISTS (
                    SELECT 1 FROM dops o
                    WHERE o.deal_id = d.id AND o.user_id = $1 AND o.deleted_at IS NULL)
              )
            ORDER BY p.date, p.id
            "#,
        )
        .bind(person_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn deal_bundles(&self, deal_ids: &[i64]) -> Result<Vec<DealBundle>> {
        if deal_ids.is_empty() {
            return Ok(Vec::new());
        }

        let deals_query = sqlx::query_as::<_, Deal>(
            r#"
            SELECT
                d.id, d.title, d.price, d.sale_date, d.status, d.reservation, d.deleted_at,
                d.workspace_id AS business_line_id, d.group_id AS team_id,
                d.maket_type, d.source, d.ad_tag,
                c.first_contact_date
            FROM deals d
            LEFT JOIN clients c ON c.id = d.client_id
            WHERE d.id = ANY($1)
              AND d.reservation = false
              AND d.status <> 'Возврат'
              AND d.deleted_at IS NULL
            ORDER BY d.id
            "#,
        )
        .bind(deal_ids)
        .fetch_all(&self.pool);

        let participants_query = sqlx::query_as::<_, DealParticipant>(
            r#"
            SELECT deal_id, user_id AS sales_person_id, price
            FROM deal_users
            WHERE deal_id = ANY($1)
            ORDER BY deal_id, id
            "#,
        )
        .bind(deal_ids)
        .fetch_all(&self.pool);

        let add_ons_query = sqlx::query_as::<_, AddOn>(
            r#"
            SELECT
                id, deal_id, user_id AS sales_person_id, price, sale_date,
                type AS dop_type,
                workspace_id AS business_line_id, group_id AS team_id
            FROM dops
            WHERE deal_id = ANY($1)
              AND deleted_at IS NULL
            ORDER BY deal_id, id
            "#,
        )
        .bind(deal_ids)
        .fetch_all(&self.pool);

        let payments_query = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, deal_id, price, date
            FROM payments
            WHERE deal_id = ANY($1)
            ORDER BY date, id
            "#,
        )
        .bind(deal_ids)
        .fetch_all(&self.pool);

        let (deals, participants, add_ons, payments) =
            tokio::try_join!(deals_query, participants_query, add_ons_query, payments_query)?;

        debug!(
            deals = deals.len(),
            payments = payments.len(),
            "Loaded deal bundles"
        );

        let mut participants_by_deal: HashMap<i64, Vec<DealParticipant>> = HashMap::new();
        for participant in participants {
            participants_by_deal
                .entry(participant.deal_id)
                .or_default()
                .push(participant);
        }
        let mut add_ons_by_deal: HashMap<i64, Vec<AddOn>> = HashMap::new();
        for add_on in add_ons {
            add_ons_by_deal.entry(add_on.deal_id).or_default().push(add_on);
        }
        let mut payments_by_deal: HashMap<i64, Vec<Payment>> = HashMap::new();
        for payment in payments {
            payments_by_deal.entry(payment.deal_id).or_default().push(payment);
        }

        let bundles = deals
            .into_iter()
            .map(|deal| DealBundle {
                participants: participants_by_deal.remove(&deal.id).unwrap_or_default(),
                add_ons: add_ons_by_deal.remove(&deal.id).unwrap_or_default(),
                payments: payments_by_deal.remove(&deal.id).unwrap_or_default(),
                deal,
            })
            .collect();

        Ok(bundles)
    }

    async fn manager_reports(&self, scope: Scope, range: DateRange) -> Result<Vec<ManagerReport>> {
        let (line, team, person) = scope.filters();
        let reports = sqlx::query_as::<_, ManagerReport>(
            r#"
            SELECT
                mr.id, mr.user_id AS sales_person_id, mr.date,
                mr.calls, mr.makets, mr.makets_day AS same_day_makets,
                mr.redirect_to_msg AS chat_redirects,
                mr.is_intern, mr.shift_cost,
                u.workspace_id AS business_line_id, u.group_id AS team_id
            FROM managers_reports mr
            JOIN users u ON u.id = mr.user_id
            WHERE mr.date >= $4 AND mr.date < $5
              AND ($1::bigint IS NULL OR u.workspace_id = $1)
              AND ($2::bigint IS NULL OR u.group_id = $2)
              AND ($3::bigint IS NULL OR u.id = $3)
            ORDER BY mr.date, mr.id
            "#,
        )
        .bind(line)
        .bind(team)
        .bind(person)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    async fn manager_plans(&self, person_ids: &[i64], period: Period) -> Result<Vec<ManagerPlan>> {
        let plans = sqlx::query_as::<_, ManagerPlan>(
            r#"
            SELECT id, user_id AS sales_person_id, period, plan
            FROM managers_plans
            WHERE user_id = ANY($1)
              AND period = $2
            ORDER BY id
            "#,
        )
        .bind(person_ids)
        .bind(period.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    async fn salary_pays(&self, person_ids: &[i64], period: Period) -> Result<Vec<SalaryPay>> {
        let pays = sqlx::query_as::<_, SalaryPay>(
            r#"
            SELECT id, user_id AS sales_person_id, period, price
            FROM salary_pays
            WHERE user_id = ANY($1)
              AND period = $2
            ORDER BY id
            "#,
        )
        .bind(person_ids)
        .bind(period.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(pays)
    }

    async fn salary_corrections(
        &self,
        person_ids: &[i64],
        period: Period,
    ) -> Result<Vec<SalaryCorrection>> {
        let corrections = sqlx::query_as::<_, SalaryCorrection>(
            r#"
            SELECT id, user_id AS sales_person_id, period, price, type AS correction_type
            FROM salary_corrections
            WHERE user_id = ANY($1)
              AND period = $2
            ORDER BY id
            "#,
        )
        .bind(person_ids)
        .bind(period.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(corrections)
    }

    async fn ad_expenses(&self, scope: Scope, range: DateRange) -> Result<Vec<AdExpense>> {
        if let Scope::Person(_) = scope {
            return Ok(Vec::new());
        }
        let (line, team, _) = scope.filters();
        let expenses = sqlx::query_as::<_, AdExpense>(
            r#"
            SELECT
                id, date, price, source,
                workspace_id AS business_line_id, group_id AS team_id
            FROM ad_expenses
            WHERE date >= $3 AND date < $4
              AND ($1::bigint IS NULL OR workspace_id = $1)
              AND ($2::bigint IS NULL OR group_id = $2)
            ORDER BY date, id
            "#,
        )
        .bind(line)
        .bind(team)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    async fn deliveries(&self, scope: Scope, range: DateRange) -> Result<Vec<Delivery>> {
        let (line, team, person) = scope.filters();
        let deliveries = sqlx::query_as::<_, Delivery>(
            r#"
            SELECT
                dl.id, dl.deal_id, dl.price, dl.ship_date, dl.delivered_date,
                dl.status, dl.type AS delivery_type,
                d.workspace_id AS business_line_id, d.group_id AS team_id,
                d.price AS deal_price,
                COALESCE((
                    SELECT SUM(o.price) FROM dops o
                    WHERE o.deal_id = d.id AND o.deleted_at IS NULL
                ), 0) AS dops_price
            FROM deliveries dl
            JOIN deals d ON d.id = dl.deal_id
            WHERE ((dl.ship_date >= $4 AND dl.ship_date < $5)
                OR (dl.delivered_date >= $4 AND dl.delivered_date < $5))
              AND d.reservation = false
              AND d.status <> 'Возврат'
              AND d.deleted_at IS NULL
              AND ($1::bigint IS NULL OR d.workspace_id = $1)
              AND ($2::bigint IS NULL OR d.group_id = $2)
              AND ($3::bigint IS NULL OR EXISTS (
                    SELECT 1 FROM deal_users du WHERE du.deal_id = d.id AND du.user_id = $3))
            ORDER BY dl.ship_date, dl.id
            "#,
        )
        .bind(line)
        .bind(team)
        .bind(person)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(deliveries)
    }

    async fn production_costs(&self, deal_ids: &[i64]) -> Result<Vec<ProductionCost>> {
        if deal_ids.is_empty() {
            return Ok(Vec::new());
        }
        let costs = sqlx::query_as::<_, ProductionCost>(
            r#"
            SELECT deal_id, kind, name, amount, COALESCE(penalty, 0) AS penalty
            FROM production_costs
            WHERE deal_id = ANY($1)
            ORDER BY deal_id
            "#,
        )
        .bind(deal_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(costs)
    }

    async fn category_totals(&self, period: Period) -> Result<Vec<CategoryTotal>> {
        let range = period.range();
        let totals = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT category_id, project_id, COALESCE(SUM(amount), 0) AS amount
            FROM operation_positions
            WHERE date >= $1 AND date < $2
              AND category_id IS NOT NULL
            GROUP BY category_id, project_id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }
}
