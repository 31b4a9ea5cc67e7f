//! Statistics service functions with store access.

use std::collections::HashMap;

use chrono::NaiveDate;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::Result;
use crate::period::Period;
use crate::rules::BUSINESS_LINE_IDS;
use crate::store::{SalesStore, Scope};

use super::aggregation::{deals_at_share, Aggregate, PeriodInputs, PeriodStatistics};

/// Fetch one scope's rows and fold them
async fn aggregate_scope(store: &dyn SalesStore, scope: Scope, period: Period) -> Result<Aggregate> {
    let range = period.range();
    let (deals, add_ons, reports, ad_expenses, deliveries, people) = tokio::try_join!(
        store.deals(scope, range),
        store.add_ons(scope, range),
        store.manager_reports(scope, range),
        store.ad_expenses(scope, range),
        store.deliveries(scope, range),
        store.sales_people(scope, range),
    )?;

    let ids: Vec<i64> = people.iter().map(|p| p.id).collect();
    let plans = store.manager_plans(&ids, period).await?;
    // duplicates: the first plan row wins
    let mut plan_map: HashMap<i64, Decimal> = HashMap::new();
    for row in &plans {
        plan_map.entry(row.sales_person_id).or_insert(row.plan);
    }
    let plan: Decimal = plan_map.values().copied().sum();

    // a salesperson sees their own share of co-sold deals
    let deals = match scope {
        Scope::Person(id) => {
            let shares = store.participations(&[id], range).await?;
            deals_at_share(deals, &shares)
        }
        _ => deals,
    };

    debug!(?scope, %period, deals = deals.len(), reports = reports.len(), "Aggregating scope");

    Ok(Aggregate::from_inputs(
        period,
        &PeriodInputs {
            deals,
            add_ons,
            reports,
            ad_expenses,
            deliveries,
            plan,
        },
    ))
}

/// Statistics for a business line, a team or one salesperson.
///
/// `Scope::Company` is assembled from the business lines, see
/// [`company_statistics`].
pub async fn period_statistics(
    store: &dyn SalesStore,
    scope: Scope,
    period: Period,
    today: NaiveDate,
) -> Result<PeriodStatistics> {
    if scope == Scope::Company {
        return company_statistics(store, period, today).await;
    }
    let stats = aggregate_scope(store, scope, period)
        .await?
        .finish(scope, period, today);
    info!(?scope, %period, total_sales = %stats.metrics.total_sales, "Computed statistics");
    Ok(stats)
}

/// Whole-company statistics: every business line computed separately, then
/// summed, with ratios derived again from the summed totals
pub async fn company_statistics(
    store: &dyn SalesStore,
    period: Period,
    today: NaiveDate,
) -> Result<PeriodStatistics> {
    let per_line = try_join_all(
        BUSINESS_LINE_IDS
            .iter()
            .map(|&id| aggregate_scope(store, Scope::BusinessLine(id), period)),
    )
    .await?;

    let merged = per_line
        .iter()
        .fold(Aggregate::default(), |acc, line| acc.merge(line));
    let stats = merged.finish(Scope::Company, period, today);
    info!(%period, total_sales = %stats.metrics.total_sales, "Computed company statistics");
    Ok(stats)
}
