//! P&L service functions with store access.

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::commission::services::business_line_commission;
use crate::error::Result;
use crate::models::{Delivery, ProductionCost};
use crate::period::Period;
use crate::rules::BUSINESS_LINE_IDS;
use crate::store::{SalesStore, Scope};

use super::categories::{project_for_line, CategoryBook};
use super::waterfall::{build_line, build_statement, shipped_deals, LineInputs, PnlStatement};

/// Statement for one period.
///
/// Deliveries, both category books and every line's commission are fetched
/// together; the waterfall is built once all of them are in.
pub async fn pnl_statement(store: &dyn SalesStore, period: Period) -> Result<PnlStatement> {
    let (deliveries, current, previous, commissions) = tokio::try_join!(
        store.deliveries(Scope::Company, period.range()),
        store.category_totals(period),
        store.category_totals(period.prev()),
        try_join_all(
            BUSINESS_LINE_IDS
                .iter()
                .map(|&id| business_line_commission(store, id, period)),
        ),
    )?;

    let shipped: Vec<_> = BUSINESS_LINE_IDS
        .iter()
        .map(|&id| {
            let own: Vec<Delivery> = deliveries
                .iter()
                .filter(|d| d.business_line_id == id)
                .cloned()
                .collect();
            shipped_deals(&own, period)
        })
        .collect();

    let deal_ids: Vec<i64> = shipped.iter().flat_map(|s| s.deal_ids.iter().copied()).collect();
    let costs = store.production_costs(&deal_ids).await?;
    debug!(%period, shipped_deals = deal_ids.len(), cost_rows = costs.len(), "Loaded P&L inputs");

    let current = CategoryBook::from_totals(&current);
    let previous = CategoryBook::from_totals(&previous);

    let lines = BUSINESS_LINE_IDS
        .iter()
        .zip(shipped)
        .zip(&commissions)
        .map(|((&id, shipped), commission)| {
            let own_costs: Vec<ProductionCost> = costs
                .iter()
                .filter(|c| shipped.deal_ids.contains(&c.deal_id))
                .cloned()
                .collect();
            build_line(
                &LineInputs {
                    business_line_id: id,
                    project_id: project_for_line(id),
                    shipped,
                    costs: own_costs,
                    sales_compensation: commission.totals.salary,
                },
                &current,
            )
        })
        .collect();

    let statement = build_statement(period, lines, &current, &previous);
    info!(
        %period,
        revenue = %statement.revenue,
        net_profit = %statement.net_profit,
        "Computed P&L statement"
    );
    Ok(statement)
}

/// Statements for the `count` periods ending at `period`, oldest first
pub async fn pnl_trailing(
    store: &dyn SalesStore,
    period: Period,
    count: usize,
) -> Result<Vec<PnlStatement>> {
    try_join_all(
        period
            .trailing(count)
            .into_iter()
            .map(|p| pnl_statement(store, p)),
    )
    .await
}
