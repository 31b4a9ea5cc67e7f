mod common;

use std::sync::Arc;

use common::*;
use crm_finance::models::{Delivery, ProductionCost};
use crm_finance::pnl;
use crm_finance::rules::{categories, PRIMARY_LINE_ID, PRIMARY_PROJECT_ID, SECONDARY_LINE_ID};
use crm_finance::{Engine, EngineConfig, MemoryStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn cost(deal_id: i64, kind: &str, amount: Decimal, penalty: Decimal) -> ProductionCost {
    ProductionCost {
        deal_id,
        kind: kind.to_string(),
        name: String::new(),
        amount,
        penalty,
    }
}

/// January 2025: one paid deal per business line, both shipped in the month
async fn january() -> MemoryStore {
    let store = MemoryStore::new();
    team(&store, 2, PRIMARY_LINE_ID).await;
    store.insert_person(person(7, "MOP", PRIMARY_LINE_ID, 2)).await;

    store
        .insert_deal(
            deal(1, dec!(100000), date(2025, 1, 10), PRIMARY_LINE_ID, 2),
            vec![share(1, 7, dec!(100000))],
        )
        .await;
    store.insert_payment(payment(1, 1, dec!(100000), date(2025, 1, 12))).await;
    store
        .insert_deal(
            deal(2, dec!(50000), date(2025, 1, 11), SECONDARY_LINE_ID, 5),
            Vec::new(),
        )
        .await;

    store.insert_delivery(shipped(1, 1, date(2025, 1, 20), "СДЭК")).await;
    store
        .insert_delivery(shipped(2, 2, date(2025, 1, 21), Delivery::TYPE_FREE))
        .await;

    store.insert_production_cost(cost(1, "board", dec!(10000), dec!(0))).await;
    store.insert_production_cost(cost(1, "assembler", dec!(3000), dec!(500))).await;
    store.insert_production_cost(cost(2, "film", dec!(1000), dec!(0))).await;

    let posted = date(2025, 1, 15);
    store
        .insert_posting(posted, categories::RENT, Some(PRIMARY_PROJECT_ID), dec!(5000))
        .await;
    store
        .insert_posting(posted, categories::AD_SPEND, Some(PRIMARY_PROJECT_ID), dec!(2000))
        .await;
    store
        .insert_posting(posted, categories::ACCOUNTING, None, dec!(1000))
        .await;
    store
        .insert_posting(date(2024, 12, 5), categories::VK_ADS, None, dec!(10000))
        .await;
    store
}

#[tokio::test]
async fn test_statement_waterfall() {
    let store = january().await;
    let statement = pnl::pnl_statement(&store, period("2025-01")).await.unwrap();

    let primary = &statement.lines[0];
    assert_eq!(primary.business_line_id, PRIMARY_LINE_ID);
    assert_eq!(primary.revenue, dec!(100000));
    assert_eq!(primary.cogs.board, dec!(10000));
    assert_eq!(primary.cogs.assembler, dec!(2500));
    assert_eq!(primary.cogs.rent, dec!(5000));
    assert_eq!(primary.cogs.total, dec!(17500));
    assert_eq!(primary.vat, dec!(5000));
    // salary of the line's salespeople: 3% of the paid deal
    assert_eq!(primary.commercial.sales_compensation, dec!(3000));
    assert_eq!(primary.commercial.total, dec!(5000));
    assert_eq!(primary.marginal_income, dec!(72500));

    let secondary = &statement.lines[1];
    assert_eq!(secondary.revenue, dec!(50000));
    assert_eq!(secondary.cogs.free_delivery, dec!(600));
    assert_eq!(secondary.cogs.total, dec!(1600));
    assert_eq!(secondary.marginal_income, dec!(45900));

    assert_eq!(statement.revenue, dec!(150000));
    assert_eq!(statement.marginal_income, dec!(118400));
    assert_eq!(statement.opex.total, dec!(1000));
    assert_eq!(statement.ebitda, dec!(117400));
    // 17% of December's VK spend
    assert_eq!(statement.vk_cashback, dec!(1700));
    assert_eq!(statement.profit_before_tax, dec!(119100));
    assert_eq!(statement.taxable_base, dec!(142500));
    assert_eq!(statement.taxes_profit, dec!(1425));
    assert_eq!(statement.net_profit, dec!(117675));
}

#[tokio::test]
async fn test_statement_subtotals_add_up() {
    let store = january().await;
    let s = pnl::pnl_statement(&store, period("2025-01")).await.unwrap();

    assert_eq!(s.gross_profit, s.revenue - s.cogs);
    assert_eq!(
        s.ebitda,
        s.marginal_income - s.opex.total - s.unallocated.total
    );
    assert_eq!(
        s.net_profit,
        s.profit_before_tax - s.taxes_profit - s.taxes_payroll
    );
    let line_revenue: Decimal = s.lines.iter().map(|l| l.revenue).sum();
    assert_eq!(line_revenue, s.revenue);
}

#[tokio::test]
async fn test_every_posting_reaches_the_statement() {
    let store = MemoryStore::new();
    let posted = date(2025, 1, 15);
    store
        .insert_posting(posted, categories::VK_ADS, Some(PRIMARY_PROJECT_ID), dec!(10000))
        .await;
    store.insert_posting(posted, categories::AD_SPEND, None, dec!(7000)).await;
    store.insert_posting(posted, categories::RENT, None, dec!(3000)).await;

    let january = pnl::pnl_statement(&store, period("2025-01")).await.unwrap();
    assert_eq!(january.lines[0].commercial.vk_ads, dec!(10000));
    assert_eq!(january.lines[0].marginal_income, dec!(-10000));
    assert_eq!(january.unallocated.total, dec!(10000));
    assert_eq!(january.ebitda, dec!(-20000));
    assert_eq!(january.net_profit, dec!(-20000));

    let february = pnl::pnl_statement(&store, period("2025-02")).await.unwrap();
    assert_eq!(february.vk_cashback, dec!(1700));
    assert_eq!(february.net_profit, dec!(1700));
}

#[tokio::test]
async fn test_trailing_statements_oldest_first() {
    let store = january().await;
    let statements = pnl::pnl_trailing(&store, period("2025-01"), 3).await.unwrap();

    let periods: Vec<String> = statements.iter().map(|s| s.period.to_string()).collect();
    assert_eq!(periods, vec!["2024-11", "2024-12", "2025-01"]);
    assert_eq!(statements[0].revenue, dec!(0));
    assert_eq!(statements[0].ebitda_margin, dec!(0));
    assert_eq!(statements[2].revenue, dec!(150000));
}

#[tokio::test]
async fn test_engine_reuses_closed_period_snapshot() {
    let engine = Engine::new(Arc::new(january().await), EngineConfig::default());

    let first = engine.pnl(period("2025-01")).await.unwrap();
    let second = engine.pnl(period("2025-01")).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let trailing = engine.pnl_trailing(period("2025-01"), Some(2)).await.unwrap();
    assert_eq!(trailing.len(), 2);
    assert!(Arc::ptr_eq(&trailing[1], &first));
}
