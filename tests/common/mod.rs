//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::NaiveDate;
use crm_finance::models::{
    AddOn, Deal, DealParticipant, Delivery, ManagerPlan, ManagerReport, Payment, SalesPerson, Team,
};
use crm_finance::rules::{MAKET_DESIGNER, PRIMARY_LINE_ID};
use crm_finance::{MemoryStore, Period};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn period(s: &str) -> Period {
    s.parse().unwrap()
}

pub fn person(id: i64, role: &str, line: i64, team: i64) -> SalesPerson {
    SalesPerson {
        id,
        full_name: format!("Менеджер {}", id),
        role: role.to_string(),
        business_line_id: line,
        team_id: team,
        is_intern: false,
        fired_at: None,
    }
}

pub fn deal(id: i64, price: Decimal, sale_date: NaiveDate, line: i64, team: i64) -> Deal {
    Deal {
        id,
        title: format!("Вывеска {}", id),
        price,
        sale_date,
        status: "Создана".to_string(),
        reservation: false,
        deleted_at: None,
        business_line_id: line,
        team_id: team,
        maket_type: MAKET_DESIGNER.to_string(),
        source: "ВК".to_string(),
        ad_tag: String::new(),
        first_contact_date: None,
    }
}

pub fn share(deal_id: i64, person: i64, price: Decimal) -> DealParticipant {
    DealParticipant {
        deal_id,
        sales_person_id: person,
        price,
    }
}

pub fn add_on(id: i64, deal_id: i64, person: i64, price: Decimal, sale_date: NaiveDate) -> AddOn {
    AddOn {
        id,
        deal_id,
        sales_person_id: person,
        price,
        sale_date,
        dop_type: "Блок питания".to_string(),
        business_line_id: PRIMARY_LINE_ID,
        team_id: 2,
    }
}

pub fn payment(id: i64, deal_id: i64, price: Decimal, date: NaiveDate) -> Payment {
    Payment {
        id,
        deal_id,
        price,
        date,
    }
}

pub fn report(id: i64, person: i64, date: NaiveDate, calls: i32) -> ManagerReport {
    ManagerReport {
        id,
        sales_person_id: person,
        date,
        calls,
        makets: 2,
        same_day_makets: 0,
        chat_redirects: 1,
        is_intern: false,
        shift_cost: dec!(1000),
        business_line_id: PRIMARY_LINE_ID,
        team_id: 2,
    }
}

pub fn plan(id: i64, person: i64, period: &str, amount: Decimal) -> ManagerPlan {
    ManagerPlan {
        id,
        sales_person_id: person,
        period: period.to_string(),
        plan: amount,
    }
}

pub fn shipped(id: i64, deal_id: i64, ship_date: NaiveDate, delivery_type: &str) -> Delivery {
    Delivery {
        id,
        deal_id,
        price: dec!(600),
        ship_date: Some(ship_date),
        delivered_date: None,
        status: Delivery::STATUS_SHIPPED.to_string(),
        delivery_type: delivery_type.to_string(),
        // filled from the deal on read
        business_line_id: 0,
        team_id: 0,
        deal_price: Decimal::ZERO,
        dops_price: Decimal::ZERO,
    }
}

/// Add `count` shifts for a person on consecutive days of January 2025
pub async fn add_shifts(store: &MemoryStore, first_id: i64, person: i64, count: u32) {
    for day in 1..=count {
        store
            .insert_report(report(first_id + i64::from(day), person, date(2025, 1, day), 5))
            .await;
    }
}

pub async fn team(store: &MemoryStore, id: i64, line: i64) {
    store
        .insert_team(Team {
            id,
            title: format!("Группа {}", id),
            business_line_id: line,
        })
        .await;
}
