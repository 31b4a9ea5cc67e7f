//! Sales-side entities: people, deals, add-ons, payments, deliveries, reports.
//!
//! These models use sqlx's FromRow derive for direct database deserialization.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Deal status marking a returned order
pub const STATUS_RETURNED: &str = "Возврат";

/// Salary correction type that reduces pay
pub const CORRECTION_DEDUCTION: &str = "Вычет";

/// SalesPerson from users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SalesPerson {
    pub id: i64,
    pub full_name: String,
    /// Short role code: "MOP", "ROP", "DO", "MOV", ...
    pub role: String,
    pub business_line_id: i64,
    pub team_id: i64,
    pub is_intern: bool,
    pub fired_at: Option<DateTime<Utc>>,
}

impl SalesPerson {
    /// Whether the person was still employed at some point on or after `date`
    pub fn active_on_or_after(&self, date: NaiveDate) -> bool {
        match self.fired_at {
            Some(fired) => fired.date_naive() >= date,
            None => true,
        }
    }
}

/// Team (sales group) from groups
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub title: String,
    pub business_line_id: i64,
}

/// Deal from deals, joined with the client's first contact date
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub title: String,
    pub price: Decimal,
    pub sale_date: NaiveDate,
    pub status: String,
    pub reservation: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub business_line_id: i64,
    pub team_id: i64,
    pub maket_type: String,
    pub source: String,
    pub ad_tag: String,
    pub first_contact_date: Option<NaiveDate>,
}

impl Deal {
    /// Reservations, returns and soft-deleted deals never count toward revenue
    pub fn is_countable(&self) -> bool {
        !self.reservation && self.status != STATUS_RETURNED && self.deleted_at.is_none()
    }

    /// Sold on the same day the client first got in touch
    pub fn is_same_day(&self) -> bool {
        self.first_contact_date == Some(self.sale_date)
    }
}

/// DealParticipant ("dealer") from deal_users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DealParticipant {
    pub deal_id: i64,
    pub sales_person_id: i64,
    /// This person's share of the deal price
    pub price: Decimal,
}

/// A participant's share joined with the deal fields commission needs
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Participation {
    pub deal_id: i64,
    pub sales_person_id: i64,
    pub price: Decimal,
    pub deal_price: Decimal,
    pub sale_date: NaiveDate,
    pub maket_type: String,
    pub first_contact_date: Option<NaiveDate>,
    pub business_line_id: i64,
    pub team_id: i64,
}

impl Participation {
    pub fn is_same_day(&self) -> bool {
        self.first_contact_date == Some(self.sale_date)
    }
}

/// AddOn ("dop") from dops
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AddOn {
    pub id: i64,
    pub deal_id: i64,
    pub sales_person_id: i64,
    pub price: Decimal,
    pub sale_date: NaiveDate,
    pub dop_type: String,
    pub business_line_id: i64,
    pub team_id: i64,
}

/// Payment from payments
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub deal_id: i64,
    pub price: Decimal,
    pub date: NaiveDate,
}

/// Delivery from deliveries, joined with the value of its deal
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub deal_id: i64,
    /// Carrier cost of the delivery itself
    pub price: Decimal,
    pub ship_date: Option<NaiveDate>,
    pub delivered_date: Option<NaiveDate>,
    pub status: String,
    pub delivery_type: String,
    pub business_line_id: i64,
    pub team_id: i64,
    pub deal_price: Decimal,
    /// Sum of the deal's add-on prices
    pub dops_price: Decimal,
}

impl Delivery {
    pub const STATUS_SHIPPED: &'static str = "Отправлена";
    pub const STATUS_DELIVERED: &'static str = "Вручена";
    pub const STATUS_RETURNED: &'static str = "Возврат";
    pub const TYPE_FREE: &'static str = "Бесплатно";

    /// Value of the shipped order: deal price plus its add-ons
    pub fn order_value(&self) -> Decimal {
        self.deal_price + self.dops_price
    }

    pub fn is_shipped(&self) -> bool {
        self.status == Self::STATUS_SHIPPED || self.status == Self::STATUS_DELIVERED
    }

    pub fn is_delivered(&self) -> bool {
        self.status == Self::STATUS_DELIVERED
    }

    pub fn is_free(&self) -> bool {
        self.delivery_type == Self::TYPE_FREE
    }
}

/// ManagerReport from managers_reports: one row per shift
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ManagerReport {
    pub id: i64,
    pub sales_person_id: i64,
    pub date: NaiveDate,
    /// Inbound leads
    pub calls: i32,
    pub makets: i32,
    pub same_day_makets: i32,
    pub chat_redirects: i32,
    pub is_intern: bool,
    pub shift_cost: Decimal,
    pub business_line_id: i64,
    pub team_id: i64,
}

/// ManagerPlan from managers_plans
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ManagerPlan {
    pub id: i64,
    pub sales_person_id: i64,
    pub period: String,
    pub plan: Decimal,
}

/// SalaryPay from salary_pays
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SalaryPay {
    pub id: i64,
    pub sales_person_id: i64,
    pub period: String,
    pub price: Decimal,
}

/// SalaryCorrection from salary_corrections
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SalaryCorrection {
    pub id: i64,
    pub sales_person_id: i64,
    pub period: String,
    pub price: Decimal,
    pub correction_type: String,
}

impl SalaryCorrection {
    /// Signed effect on salary
    pub fn signed_amount(&self) -> Decimal {
        if self.correction_type == CORRECTION_DEDUCTION {
            -self.price
        } else {
            self.price
        }
    }
}

/// AdExpense from ad_expenses: marketing spend per day and channel
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdExpense {
    pub id: i64,
    pub date: NaiveDate,
    pub price: Decimal,
    pub source: String,
    pub business_line_id: i64,
    pub team_id: i64,
}

/// A deal with every row the proration allocator needs.
///
/// `payments` holds every payment ever recorded against the deal.
#[derive(Debug, Clone)]
pub struct DealBundle {
    pub deal: Deal,
    pub participants: Vec<DealParticipant>,
    pub add_ons: Vec<AddOn>,
    pub payments: Vec<Payment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn deal() -> Deal {
        Deal {
            id: 1,
            title: "Вывеска".to_string(),
            price: dec!(100000),
            sale_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            status: "Создана".to_string(),
            reservation: false,
            deleted_at: None,
            business_line_id: 1,
            team_id: 2,
            maket_type: "Дизайнерский".to_string(),
            source: "ВК".to_string(),
            ad_tag: "tag".to_string(),
            first_contact_date: None,
        }
    }

    #[test]
    fn test_deal_exclusions() {
        assert!(deal().is_countable());
        assert!(!Deal { reservation: true, ..deal() }.is_countable());
        assert!(!Deal { status: STATUS_RETURNED.to_string(), ..deal() }.is_countable());
        assert!(!Deal { deleted_at: Some(Utc::now()), ..deal() }.is_countable());
    }

    #[test]
    fn test_same_day() {
        let same = Deal { first_contact_date: Some(deal().sale_date), ..deal() };
        assert!(same.is_same_day());
        assert!(!deal().is_same_day());
    }

    #[test]
    fn test_correction_sign() {
        let mut correction = SalaryCorrection {
            id: 1,
            sales_person_id: 1,
            period: "2025-01".to_string(),
            price: dec!(500),
            correction_type: CORRECTION_DEDUCTION.to_string(),
        };
        assert_eq!(correction.signed_amount(), dec!(-500));
        correction.correction_type = "Прибавка".to_string();
        assert_eq!(correction.signed_amount(), dec!(500));
    }
}
