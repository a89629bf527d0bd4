use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNLIMITED_USES: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCode {
    pub id: Uuid,
    pub code: String,
    pub discount_percentage: i32,
    pub max_uses: i32,
    pub current_uses: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl ReferralCode {
    pub fn is_unlimited(&self) -> bool {
        self.max_uses == UNLIMITED_USES
    }
}

/// Discount captured at reservation time. Settlement never re-reads the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSnapshot {
    pub referral_code_id: Uuid,
    pub code: String,
    pub discount_percentage: i32,
}

pub fn apply_discount(percent: i32, total: i64) -> i64 {
    let percent = i64::from(percent.clamp(0, 100));
    total - (total * percent) / 100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub subtotal: i64,
    pub discounted: i64,
    pub service_fee: i64,
    pub total: i64,
}

pub fn quote(unit_price: i64, amount: i64, discount_percentage: Option<i32>, fee_per_ticket: i64) -> PriceQuote {
    let subtotal = unit_price * amount;
    let discounted = match discount_percentage {
        Some(percent) => apply_discount(percent, subtotal),
        None => subtotal,
    };
    let service_fee = fee_per_ticket * amount;
    PriceQuote {
        subtotal,
        discounted,
        service_fee,
        total: discounted + service_fee,
    }
}
