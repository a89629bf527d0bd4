use crate::error::ReservationError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub mod flip;
pub mod mock;

#[derive(Debug, Clone)]
pub struct CreateBillRequest {
    pub title: String,
    pub amount: i64,
    pub bill_type: String,
    pub expired_date: DateTime<FixedOffset>,
    pub redirect_url: String,
    pub is_address_required: bool,
    pub is_phone_number_required: bool,
}

impl CreateBillRequest {
    /// Form body in the order the bill endpoint documents it.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("title", self.title.clone()),
            ("amount", self.amount.to_string()),
            ("type", self.bill_type.clone()),
            ("expired_date", self.expired_date.format("%Y-%m-%d").to_string()),
            ("redirect_url", self.redirect_url.clone()),
            ("is_address_required", u8::from(self.is_address_required).to_string()),
            (
                "is_phone_number_required",
                u8::from(self.is_phone_number_required).to_string(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBillResponse {
    pub link_id: i64,
    #[serde(default)]
    pub link_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub bill_type: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub expired_date: Option<String>,
    #[serde(default)]
    pub created_from: Option<String>,
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(default)]
    pub step: serde_json::Value,
    #[serde(default)]
    pub is_address_required: serde_json::Value,
    #[serde(default)]
    pub is_phone_number_required: serde_json::Value,
}

#[async_trait::async_trait]
pub trait BillingGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Single attempt; callers decide what a failure means for their hold.
    async fn create_bill(&self, request: CreateBillRequest) -> Result<CreateBillResponse, ReservationError>;
}
