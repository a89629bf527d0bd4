use crate::domain::reservation::TrackingId;
use crate::error::ReservationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Successful,
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    /// Exact gateway spelling only; anything else is unrecognized.
    pub fn parse(s: &str) -> Result<Self, ReservationError> {
        match s {
            "SUCCESSFUL" => Ok(Self::Successful),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(ReservationError::UnknownWebhookStatus(s.to_string())),
        }
    }
}

/// Transaction object the gateway posts (JSON inside the `data` form field).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentNotification {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub bill_link: String,
    pub bill_link_id: i64,
    #[serde(default)]
    pub bill_title: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_bank: String,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub sender_bank_type: String,
    #[serde(default)]
    pub created_at: String,
}

impl PaymentNotification {
    pub fn tracking_id(&self) -> TrackingId {
        TrackingId(self.bill_link_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub tracking_id: TrackingId,
    pub event_id: Uuid,
    pub amount: i64,
    pub payer_name: String,
    pub payer_email: String,
    pub raw_payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}
