use crate::domain::referral::DiscountSnapshot;
use crate::gateways::CreateBillResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Gateway bill identifier (`link_id` on creation, `bill_link_id` on callback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(pub i64);

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reserve:{}", self.0)
    }
}

pub type AttendeePayload = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub tracking_id: TrackingId,
    pub event_id: Uuid,
    pub ticket_ids: Vec<Uuid>,
    pub ticket_hashes: Vec<String>,
    pub attendees: Vec<AttendeePayload>,
    pub discount: Option<DiscountSnapshot>,
    pub billed_amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuyTicketRequest {
    pub ticket_name: String,
    pub ticket_amount: i64,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub attendees: Vec<AttendeePayload>,
}

impl BuyTicketRequest {
    pub fn referral_code(&self) -> Option<&str> {
        self.referral_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuyTicketData {
    pub event_id: Uuid,
    pub ticket_amount: i64,
    pub ticket_ids: Vec<Uuid>,
    pub attendees: Vec<AttendeePayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuyTicketResponse {
    #[serde(flatten)]
    pub reservation: BuyTicketData,
    #[serde(flatten)]
    pub bill: CreateBillResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseResponse<T> {
    pub data: T,
    pub message: String,
}
