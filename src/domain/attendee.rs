use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub event_id: Uuid,
    pub ticket_id: Uuid,
    pub data: serde_json::Value,
}
