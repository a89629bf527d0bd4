//! Durable side of the engine: ticket rows, payments, attendees and the referral
//! ledger, all reached through scoped transactions.

use crate::domain::attendee::AttendeeRecord;
use crate::domain::payment::PaymentRecord;
use crate::domain::referral::ReferralCode;
use crate::domain::reservation::TrackingId;
use crate::domain::ticket::{Ticket, TicketStatus};
use anyhow::Result;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

#[async_trait::async_trait]
pub trait TicketLedger: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    /// Committed payments only; this is the tie-breaker between settlement and reaping.
    async fn payment_exists(&self, tracking_id: TrackingId) -> Result<bool>;

    async fn ping(&self) -> bool;
}

/// One open transaction. Dropping it without `commit` rolls it back, and `commit`
/// consumes it, so a transaction is finished exactly once.
#[async_trait::async_trait]
pub trait LedgerTx: Send {
    async fn lock_available_tickets(&mut self, event_id: Uuid, name: &str, limit: i64) -> Result<Vec<Ticket>>;

    async fn change_ticket_status(&mut self, ticket_ids: &[Uuid], from: TicketStatus, to: TicketStatus) -> Result<u64>;

    async fn lock_referral_code(&mut self, code: &str) -> Result<Option<ReferralCode>>;

    async fn referral_usage_count(&mut self, referral_code_id: Uuid) -> Result<i64>;

    async fn record_referral_usage(&mut self, referral_code_id: Uuid, tracking_id: TrackingId) -> Result<()>;

    async fn release_referral_usage(&mut self, tracking_id: TrackingId) -> Result<()>;

    async fn payment_exists(&mut self, tracking_id: TrackingId) -> Result<bool>;

    async fn insert_payment(&mut self, record: &PaymentRecord) -> Result<()>;

    async fn insert_attendee(&mut self, attendee: &AttendeeRecord) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
