use crate::domain::attendee::AttendeeRecord;
use crate::domain::payment::PaymentRecord;
use crate::domain::referral::ReferralCode;
use crate::domain::reservation::TrackingId;
use crate::domain::ticket::{Ticket, TicketStatus};
use crate::ledger::{LedgerTx, TicketLedger};
use crate::repo::attendees_repo::AttendeesRepo;
use crate::repo::payments_repo::PaymentsRepo;
use crate::repo::referral_repo::ReferralRepo;
use crate::repo::tickets_repo::TicketsRepo;
use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgTicketLedger {
    pub pool: PgPool,
    pub payments_repo: PaymentsRepo,
}

impl PgTicketLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            payments_repo: PaymentsRepo { pool: pool.clone() },
            pool,
        }
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl TicketLedger for PgTicketLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn payment_exists(&self, tracking_id: TrackingId) -> Result<bool> {
        self.payments_repo.exists(tracking_id).await
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[async_trait::async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_available_tickets(&mut self, event_id: Uuid, name: &str, limit: i64) -> Result<Vec<Ticket>> {
        TicketsRepo::lock_available_tx(&mut self.tx, event_id, name, limit).await
    }

    async fn change_ticket_status(&mut self, ticket_ids: &[Uuid], from: TicketStatus, to: TicketStatus) -> Result<u64> {
        TicketsRepo::change_status_tx(&mut self.tx, ticket_ids, from, to).await
    }

    async fn lock_referral_code(&mut self, code: &str) -> Result<Option<ReferralCode>> {
        ReferralRepo::lock_by_code_tx(&mut self.tx, code).await
    }

    async fn referral_usage_count(&mut self, referral_code_id: Uuid) -> Result<i64> {
        ReferralRepo::usage_count_tx(&mut self.tx, referral_code_id).await
    }

    async fn record_referral_usage(&mut self, referral_code_id: Uuid, tracking_id: TrackingId) -> Result<()> {
        ReferralRepo::record_usage_tx(&mut self.tx, referral_code_id, tracking_id).await
    }

    async fn release_referral_usage(&mut self, tracking_id: TrackingId) -> Result<()> {
        ReferralRepo::release_usage_tx(&mut self.tx, tracking_id).await
    }

    async fn payment_exists(&mut self, tracking_id: TrackingId) -> Result<bool> {
        PaymentsRepo::exists_tx(&mut self.tx, tracking_id).await
    }

    async fn insert_payment(&mut self, record: &PaymentRecord) -> Result<()> {
        PaymentsRepo::insert_tx(&mut self.tx, record).await
    }

    async fn insert_attendee(&mut self, attendee: &AttendeeRecord) -> Result<()> {
        AttendeesRepo::insert_tx(&mut self.tx, attendee).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgLedgerTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgLedgerTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
