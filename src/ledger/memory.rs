use crate::domain::attendee::AttendeeRecord;
use crate::domain::payment::PaymentRecord;
use crate::domain::referral::ReferralCode;
use crate::domain::reservation::TrackingId;
use crate::domain::ticket::{Ticket, TicketStatus};
use crate::ledger::{LedgerTx, TicketLedger};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub tickets: Vec<Ticket>,
    pub referral_codes: Vec<ReferralCode>,
    pub referral_usage: Vec<(Uuid, TrackingId)>,
    pub payments: Vec<PaymentRecord>,
    pub attendees: Vec<AttendeeRecord>,
}

impl MemoryState {
    pub fn count(&self, event_id: Uuid, name: &str, status: TicketStatus) -> usize {
        self.tickets
            .iter()
            .filter(|t| t.event_id == event_id && t.name == name && t.status == status)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ChangeTicketStatus,
    InsertPayment,
    InsertAttendee,
    Commit,
}

/// Ledger held in process memory. A transaction owns the whole state for its
/// lifetime and works on a staged copy, so transactions are serialized and an
/// uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryTicketLedger {
    state: Arc<Mutex<MemoryState>>,
    fail_points: Arc<std::sync::Mutex<HashSet<FailPoint>>>,
}

impl MemoryTicketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_tickets(&self, event_id: Uuid, name: &str, price: i64, count: usize) -> Vec<Uuid> {
        let mut state = self.state.lock().await;
        (0..count)
            .map(|_| {
                let id = Uuid::new_v4();
                state.tickets.push(Ticket {
                    id,
                    event_id,
                    name: name.to_string(),
                    price,
                    status: TicketStatus::Available,
                    hash: Uuid::new_v4().simple().to_string(),
                });
                id
            })
            .collect()
    }

    pub async fn seed_referral_code(
        &self,
        code: &str,
        discount_percentage: i32,
        max_uses: i32,
        valid_until: Option<DateTime<Utc>>,
    ) -> ReferralCode {
        let referral = ReferralCode {
            id: Uuid::new_v4(),
            code: code.to_string(),
            discount_percentage,
            max_uses,
            current_uses: 0,
            valid_from: Utc::now() - chrono::Duration::days(1),
            valid_until,
        };
        self.state.lock().await.referral_codes.push(referral.clone());
        referral
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn ticket_status(&self, ticket_id: Uuid) -> Option<TicketStatus> {
        self.state
            .lock()
            .await
            .tickets
            .iter()
            .find(|t| t.id == ticket_id)
            .map(|t| t.status)
    }

    pub fn fail_on(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.clear();
        }
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_points: Arc<std::sync::Mutex<HashSet<FailPoint>>>,
}

impl MemoryLedgerTx {
    fn check(&self, point: FailPoint) -> Result<()> {
        let armed = self
            .fail_points
            .lock()
            .map(|points| points.contains(&point))
            .unwrap_or(false);
        if armed {
            bail!("injected failure at {point:?}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TicketLedger for MemoryTicketLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLedgerTx {
            guard,
            staged,
            fail_points: self.fail_points.clone(),
        }))
    }

    async fn payment_exists(&self, tracking_id: TrackingId) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .iter()
            .any(|p| p.tracking_id == tracking_id))
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_available_tickets(&mut self, event_id: Uuid, name: &str, limit: i64) -> Result<Vec<Ticket>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .staged
            .tickets
            .iter()
            .filter(|t| t.event_id == event_id && t.name == name && t.status == TicketStatus::Available)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn change_ticket_status(&mut self, ticket_ids: &[Uuid], from: TicketStatus, to: TicketStatus) -> Result<u64> {
        self.check(FailPoint::ChangeTicketStatus)?;
        if !from.can_transition_to(to) {
            bail!("illegal ticket transition {} -> {}", from.as_str(), to.as_str());
        }

        let mut changed = 0;
        for ticket in self
            .staged
            .tickets
            .iter_mut()
            .filter(|t| ticket_ids.contains(&t.id) && t.status == from)
        {
            ticket.status = to;
            changed += 1;
        }
        Ok(changed)
    }

    async fn lock_referral_code(&mut self, code: &str) -> Result<Option<ReferralCode>> {
        Ok(self.staged.referral_codes.iter().find(|r| r.code == code).cloned())
    }

    async fn referral_usage_count(&mut self, referral_code_id: Uuid) -> Result<i64> {
        let used = self
            .staged
            .referral_usage
            .iter()
            .filter(|(id, _)| *id == referral_code_id)
            .count();
        Ok(i64::try_from(used)?)
    }

    async fn record_referral_usage(&mut self, referral_code_id: Uuid, tracking_id: TrackingId) -> Result<()> {
        if self.staged.referral_usage.iter().any(|(_, t)| *t == tracking_id) {
            bail!("referral usage for {tracking_id} already recorded");
        }
        let referral = self
            .staged
            .referral_codes
            .iter_mut()
            .find(|r| r.id == referral_code_id)
            .ok_or_else(|| anyhow!("referral code {referral_code_id} missing"))?;
        referral.current_uses += 1;
        self.staged.referral_usage.push((referral_code_id, tracking_id));
        Ok(())
    }

    async fn release_referral_usage(&mut self, tracking_id: TrackingId) -> Result<()> {
        let Some(pos) = self.staged.referral_usage.iter().position(|(_, t)| *t == tracking_id) else {
            return Ok(());
        };
        let (referral_code_id, _) = self.staged.referral_usage.remove(pos);
        if let Some(referral) = self.staged.referral_codes.iter_mut().find(|r| r.id == referral_code_id) {
            referral.current_uses = (referral.current_uses - 1).max(0);
        }
        Ok(())
    }

    async fn payment_exists(&mut self, tracking_id: TrackingId) -> Result<bool> {
        Ok(self.staged.payments.iter().any(|p| p.tracking_id == tracking_id))
    }

    async fn insert_payment(&mut self, record: &PaymentRecord) -> Result<()> {
        self.check(FailPoint::InsertPayment)?;
        if self.staged.payments.iter().any(|p| p.tracking_id == record.tracking_id) {
            bail!("duplicate payment for {}", record.tracking_id);
        }
        self.staged.payments.push(record.clone());
        Ok(())
    }

    async fn insert_attendee(&mut self, attendee: &AttendeeRecord) -> Result<()> {
        self.check(FailPoint::InsertAttendee)?;
        if self.staged.attendees.iter().any(|a| a.ticket_id == attendee.ticket_id) {
            bail!("ticket {} already has an attendee", attendee.ticket_id);
        }
        self.staged.attendees.push(attendee.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let MemoryLedgerTx { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
