use crate::domain::attendee::AttendeeRecord;
use crate::domain::payment::{PaymentNotification, PaymentRecord, PaymentStatus};
use crate::domain::reservation::Reservation;
use crate::domain::ticket::TicketStatus;
use crate::error::ReservationError;
use crate::ledger::{LedgerTx, TicketLedger};
use crate::service::notifier::{render_purchase_body, ConfirmationMail, Notifier};
use crate::service::reaper::TimeoutReaper;
use crate::service::reservation_store::ReservationStore;
use anyhow::{anyhow, bail};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Sold { tickets: usize },
    Released { tickets: u64 },
    /// No open reservation (already settled, reaped, or never ours).
    Duplicate,
}

#[derive(Clone)]
pub struct SettlementProcessor {
    pub ledger: Arc<dyn TicketLedger>,
    pub store: Arc<dyn ReservationStore>,
    pub reaper: TimeoutReaper,
    pub notifier: Arc<dyn Notifier>,
}

impl SettlementProcessor {
    pub async fn settle(&self, notification: &PaymentNotification) -> Result<SettlementOutcome, ReservationError> {
        let tracking_id = notification.tracking_id();

        let Some(reservation) = self.store.take_and_delete(tracking_id).await else {
            tracing::info!(%tracking_id, status = %notification.status, "no open reservation; ignoring notification");
            return Ok(SettlementOutcome::Duplicate);
        };

        let status = match PaymentStatus::parse(&notification.status) {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(%tracking_id, error = %e, "releasing tickets for unrecognized status");
                None
            }
        };

        let result = match status {
            Some(PaymentStatus::Successful) => self.finalize_sale(&reservation, notification).await,
            _ => self.release(&reservation).await,
        };

        match result {
            Ok(outcome) => {
                self.reaper.resolve(tracking_id);
                match &outcome {
                    SettlementOutcome::Sold { tickets } => {
                        tracing::info!(%tracking_id, tickets, amount = notification.amount, "payment successful");
                        self.dispatch_confirmation(&reservation, notification);
                    }
                    SettlementOutcome::Released { tickets } => {
                        tracing::info!(%tracking_id, tickets, status = %notification.status, "payment not completed; tickets released");
                    }
                    SettlementOutcome::Duplicate => {
                        tracing::info!(%tracking_id, "payment already recorded");
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(%tracking_id, error = %e, "settlement failed; reservation kept for the reaper");
                if self.store.put(reservation).await {
                    self.reaper.schedule(tracking_id);
                } else {
                    tracing::error!(%tracking_id, "tracking id reused before the reservation could be restored");
                }
                Err(e)
            }
        }
    }

    async fn finalize_sale(
        &self,
        reservation: &Reservation,
        notification: &PaymentNotification,
    ) -> Result<SettlementOutcome, ReservationError> {
        if notification.amount != reservation.billed_amount {
            tracing::warn!(
                tracking_id = %reservation.tracking_id,
                billed = reservation.billed_amount,
                paid = notification.amount,
                "paid amount differs from billed amount"
            );
        }

        let mut tx = self.ledger.begin().await?;
        match apply_sale(&mut *tx, reservation, notification).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(error = %rb, "rollback failed");
                }
                Err(e.into())
            }
        }
    }

    async fn release(&self, reservation: &Reservation) -> Result<SettlementOutcome, ReservationError> {
        let mut tx = self.ledger.begin().await?;
        match apply_release(&mut *tx, reservation).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(error = %rb, "rollback failed");
                }
                Err(e.into())
            }
        }
    }

    fn dispatch_confirmation(&self, reservation: &Reservation, notification: &PaymentNotification) {
        if notification.sender_email.is_empty() {
            return;
        }
        let mail = ConfirmationMail {
            recipient: notification.sender_email.clone(),
            subject: "Thanks for your purchase!".to_string(),
            body: render_purchase_body(
                &notification.sender_name,
                &notification.bill_title,
                notification.amount,
                &reservation.ticket_hashes,
            ),
            ticket_hashes: reservation.ticket_hashes.clone(),
        };
        let notifier = self.notifier.clone();
        let tracking_id = reservation.tracking_id;
        tokio::spawn(async move {
            if let Err(e) = notifier.send_confirmation(mail).await {
                tracing::warn!(%tracking_id, error = %e, "confirmation mail not sent");
            }
        });
    }
}

async fn apply_sale(
    tx: &mut dyn LedgerTx,
    reservation: &Reservation,
    notification: &PaymentNotification,
) -> anyhow::Result<SettlementOutcome> {
    if tx.payment_exists(reservation.tracking_id).await? {
        return Ok(SettlementOutcome::Duplicate);
    }

    tx.insert_payment(&PaymentRecord {
        tracking_id: reservation.tracking_id,
        event_id: reservation.event_id,
        amount: notification.amount,
        payer_name: notification.sender_name.clone(),
        payer_email: notification.sender_email.clone(),
        raw_payload: serde_json::to_value(notification)?,
    })
    .await?;

    let sold = tx
        .change_ticket_status(&reservation.ticket_ids, TicketStatus::Pending, TicketStatus::Sold)
        .await?;
    if sold != reservation.ticket_ids.len() as u64 {
        bail!(
            "expected {} pending tickets for {}, found {sold}",
            reservation.ticket_ids.len(),
            reservation.tracking_id
        );
    }

    for (i, ticket_id) in reservation.ticket_ids.iter().enumerate() {
        let attendee = reservation
            .attendees
            .get(i)
            .ok_or_else(|| anyhow!("no attendee payload for ticket {ticket_id}"))?;
        tx.insert_attendee(&AttendeeRecord {
            event_id: reservation.event_id,
            ticket_id: *ticket_id,
            data: serde_json::to_value(attendee)?,
        })
        .await?;
    }

    Ok(SettlementOutcome::Sold {
        tickets: reservation.ticket_ids.len(),
    })
}

async fn apply_release(tx: &mut dyn LedgerTx, reservation: &Reservation) -> anyhow::Result<SettlementOutcome> {
    let released = tx
        .change_ticket_status(&reservation.ticket_ids, TicketStatus::Pending, TicketStatus::Available)
        .await?;
    tx.release_referral_usage(reservation.tracking_id).await?;
    Ok(SettlementOutcome::Released { tickets: released })
}
