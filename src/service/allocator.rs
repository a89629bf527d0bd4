use crate::domain::ticket::{Ticket, TicketStatus};
use crate::error::ReservationError;
use crate::ledger::LedgerTx;
use anyhow::anyhow;
use uuid::Uuid;

pub struct InventoryAllocator;

impl InventoryAllocator {
    /// Holds `amount` tickets of one type inside `tx`. All-or-nothing: on error the
    /// caller rolls `tx` back and no ticket has changed.
    pub async fn reserve(
        tx: &mut dyn LedgerTx,
        event_id: Uuid,
        ticket_name: &str,
        amount: i64,
    ) -> Result<Vec<Ticket>, ReservationError> {
        validate_amount(amount)?;

        let tickets = tx.lock_available_tickets(event_id, ticket_name, amount).await?;
        let found = i64::try_from(tickets.len()).unwrap_or(i64::MAX);
        if found < amount {
            return Err(ReservationError::InsufficientInventory {
                requested: amount,
                available: found,
            });
        }

        let ids: Vec<Uuid> = tickets.iter().map(|t| t.id).collect();
        let moved = tx
            .change_ticket_status(&ids, TicketStatus::Available, TicketStatus::Pending)
            .await?;
        if moved != ids.len() as u64 {
            return Err(ReservationError::PersistenceFailure(anyhow!(
                "expected to hold {} tickets, held {moved}",
                ids.len()
            )));
        }

        tracing::debug!(%event_id, ticket_name, amount, "tickets moved to pending");

        Ok(tickets
            .into_iter()
            .map(|mut t| {
                t.status = TicketStatus::Pending;
                t
            })
            .collect())
    }
}

pub fn validate_amount(amount: i64) -> Result<(), ReservationError> {
    if amount <= 0 {
        return Err(ReservationError::InvalidArgument(format!(
            "ticket amount must be > 0, got {amount}"
        )));
    }
    Ok(())
}
