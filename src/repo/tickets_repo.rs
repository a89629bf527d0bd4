use crate::domain::ticket::{Ticket, TicketStatus};
use anyhow::{anyhow, Result};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

pub struct TicketsRepo;

impl TicketsRepo {
    /// Row-locks up to `limit` available tickets of one type. Rows already locked by
    /// another allocator are skipped, never shared.
    pub async fn lock_available_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        name: &str,
        limit: i64,
    ) -> Result<Vec<Ticket>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, name, price, status::text AS status, hash
            FROM tickets
            WHERE event_id = $1 AND name = $2 AND status = 'available'
            ORDER BY created_at ASC, id ASC
            LIMIT $3
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(event_id)
        .bind(name)
        .bind(limit)
        .fetch_all(tx.as_mut())
        .await?;

        rows.into_iter()
            .map(|r| {
                let status: String = r.get("status");
                Ok(Ticket {
                    id: r.get("id"),
                    event_id: r.get("event_id"),
                    name: r.get("name"),
                    price: r.get("price"),
                    status: TicketStatus::parse(&status)
                        .ok_or_else(|| anyhow!("unexpected ticket status {status}"))?,
                    hash: r.get("hash"),
                })
            })
            .collect()
    }

    /// Moves tickets from `from` to `to`; rows not currently in `from` are left alone.
    pub async fn change_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        ticket_ids: &[Uuid],
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<u64> {
        if !from.can_transition_to(to) {
            return Err(anyhow!("illegal ticket transition {} -> {}", from.as_str(), to.as_str()));
        }
        if ticket_ids.is_empty() {
            return Ok(0);
        }

        let res = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1::ticket_status, updated_at = now()
            WHERE id = ANY($2) AND status = $3::ticket_status
            "#,
        )
        .bind(to.as_str())
        .bind(ticket_ids)
        .bind(from.as_str())
        .execute(tx.as_mut())
        .await?;

        Ok(res.rows_affected())
    }
}
