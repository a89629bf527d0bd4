use crate::domain::attendee::AttendeeRecord;
use anyhow::Result;
use sqlx::{Postgres, Transaction};

pub struct AttendeesRepo;

impl AttendeesRepo {
    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, attendee: &AttendeeRecord) -> Result<()> {
        sqlx::query("INSERT INTO attendees (event_id, ticket_id, data) VALUES ($1, $2, $3)")
            .bind(attendee.event_id)
            .bind(attendee.ticket_id)
            .bind(&attendee.data)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }
}
