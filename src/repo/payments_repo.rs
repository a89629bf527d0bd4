use crate::domain::payment::PaymentRecord;
use crate::domain::reservation::TrackingId;
use anyhow::Result;
use sqlx::{PgPool, Postgres, Row, Transaction};

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

impl PaymentsRepo {
    pub async fn exists(&self, tracking_id: TrackingId) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM payments WHERE bill_link_id = $1) AS found")
            .bind(tracking_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("found"))
    }

    pub async fn exists_tx(tx: &mut Transaction<'_, Postgres>, tracking_id: TrackingId) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM payments WHERE bill_link_id = $1) AS found")
            .bind(tracking_id.0)
            .fetch_one(tx.as_mut())
            .await?;
        Ok(row.get("found"))
    }

    pub async fn insert_tx(tx: &mut Transaction<'_, Postgres>, record: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (event_id, bill_link_id, amount, name, email, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.event_id)
        .bind(record.tracking_id.0)
        .bind(record.amount)
        .bind(&record.payer_name)
        .bind(&record.payer_email)
        .bind(&record.raw_payload)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}
