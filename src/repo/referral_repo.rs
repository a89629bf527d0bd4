use crate::domain::referral::ReferralCode;
use crate::domain::reservation::TrackingId;
use anyhow::Result;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

pub struct ReferralRepo;

impl ReferralRepo {
    /// Locks the code row until the surrounding transaction ends, so concurrent
    /// redemptions of the same code see each other's usage rows.
    pub async fn lock_by_code_tx(tx: &mut Transaction<'_, Postgres>, code: &str) -> Result<Option<ReferralCode>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, discount_percentage, max_uses, current_uses, valid_from, valid_until
            FROM referral_codes
            WHERE code = $1
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(tx.as_mut())
        .await?;

        Ok(row.map(|r| ReferralCode {
            id: r.get("id"),
            code: r.get("code"),
            discount_percentage: r.get("discount_percentage"),
            max_uses: r.get("max_uses"),
            current_uses: r.get("current_uses"),
            valid_from: r.get("valid_from"),
            valid_until: r.get("valid_until"),
        }))
    }

    pub async fn usage_count_tx(tx: &mut Transaction<'_, Postgres>, referral_code_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS used FROM referral_usage WHERE referral_code_id = $1")
            .bind(referral_code_id)
            .fetch_one(tx.as_mut())
            .await?;
        Ok(row.get("used"))
    }

    pub async fn record_usage_tx(
        tx: &mut Transaction<'_, Postgres>,
        referral_code_id: Uuid,
        tracking_id: TrackingId,
    ) -> Result<()> {
        sqlx::query("INSERT INTO referral_usage (referral_code_id, bill_link_id) VALUES ($1, $2)")
            .bind(referral_code_id)
            .bind(tracking_id.0)
            .execute(tx.as_mut())
            .await?;
        sqlx::query("UPDATE referral_codes SET current_uses = current_uses + 1 WHERE id = $1")
            .bind(referral_code_id)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    /// Returns a use to the code when its reservation is released. No-op if the
    /// reservation never redeemed a code.
    pub async fn release_usage_tx(tx: &mut Transaction<'_, Postgres>, tracking_id: TrackingId) -> Result<()> {
        let released = sqlx::query("DELETE FROM referral_usage WHERE bill_link_id = $1 RETURNING referral_code_id")
            .bind(tracking_id.0)
            .fetch_optional(tx.as_mut())
            .await?;

        if let Some(row) = released {
            let referral_code_id: Uuid = row.get("referral_code_id");
            sqlx::query("UPDATE referral_codes SET current_uses = GREATEST(current_uses - 1, 0) WHERE id = $1")
                .bind(referral_code_id)
                .execute(tx.as_mut())
                .await?;
        }
        Ok(())
    }
}
