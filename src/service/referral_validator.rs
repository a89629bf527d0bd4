use crate::domain::referral::{DiscountSnapshot, ReferralCode};
use crate::error::ReservationError;
use crate::ledger::LedgerTx;
use chrono::{DateTime, Utc};

pub struct ReferralValidator;

impl ReferralValidator {
    /// Looks the code up under a row lock held by `tx`. The snapshot returned is what
    /// the reservation keeps; settlement never re-evaluates it.
    pub async fn validate(
        tx: &mut dyn LedgerTx,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<DiscountSnapshot, ReservationError> {
        let referral = tx
            .lock_referral_code(code)
            .await?
            .ok_or_else(|| ReservationError::ReferralNotFound(code.to_string()))?;

        check_window(&referral, now)?;

        // cached counter and ledger count are checked independently; either one
        // reaching the cap means the code is exhausted
        if !referral.is_unlimited() && referral.current_uses >= referral.max_uses {
            return Err(ReservationError::ReferralExhausted(referral.code));
        }

        let used = tx.referral_usage_count(referral.id).await?;
        if !referral.is_unlimited() && used >= i64::from(referral.max_uses) {
            return Err(ReservationError::ReferralExhausted(referral.code));
        }

        Ok(DiscountSnapshot {
            referral_code_id: referral.id,
            code: referral.code,
            discount_percentage: referral.discount_percentage,
        })
    }
}

pub fn check_window(referral: &ReferralCode, now: DateTime<Utc>) -> Result<(), ReservationError> {
    let expired = referral.valid_until.is_some_and(|until| until < now);
    if expired || referral.valid_from > now {
        return Err(ReservationError::ReferralExpired(referral.code.clone()));
    }
    Ok(())
}
