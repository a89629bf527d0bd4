use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i64, available: i64 },

    #[error("referral code {0} not found")]
    ReferralNotFound(String),

    #[error("referral code {0} has expired")]
    ReferralExpired(String),

    #[error("referral code {0} has reached maximum uses")]
    ReferralExhausted(String),

    #[error("billing gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] anyhow::Error),

    #[error("unknown webhook status {0:?}")]
    UnknownWebhookStatus(String),
}

impl ReservationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            Self::ReferralNotFound(_) => "REFERRAL_NOT_FOUND",
            Self::ReferralExpired(_) => "REFERRAL_EXPIRED",
            Self::ReferralExhausted(_) => "REFERRAL_EXHAUSTED",
            Self::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::UnknownWebhookStatus(_) => "UNKNOWN_WEBHOOK_STATUS",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_)
            | Self::ReferralExpired(_)
            | Self::ReferralExhausted(_)
            | Self::UnknownWebhookStatus(_) => StatusCode::BAD_REQUEST,
            Self::ReferralNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientInventory { .. } => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response_parts(self) -> (StatusCode, ErrorEnvelope) {
        let status = self.status_code();
        let message = match &self {
            // driver and SQL text stays in the logs
            Self::PersistenceFailure(e) => {
                tracing::error!(error = %format!("{e:#}"), "request failed on persistence");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        (
            status,
            ErrorEnvelope {
                error: ErrorPayload {
                    code: self.code().to_string(),
                    message,
                    details: None,
                },
            },
        )
    }
}

impl From<sqlx::Error> for ReservationError {
    fn from(e: sqlx::Error) -> Self {
        Self::PersistenceFailure(e.into())
    }
}
