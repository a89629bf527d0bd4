use crate::domain::payment::PaymentNotification;
use crate::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CallbackForm {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Gateway payment callback. Always answers 200 so the gateway does not retry;
/// anything that goes wrong here is logged and left for the reaper.
pub async fn payment_callback(
    State(state): State<AppState>,
    form: Result<Form<CallbackForm>, FormRejection>,
) -> impl IntoResponse {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            tracing::error!(error = %e, "unreadable payment callback");
            return ok();
        }
    };

    if let Some(expected) = &state.callback_token {
        if form.token.as_deref() != Some(expected.as_str()) {
            tracing::warn!("payment callback with invalid token ignored");
            return ok();
        }
    }

    let notification: PaymentNotification = match serde_json::from_str(&form.data) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "error converting callback data to json");
            return ok();
        }
    };

    if let Err(e) = state.settlement.settle(&notification).await {
        tracing::error!(tracking_id = %notification.tracking_id(), error = %e, "payment callback not settled");
    }

    ok()
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

fn ok() -> axum::response::Response {
    (axum::http::StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}
