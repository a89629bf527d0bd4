use crate::http::handlers::{ops, payments, tickets};
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(payments::health))
        .route("/v1/events/:id/tickets/buy", post(tickets::buy_tickets))
        .route("/payments/callback", post(payments::payment_callback))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .with_state(state)
}
