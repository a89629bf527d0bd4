use crate::domain::reservation::{BaseResponse, BuyTicketRequest};
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

pub async fn buy_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<BuyTicketRequest>,
) -> impl IntoResponse {
    match state.checkout.buy(event_id, req).await {
        Ok(data) => (
            axum::http::StatusCode::OK,
            Json(BaseResponse {
                data,
                message: "Tickets reserved".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            let (status, body) = e.into_response_parts();
            (status, Json(body)).into_response()
        }
    }
}
