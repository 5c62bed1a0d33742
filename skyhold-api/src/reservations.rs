use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use skyhold_booking::PaymentRequest;
use skyhold_core::{NewReservation, Reservation};
use uuid::Uuid;
use crate::{error::AppError, state::AppState};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub flight_ref: String,
    pub user_ref: String,
    pub seat_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct PayReservationRequest {
    pub user_ref: String,
    pub amount: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/{id}", get(get_reservation))
        .route("/v1/reservations/{id}/pay", post(pay_reservation))
}

/// POST /v1/reservations
async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state
        .booking
        .create_reservation(NewReservation {
            flight_ref: req.flight_ref,
            user_ref: req.user_ref,
            seat_count: req.seat_count,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/reservations/{id}
async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.booking.get_reservation(id).await?))
}

/// POST /v1/reservations/{id}/pay
/// Requires an `Idempotency-Key` header; replays return the first outcome.
async fn pay_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<PayReservationRequest>,
) -> Result<Json<Reservation>, AppError> {
    let idempotency_token = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let reservation = state
        .payment
        .pay(PaymentRequest {
            reservation_id: id,
            user_ref: req.user_ref,
            amount: req.amount,
            idempotency_token,
        })
        .await?;

    Ok(Json(reservation))
}
