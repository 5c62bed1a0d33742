use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use skyhold_booking::SweepOutcome;
use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub skipped: bool,
    pub cancelled: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/sweeps", post(trigger_sweep))
}

/// POST /v1/admin/sweeps
/// Run one expiry sweep now instead of waiting for the next tick.
async fn trigger_sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>, AppError> {
    let response = match state.sweeper.tick().await? {
        SweepOutcome::Completed { cancelled } => SweepResponse { skipped: false, cancelled },
        SweepOutcome::Skipped => SweepResponse { skipped: true, cancelled: 0 },
    };
    Ok(Json(response))
}
