use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skyhold_core::BookingError;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
}

impl AppError {
    fn status(err: &BookingError) -> StatusCode {
        match err {
            BookingError::Validation(_) | BookingError::MissingIdempotencyToken => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::InsufficientCapacity { .. }
            | BookingError::AlreadyBooked(_)
            | BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::PaymentWindowExpired(_) => StatusCode::GONE,
            BookingError::AmountMismatch { .. } | BookingError::OwnerMismatch(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BookingError::InventoryUnavailable(_) | BookingError::UnconfirmedHold { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::Booking(err) = self;
        let status = Self::status(&err);
        if status.is_server_error() {
            tracing::error!(code = err.code(), "Request failed: {}", err);
        }
        let error_message = match &err {
            BookingError::Store(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        let code = err.code();

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<skyhold_core::StoreError> for AppError {
    fn from(err: skyhold_core::StoreError) -> Self {
        Self::Booking(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyhold_core::StoreError;

    #[test]
    fn test_unconfirmed_hold_maps_to_service_unavailable() {
        let err = BookingError::UnconfirmedHold {
            flight_ref: "SK-101".to_string(),
            seat_count: 2,
            source: StoreError::Database("connection reset".to_string()),
        };

        let response = AppError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
