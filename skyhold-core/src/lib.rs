pub mod clock;
pub mod idempotency;
pub mod inventory;
pub mod repository;
pub mod reservation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use idempotency::IdempotencyLedger;
pub use inventory::{FlightInfo, InventoryClient, InventoryError};
pub use repository::{ReservationStore, ReservationTx, StoreError};
pub use reservation::{NewReservation, Reservation, ReservationStatus};

use uuid::Uuid;

/// Every failure a booking or payment request can surface to its caller.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Idempotency token is required")]
    MissingIdempotencyToken,
    #[error("Reservation not found: {0}")]
    NotFound(Uuid),
    #[error("Insufficient capacity: requested {requested}, capacity {capacity}")]
    InsufficientCapacity { requested: u32, capacity: u32 },
    #[error("Inventory service unavailable: {0}")]
    InventoryUnavailable(#[from] InventoryError),
    /// The remote decrement went through but the local commit did not.
    #[error("Reservation was not saved; {seat_count} seats on {flight_ref} may still be held by the inventory service: {source}")]
    UnconfirmedHold {
        flight_ref: String,
        seat_count: u32,
        source: StoreError,
    },
    #[error("Payment window expired for reservation {0}")]
    PaymentWindowExpired(Uuid),
    #[error("Amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: i64, received: i64 },
    #[error("Reservation {0} does not belong to the paying user")]
    OwnerMismatch(Uuid),
    #[error("Reservation {0} is already booked")]
    AlreadyBooked(Uuid),
    #[error("Reservation {0} was modified concurrently")]
    Conflict(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Stable identifier for callers that branch on the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_FAILED",
            BookingError::MissingIdempotencyToken => "MISSING_IDEMPOTENCY_TOKEN",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            BookingError::InventoryUnavailable(_) => "INVENTORY_UNAVAILABLE",
            BookingError::UnconfirmedHold { .. } => "UNCONFIRMED_INVENTORY_HOLD",
            BookingError::PaymentWindowExpired(_) => "PAYMENT_WINDOW_EXPIRED",
            BookingError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            BookingError::OwnerMismatch(_) => "OWNER_MISMATCH",
            BookingError::AlreadyBooked(_) => "ALREADY_BOOKED",
            BookingError::Conflict(_) => "CONFLICT",
            BookingError::Store(_) => "STORE_FAILURE",
        }
    }

    /// Business-rule and validation failures are final; retrying the same
    /// request cannot succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::InventoryUnavailable(_)
                | BookingError::UnconfirmedHold { .. }
                | BookingError::Store(_)
                | BookingError::Conflict(_)
        )
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
