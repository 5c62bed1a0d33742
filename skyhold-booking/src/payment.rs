use chrono::Duration;
use skyhold_core::{
    BookingError, BookingResult, Clock, IdempotencyLedger, Reservation, ReservationStatus,
    ReservationStore, ReservationTx,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::abort;

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub reservation_id: Uuid,
    pub user_ref: String,
    /// Minor currency units, must equal the reservation's total cost
    pub amount: i64,
    pub idempotency_token: Option<String>,
}

/// Result of validating a payment inside the transaction. Both variants
/// commit; only `Booked` is a success for the caller.
enum Settlement {
    Booked(Reservation),
    Expired(Uuid),
}

/// Confirms payment for reservations.
///
/// Transitions: `Initiated | Pending → Booked` while inside the payment
/// window, `Initiated | Pending → Cancelled` once the window has passed.
/// Booked and Cancelled are terminal. Every transition is a conditional
/// update on the prior status, so this engine and the expiry sweeper can
/// race without overwriting each other.
pub struct PaymentEngine {
    store: Arc<dyn ReservationStore>,
    ledger: Arc<dyn IdempotencyLedger>,
    clock: Arc<dyn Clock>,
    payment_window: Duration,
}

impl PaymentEngine {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        ledger: Arc<dyn IdempotencyLedger>,
        clock: Arc<dyn Clock>,
        payment_window: Duration,
    ) -> Self {
        Self { store, ledger, clock, payment_window }
    }

    /// Ledger keys are scoped to the reservation so a token reused on another
    /// reservation never replays a foreign outcome.
    fn ledger_key(reservation_id: Uuid, token: &str) -> String {
        format!("{}:{}", reservation_id, token)
    }

    pub async fn pay(&self, request: PaymentRequest) -> BookingResult<Reservation> {
        let token = request
            .idempotency_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(BookingError::MissingIdempotencyToken)?;
        if request.amount < 0 {
            return Err(BookingError::Validation("amount must not be negative".to_string()));
        }

        let key = Self::ledger_key(request.reservation_id, token);
        if let Some(outcome) = self.ledger.lookup(&key).await? {
            debug!(reservation_id = %request.reservation_id, "Replaying recorded payment outcome");
            return Ok(outcome);
        }

        let mut tx = self.store.begin().await?;

        match self.settle(tx.as_mut(), &request).await {
            Ok(Settlement::Booked(reservation)) => {
                tx.commit().await?;
                info!(
                    reservation_id = %reservation.id,
                    total_cost = reservation.total_cost,
                    "Reservation booked"
                );

                // The booking is committed; a ledger failure must not turn it into an error
                if let Err(e) = self.ledger.record(&key, &reservation).await {
                    warn!(reservation_id = %reservation.id, error = %e, "Failed to record payment outcome");
                }
                Ok(reservation)
            }
            Ok(Settlement::Expired(id)) => {
                tx.commit().await?;
                info!(reservation_id = %id, "Payment window passed; reservation cancelled");
                Err(BookingError::PaymentWindowExpired(id))
            }
            Err(BookingError::AlreadyBooked(id)) => {
                abort(tx).await;
                // A concurrent request with the same token may have just recorded its outcome
                match self.ledger.lookup(&key).await? {
                    Some(outcome) => Ok(outcome),
                    None => Err(BookingError::AlreadyBooked(id)),
                }
            }
            Err(e) => {
                abort(tx).await;
                Err(e)
            }
        }
    }

    async fn settle(
        &self,
        tx: &mut dyn ReservationTx,
        request: &PaymentRequest,
    ) -> BookingResult<Settlement> {
        let id = request.reservation_id;
        let reservation = tx
            .fetch_for_update(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        match reservation.status {
            ReservationStatus::Cancelled => return Err(BookingError::PaymentWindowExpired(id)),
            ReservationStatus::Booked => return Err(BookingError::AlreadyBooked(id)),
            ReservationStatus::Initiated | ReservationStatus::Pending => {}
        }

        let now = self.clock.now();
        if reservation.is_expired(now, self.payment_window) {
            return match tx
                .transition(id, &ReservationStatus::OPEN, ReservationStatus::Cancelled, now)
                .await?
            {
                Some(_) => Ok(Settlement::Expired(id)),
                None => Err(BookingError::PaymentWindowExpired(id)),
            };
        }

        if request.amount != reservation.total_cost {
            return Err(BookingError::AmountMismatch {
                expected: reservation.total_cost,
                received: request.amount,
            });
        }

        if !reservation.is_owned_by(&request.user_ref) {
            return Err(BookingError::OwnerMismatch(id));
        }

        tx.transition(id, &ReservationStatus::OPEN, ReservationStatus::Booked, now)
            .await?
            .map(Settlement::Booked)
            .ok_or(BookingError::Conflict(id))
    }
}
