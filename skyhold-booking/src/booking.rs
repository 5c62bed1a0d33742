use skyhold_core::{
    BookingError, BookingResult, Clock, InventoryClient, InventoryError, NewReservation, Reservation,
    ReservationStore, ReservationTx,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use crate::abort;

/// Creates reservations.
///
/// A creation is one unit of work: capacity check, cost computation, the
/// local insert and the remote seat decrement. The local transaction only
/// commits after the decrement succeeded. The decrement itself cannot be
/// rolled back, so a failure between it and the commit leaves seats taken
/// remotely with no reservation here. That case is logged and reported as
/// [`BookingError::UnconfirmedHold`], never hidden.
pub struct BookingEngine {
    store: Arc<dyn ReservationStore>,
    inventory: Arc<dyn InventoryClient>,
    clock: Arc<dyn Clock>,
}

impl BookingEngine {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        inventory: Arc<dyn InventoryClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, inventory, clock }
    }

    pub async fn create_reservation(&self, request: NewReservation) -> BookingResult<Reservation> {
        request.validate().map_err(BookingError::Validation)?;

        let mut tx = self.store.begin().await?;

        let reservation = match self.stage(tx.as_mut(), request).await {
            Ok(reservation) => reservation,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            error!(
                reservation_id = %reservation.id,
                flight_ref = %reservation.flight_ref,
                seat_delta = -(reservation.seat_count as i64),
                error = %e,
                "Commit failed after inventory decrement; seats are held remotely without a reservation"
            );
            return Err(BookingError::UnconfirmedHold {
                flight_ref: reservation.flight_ref,
                seat_count: reservation.seat_count,
                source: e,
            });
        }

        info!(
            reservation_id = %reservation.id,
            flight_ref = %reservation.flight_ref,
            seat_count = reservation.seat_count,
            total_cost = reservation.total_cost,
            "Reservation created"
        );
        Ok(reservation)
    }

    pub async fn get_reservation(&self, id: Uuid) -> BookingResult<Reservation> {
        self.store.get(id).await?.ok_or(BookingError::NotFound(id))
    }

    async fn stage(
        &self,
        tx: &mut dyn ReservationTx,
        request: NewReservation,
    ) -> BookingResult<Reservation> {
        // Availability and price come from the same read
        let flight = self.inventory.fetch_flight(&request.flight_ref).await.map_err(|e| {
            warn!(flight_ref = %request.flight_ref, error = %e, "Flight lookup failed");
            e
        })?;

        if request.seat_count > flight.capacity {
            return Err(BookingError::InsufficientCapacity {
                requested: request.seat_count,
                capacity: flight.capacity,
            });
        }

        if flight.unit_price < 0 {
            return Err(InventoryError::Decode(format!("negative unit price {}", flight.unit_price)).into());
        }
        let total_cost = i64::from(request.seat_count)
            .checked_mul(flight.unit_price)
            .ok_or_else(|| BookingError::Validation("total cost out of range".to_string()))?;

        let reservation = Reservation::new(request, total_cost, self.clock.now());
        tx.insert(&reservation).await?;

        let delta = -i64::from(reservation.seat_count);
        if let Err(e) = self.inventory.adjust_seats(&reservation.flight_ref, delta).await {
            error!(
                reservation_id = %reservation.id,
                flight_ref = %reservation.flight_ref,
                seat_delta = delta,
                error = %e,
                "Seat decrement failed; rolling back reservation (remote side may still have applied it)"
            );
            return Err(e.into());
        }

        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skyhold_core::{ManualClock, ReservationStatus};
    use skyhold_store::{MemoryInventory, MemoryReservationStore};
    use crate::test_support::FaultyStore;

    struct Fixture {
        engine: BookingEngine,
        store: MemoryReservationStore,
        inventory: MemoryInventory,
    }

    fn fixture() -> Fixture {
        let store = MemoryReservationStore::new();
        let inventory = MemoryInventory::new();
        inventory.add_flight("SK-101", 50, 5000);
        let engine = BookingEngine::new(
            Arc::new(store.clone()),
            Arc::new(inventory.clone()),
            Arc::new(ManualClock::new(Utc::now())),
        );
        Fixture { engine, store, inventory }
    }

    fn request(seat_count: u32) -> NewReservation {
        NewReservation {
            flight_ref: "SK-101".to_string(),
            user_ref: "user-1".to_string(),
            seat_count,
        }
    }

    #[tokio::test]
    async fn test_create_computes_cost_and_decrements_inventory() {
        let f = fixture();

        let reservation = f.engine.create_reservation(request(2)).await.unwrap();

        assert_eq!(reservation.total_cost, 10_000);
        assert_eq!(reservation.status, ReservationStatus::Initiated);
        assert_eq!(f.store.get(reservation.id).await.unwrap(), Some(reservation));
        assert_eq!(f.inventory.adjustments(), vec![("SK-101".to_string(), -2)]);
        assert_eq!(f.inventory.available("SK-101"), Some(48));
    }

    #[tokio::test]
    async fn test_over_capacity_persists_nothing_and_skips_inventory() {
        let f = fixture();

        let result = f.engine.create_reservation(request(60)).await;

        assert!(matches!(
            result,
            Err(BookingError::InsufficientCapacity { requested: 60, capacity: 50 })
        ));
        assert!(f.store.is_empty().await);
        assert!(f.inventory.adjustments().is_empty());
    }

    #[tokio::test]
    async fn test_failed_decrement_rolls_back_insert() {
        let f = fixture();
        f.inventory.fail_next_adjustments(1);

        let result = f.engine.create_reservation(request(2)).await;

        assert!(matches!(result, Err(BookingError::InventoryUnavailable(InventoryError::Timeout))));
        assert!(f.store.is_empty().await);
        assert_eq!(f.inventory.available("SK-101"), Some(50));
    }

    #[tokio::test]
    async fn test_unavailable_inventory_fails_before_insert() {
        let f = fixture();
        f.inventory.set_unavailable(true);

        let result = f.engine.create_reservation(request(1)).await;

        assert!(matches!(result, Err(BookingError::InventoryUnavailable(_))));
        assert!(result.unwrap_err().is_retryable());
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_inventory() {
        let f = fixture();

        let result = f.engine.create_reservation(request(0)).await;

        assert!(matches!(result, Err(BookingError::Validation(_))));
        assert_eq!(f.inventory.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_reservation_not_found() {
        let f = fixture();
        let id = Uuid::new_v4();

        assert!(matches!(f.engine.get_reservation(id).await, Err(BookingError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_cost_overflow_is_a_validation_error() {
        let f = fixture();
        f.inventory.add_flight("SK-999", 50, i64::MAX);
        let mut req = request(2);
        req.flight_ref = "SK-999".to_string();

        let result = f.engine.create_reservation(req).await;

        assert!(matches!(result, Err(BookingError::Validation(_))));
        assert!(f.store.is_empty().await);
        assert!(f.inventory.adjustments().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_after_decrement_is_a_dependency_error() {
        let memory = MemoryReservationStore::new();
        let store = FaultyStore::new(Arc::new(memory.clone()));
        store.fail_commits();
        let inventory = MemoryInventory::new();
        inventory.add_flight("SK-101", 50, 5000);
        let engine = BookingEngine::new(
            Arc::new(store),
            Arc::new(inventory.clone()),
            Arc::new(ManualClock::new(Utc::now())),
        );

        let err = engine.create_reservation(request(2)).await.unwrap_err();

        match &err {
            BookingError::UnconfirmedHold { flight_ref, seat_count, .. } => {
                assert_eq!(flight_ref, "SK-101");
                assert_eq!(*seat_count, 2);
            }
            other => panic!("expected unconfirmed hold, got {:?}", other),
        }
        assert_eq!(err.code(), "UNCONFIRMED_INVENTORY_HOLD");
        assert!(err.is_retryable());
        // The remote side kept the decrement; nothing was stored locally
        assert_eq!(inventory.available("SK-101"), Some(48));
        assert!(memory.is_empty().await);
    }
}
