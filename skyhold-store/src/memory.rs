//! Process-local backends for the reservation store, the idempotency ledger
//! and the inventory service. Used by tests and for running the API without
//! Postgres, Redis or a live inventory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_core::{
    FlightInfo, IdempotencyLedger, InventoryClient, InventoryError, Reservation, ReservationStatus,
    ReservationStore, ReservationTx, StoreError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

type Rows = HashMap<Uuid, Reservation>;

/// In-memory reservation store.
///
/// A transaction holds the table lock from `begin` until it ends, so
/// transactions are fully serialized. Writes are staged and only become
/// visible on `commit`.
#[derive(Clone, Default)]
pub struct MemoryReservationStore {
    rows: Arc<Mutex<Rows>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a row directly, bypassing the booking flow.
    pub async fn put(&self, reservation: Reservation) {
        self.rows.lock().await.insert(reservation.id, reservation);
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        let guard = self.rows.clone().lock_owned().await;
        Ok(Box::new(MemoryReservationTx { guard, staged: HashMap::new() }))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn expire_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        let mut cancelled = 0;
        for reservation in rows.values_mut() {
            if reservation.created_at < threshold && !reservation.status.is_terminal() {
                reservation.status = ReservationStatus::Cancelled;
                reservation.updated_at = now;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

struct MemoryReservationTx {
    guard: OwnedMutexGuard<Rows>,
    staged: Rows,
}

impl MemoryReservationTx {
    fn current(&self, id: &Uuid) -> Option<&Reservation> {
        self.staged.get(id).or_else(|| self.guard.get(id))
    }
}

#[async_trait]
impl ReservationTx for MemoryReservationTx {
    async fn insert(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        if self.current(&reservation.id).is_some() {
            return Err(StoreError::Duplicate(reservation.id));
        }
        self.staged.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn fetch_for_update(&mut self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        Ok(self.current(&id).cloned())
    }

    async fn transition(
        &mut self,
        id: Uuid,
        expected: &[ReservationStatus],
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut reservation = match self.current(&id) {
            Some(r) if expected.contains(&r.status) => r.clone(),
            _ => return Ok(None),
        };
        reservation.status = to;
        reservation.updated_at = now;
        self.staged.insert(id, reservation.clone());
        Ok(Some(reservation))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryReservationTx { mut guard, staged } = *self;
        guard.extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

struct LedgerEntry {
    outcome: Reservation,
    expires_at: Instant,
}

/// In-memory idempotency ledger with a fixed time-to-live per entry.
pub struct MemoryIdempotencyLedger {
    ttl: Duration,
    entries: RwLock<HashMap<String, LedgerEntry>>,
}

impl MemoryIdempotencyLedger {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl IdempotencyLedger for MemoryIdempotencyLedger {
    async fn lookup(&self, key: &str) -> Result<Option<Reservation>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.outcome.clone()))
    }

    async fn record(&self, key: &str, outcome: &Reservation) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);

        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            LedgerEntry { outcome: outcome.clone(), expires_at: now + self.ttl },
        );
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy)]
struct FlightState {
    available: i64,
    unit_price: i64,
}

#[derive(Default)]
struct InventoryState {
    flights: HashMap<String, FlightState>,
    adjustments: Vec<(String, i64)>,
    fetch_calls: usize,
    unavailable: bool,
    fail_adjustments: usize,
}

/// In-process stand-in for the flight inventory service.
///
/// `fetch_flight` reports the seats still available as capacity. Adjustments
/// are applied atomically and refused if they would take the counter below
/// zero, the same guarantee the remote service gives.
#[derive(Clone, Default)]
pub struct MemoryInventory {
    state: Arc<std::sync::Mutex<InventoryState>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_flight(&self, flight_ref: &str, capacity: u32, unit_price: i64) {
        self.state().flights.insert(
            flight_ref.to_string(),
            FlightState { available: capacity as i64, unit_price },
        );
    }

    pub fn set_unit_price(&self, flight_ref: &str, unit_price: i64) {
        if let Some(flight) = self.state().flights.get_mut(flight_ref) {
            flight.unit_price = unit_price;
        }
    }

    pub fn available(&self, flight_ref: &str) -> Option<i64> {
        self.state().flights.get(flight_ref).map(|f| f.available)
    }

    /// Every successful seat adjustment, in order.
    pub fn adjustments(&self) -> Vec<(String, i64)> {
        self.state().adjustments.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state().fetch_calls
    }

    /// Make every call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Fail the next `count` seat adjustments.
    pub fn fail_next_adjustments(&self, count: usize) {
        self.state().fail_adjustments = count;
    }
}

#[async_trait]
impl InventoryClient for MemoryInventory {
    async fn fetch_flight(&self, flight_ref: &str) -> Result<FlightInfo, InventoryError> {
        let mut state = self.state();
        state.fetch_calls += 1;
        if state.unavailable {
            return Err(InventoryError::Request("inventory offline".to_string()));
        }
        let flight = state.flights.get(flight_ref).copied().ok_or_else(|| InventoryError::Status {
            status: 404,
            body: format!("unknown flight {}", flight_ref),
        })?;

        Ok(FlightInfo {
            capacity: u32::try_from(flight.available.max(0)).unwrap_or(u32::MAX),
            unit_price: flight.unit_price,
        })
    }

    async fn adjust_seats(&self, flight_ref: &str, delta: i64) -> Result<(), InventoryError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(InventoryError::Request("inventory offline".to_string()));
        }
        if state.fail_adjustments > 0 {
            state.fail_adjustments -= 1;
            return Err(InventoryError::Timeout);
        }
        let flight = state.flights.get_mut(flight_ref).ok_or_else(|| InventoryError::Status {
            status: 404,
            body: format!("unknown flight {}", flight_ref),
        })?;
        if flight.available + delta < 0 {
            return Err(InventoryError::Status {
                status: 409,
                body: format!("only {} seats left", flight.available),
            });
        }
        flight.available += delta;
        state.adjustments.push((flight_ref.to_string(), delta));
        Ok(())
    }
}
