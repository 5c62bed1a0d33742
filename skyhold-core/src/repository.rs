use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::reservation::{Reservation, ReservationStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Corrupt reservation row {id}: {reason}")]
    CorruptRow { id: Uuid, reason: String },
    #[error("Reservation already exists: {0}")]
    Duplicate(Uuid),
}

/// Persistence for reservations.
///
/// Single-row writes happen inside a [`ReservationTx`]; the sweeper's bulk
/// expiry is one conditional statement and needs no explicit transaction.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Open a unit of work. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError>;

    /// Read committed state, no locks taken.
    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError>;

    /// Cancel every open reservation created before `threshold`.
    /// Returns the number of rows cancelled.
    async fn expire_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ReservationTx: Send {
    async fn insert(&mut self, reservation: &Reservation) -> Result<(), StoreError>;

    /// Fetch a reservation and hold its row until the transaction ends.
    async fn fetch_for_update(&mut self, id: Uuid) -> Result<Option<Reservation>, StoreError>;

    /// Compare-and-swap on status: moves the row to `to` only if its current
    /// status is one of `expected`. `None` means no row matched.
    async fn transition(
        &mut self,
        id: Uuid,
        expected: &[ReservationStatus],
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
