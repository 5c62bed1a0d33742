//! Fault-injecting wrappers used by the engine unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_core::{
    IdempotencyLedger, Reservation, ReservationStatus, ReservationStore, ReservationTx, StoreError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct Faults {
    fail_commit: AtomicBool,
    miss_transitions: AtomicBool,
}

/// Delegates to an inner store but can fail commits or make every
/// conditional update match no row.
#[derive(Clone)]
pub struct FaultyStore {
    inner: Arc<dyn ReservationStore>,
    faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn ReservationStore>) -> Self {
        Self { inner, faults: Arc::new(Faults::default()) }
    }

    pub fn fail_commits(&self) {
        self.faults.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn miss_transitions(&self) {
        self.faults.miss_transitions.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReservationStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn ReservationTx>, StoreError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTx { inner, faults: self.faults.clone() }))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        self.inner.get(id).await
    }

    async fn expire_stale(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.inner.expire_stale(threshold, now).await
    }
}

struct FaultyTx {
    inner: Box<dyn ReservationTx>,
    faults: Arc<Faults>,
}

#[async_trait]
impl ReservationTx for FaultyTx {
    async fn insert(&mut self, reservation: &Reservation) -> Result<(), StoreError> {
        self.inner.insert(reservation).await
    }

    async fn fetch_for_update(&mut self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        self.inner.fetch_for_update(id).await
    }

    async fn transition(
        &mut self,
        id: Uuid,
        expected: &[ReservationStatus],
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Reservation>, StoreError> {
        if self.faults.miss_transitions.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.transition(id, expected, to, now).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            self.inner.rollback().await?;
            return Err(StoreError::Database("connection reset during commit".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

/// Ledger that never finds anything and fails every write.
pub struct BrokenLedger;

#[async_trait]
impl IdempotencyLedger for BrokenLedger {
    async fn lookup(&self, _key: &str) -> Result<Option<Reservation>, StoreError> {
        Ok(None)
    }

    async fn record(&self, _key: &str, _outcome: &Reservation) -> Result<bool, StoreError> {
        Err(StoreError::Cache("connection refused".to_string()))
    }
}
