use async_trait::async_trait;
use crate::repository::StoreError;
use crate::reservation::Reservation;

/// Remembers the outcome of a payment so a replayed request gets the same
/// answer without touching the reservation again.
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<Reservation>, StoreError>;

    /// Store `outcome` under `key` unless an entry already exists.
    /// Returns `false` when an earlier writer won.
    async fn record(&self, key: &str, outcome: &Reservation) -> Result<bool, StoreError>;
}
