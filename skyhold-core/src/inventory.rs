use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Flight data as reported by the inventory service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlightInfo {
    pub capacity: u32,
    /// Minor currency units per seat
    pub unit_price: i64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InventoryError {
    #[error("request to inventory service failed: {0}")]
    Request(String),
    #[error("request to inventory service timed out")]
    Timeout,
    #[error("inventory service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed inventory response: {0}")]
    Decode(String),
}

/// Client for the external seat-inventory service.
///
/// Each call is a single round trip: no retries, no caching.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn fetch_flight(&self, flight_ref: &str) -> Result<FlightInfo, InventoryError>;

    /// Adjust available seats by a signed delta (negative to take seats).
    async fn adjust_seats(&self, flight_ref: &str, delta: i64) -> Result<(), InventoryError>;
}
