pub mod booking;
pub mod payment;
pub mod sweeper;

#[cfg(test)]
mod test_support;

pub use booking::BookingEngine;
pub use payment::{PaymentEngine, PaymentRequest};
pub use sweeper::{ExpirySweeper, SweepOutcome};

use skyhold_core::ReservationTx;
use tracing::warn;

/// Roll back a unit of work that is being abandoned. A failed rollback is
/// only logged: the caller is already returning the error that caused it,
/// and the database discards the transaction when the connection drops.
pub(crate) async fn abort(tx: Box<dyn ReservationTx>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed");
    }
}
