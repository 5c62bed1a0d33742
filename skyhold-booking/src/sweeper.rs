use chrono::Duration;
use skyhold_core::{Clock, ReservationStore, StoreError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed { cancelled: u64 },
    /// Another sweep was still running
    Skipped,
}

/// Periodically cancels reservations that were never paid.
///
/// Each tick issues one conditional bulk update. Remote seats are not
/// returned here; that is left to the inventory service's reconciliation.
pub struct ExpirySweeper {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    payment_window: Duration,
    period: std::time::Duration,
    running: Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        payment_window: Duration,
        period: std::time::Duration,
    ) -> Self {
        Self { store, clock, payment_window, period, running: Mutex::new(()) }
    }

    /// Run one sweep unless one is already in progress.
    pub async fn tick(&self) -> Result<SweepOutcome, StoreError> {
        let Ok(_running) = self.running.try_lock() else {
            debug!("Previous sweep still running, skipping tick");
            return Ok(SweepOutcome::Skipped);
        };

        let now = self.clock.now();
        let threshold = now - self.payment_window;
        let cancelled = self.store.expire_stale(threshold, now).await?;

        if cancelled > 0 {
            info!(cancelled, %threshold, "Cancelled unpaid reservations");
        } else {
            debug!(%threshold, "No reservations to expire");
        }
        Ok(SweepOutcome::Completed { cancelled })
    }

    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "Expiry sweeper started");

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                error!(error = %e, "Expiry sweep failed");
            }
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skyhold_core::{ManualClock, NewReservation, Reservation, ReservationStatus};
    use skyhold_store::MemoryReservationStore;

    fn reservation(created_at: chrono::DateTime<Utc>, status: ReservationStatus) -> Reservation {
        let mut r = Reservation::new(
            NewReservation {
                flight_ref: "SK-101".to_string(),
                user_ref: "user-1".to_string(),
                seat_count: 1,
            },
            5000,
            created_at,
        );
        r.status = status;
        r
    }

    async fn status_of(store: &MemoryReservationStore, r: &Reservation) -> ReservationStatus {
        store.get(r.id).await.unwrap().unwrap().status
    }

    fn sweeper(store: &MemoryReservationStore, clock: Arc<ManualClock>) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::new(store.clone()),
            clock,
            Duration::minutes(15),
            std::time::Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_tick_cancels_only_stale_open_reservations() {
        let store = MemoryReservationStore::new();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let old = now - Duration::minutes(20);

        let stale = reservation(old, ReservationStatus::Initiated);
        let stale_pending = reservation(old, ReservationStatus::Pending);
        let booked = reservation(old, ReservationStatus::Booked);
        let recent = reservation(now - Duration::minutes(5), ReservationStatus::Initiated);
        for r in [&stale, &stale_pending, &booked, &recent] {
            store.put(r.clone()).await;
        }

        let outcome = sweeper(&store, clock).tick().await.unwrap();

        assert_eq!(outcome, SweepOutcome::Completed { cancelled: 2 });
        assert_eq!(status_of(&store, &stale).await, ReservationStatus::Cancelled);
        assert_eq!(status_of(&store, &stale_pending).await, ReservationStatus::Cancelled);
        assert_eq!(status_of(&store, &booked).await, ReservationStatus::Booked);
        assert_eq!(status_of(&store, &recent).await, ReservationStatus::Initiated);
    }

    #[tokio::test]
    async fn test_reservation_exactly_at_threshold_survives() {
        let store = MemoryReservationStore::new();
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(created + Duration::minutes(15)));
        let r = reservation(created, ReservationStatus::Initiated);
        store.put(r.clone()).await;
        let sweeper = sweeper(&store, clock.clone());

        assert_eq!(sweeper.tick().await.unwrap(), SweepOutcome::Completed { cancelled: 0 });
        assert_eq!(status_of(&store, &r).await, ReservationStatus::Initiated);

        clock.advance(Duration::microseconds(1));
        assert_eq!(sweeper.tick().await.unwrap(), SweepOutcome::Completed { cancelled: 1 });
        assert_eq!(status_of(&store, &r).await, ReservationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_second_tick_finds_nothing_left() {
        let store = MemoryReservationStore::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        store.put(reservation(clock.now() - Duration::minutes(30), ReservationStatus::Initiated)).await;
        let sweeper = sweeper(&store, clock);

        assert_eq!(sweeper.tick().await.unwrap(), SweepOutcome::Completed { cancelled: 1 });
        assert_eq!(sweeper.tick().await.unwrap(), SweepOutcome::Completed { cancelled: 0 });
    }

    #[tokio::test]
    async fn test_tick_skips_while_a_sweep_is_running() {
        let store = MemoryReservationStore::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        store.put(reservation(clock.now() - Duration::minutes(30), ReservationStatus::Initiated)).await;
        let sweeper = sweeper(&store, clock);

        let held = sweeper.running.lock().await;
        assert_eq!(sweeper.tick().await.unwrap(), SweepOutcome::Skipped);
        drop(held);

        assert_eq!(sweeper.tick().await.unwrap(), SweepOutcome::Completed { cancelled: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_sweeps_on_its_period() {
        let store = MemoryReservationStore::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let r = reservation(clock.now(), ReservationStatus::Initiated);
        store.put(r.clone()).await;

        let handle = Arc::new(sweeper(&store, clock.clone())).spawn();

        // Reservation ages past the window; the next periodic tick picks it up
        clock.advance(Duration::minutes(16));
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;

        assert_eq!(status_of(&store, &r).await, ReservationStatus::Cancelled);
        handle.abort();
    }
}
