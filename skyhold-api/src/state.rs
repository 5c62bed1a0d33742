use std::sync::Arc;
use skyhold_booking::{BookingEngine, ExpirySweeper, PaymentEngine};
use skyhold_core::{Clock, IdempotencyLedger, InventoryClient, ReservationStore};
use skyhold_store::app_config::BookingRules;

#[derive(Clone)]
pub struct AppState {
    pub booking: Arc<BookingEngine>,
    pub payment: Arc<PaymentEngine>,
    pub sweeper: Arc<ExpirySweeper>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        ledger: Arc<dyn IdempotencyLedger>,
        inventory: Arc<dyn InventoryClient>,
        clock: Arc<dyn Clock>,
        rules: &BookingRules,
    ) -> Self {
        let booking = BookingEngine::new(store.clone(), inventory, clock.clone());
        let payment = PaymentEngine::new(store.clone(), ledger, clock.clone(), rules.payment_window());
        let sweeper = ExpirySweeper::new(store, clock, rules.payment_window(), rules.sweep_interval());

        Self {
            booking: Arc::new(booking),
            payment: Arc::new(payment),
            sweeper: Arc::new(sweeper),
        }
    }
}
