pub mod config;
pub mod domain {
    pub mod attendee;
    pub mod payment;
    pub mod referral;
    pub mod reservation;
    pub mod ticket;
}
pub mod error;
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod payments;
        pub mod tickets;
    }
    pub mod router;
}
pub mod ledger;
pub mod repo {
    pub mod attendees_repo;
    pub mod payments_repo;
    pub mod referral_repo;
    pub mod tickets_repo;
}
pub mod service {
    pub mod allocator;
    pub mod checkout_service;
    pub mod notifier;
    pub mod reaper;
    pub mod referral_validator;
    pub mod reservation_store;
    pub mod settlement;
}

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub checkout: service::checkout_service::CheckoutService,
    pub settlement: service::settlement::SettlementProcessor,
    pub ledger: Arc<dyn ledger::TicketLedger>,
    pub store: Arc<dyn service::reservation_store::ReservationStore>,
    pub callback_token: Option<String>,
}
