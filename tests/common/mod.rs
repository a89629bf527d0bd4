#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticket_reservations::domain::payment::PaymentNotification;
use ticket_reservations::domain::reservation::{AttendeePayload, BuyTicketRequest, TrackingId};
use ticket_reservations::error::ReservationError;
use ticket_reservations::gateways::mock::MockBillingGateway;
use ticket_reservations::gateways::{BillingGateway, CreateBillRequest, CreateBillResponse};
use ticket_reservations::ledger::memory::MemoryTicketLedger;
use ticket_reservations::service::checkout_service::{CheckoutService, CheckoutSettings};
use ticket_reservations::service::notifier::{ConfirmationMail, Notifier};
use ticket_reservations::service::reaper::TimeoutReaper;
use ticket_reservations::service::reservation_store::{InMemoryReservationStore, ReservationStore};
use ticket_reservations::service::settlement::SettlementProcessor;
use ticket_reservations::AppState;

pub const RESERVATION_TIMEOUT: Duration = Duration::from_secs(7 * 60);

#[derive(Default)]
pub struct RecordingNotifier {
    pub mails: Mutex<Vec<ConfirmationMail>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<ConfirmationMail> {
        self.mails.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send_confirmation(&self, mail: ConfirmationMail) -> anyhow::Result<()> {
        self.mails.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Gateway that hands out the same link id for every bill.
pub struct FixedLinkGateway {
    pub link_id: i64,
    inner: MockBillingGateway,
}

impl FixedLinkGateway {
    pub fn new(link_id: i64) -> Self {
        Self {
            link_id,
            inner: MockBillingGateway::new("ALWAYS_SUCCESS"),
        }
    }
}

#[async_trait::async_trait]
impl BillingGateway for FixedLinkGateway {
    fn name(&self) -> &'static str {
        "fixed-link"
    }

    async fn create_bill(&self, request: CreateBillRequest) -> Result<CreateBillResponse, ReservationError> {
        let mut bill = self.inner.create_bill(request).await?;
        bill.link_id = self.link_id;
        Ok(bill)
    }
}

pub struct Harness {
    pub ledger: MemoryTicketLedger,
    pub store: Arc<InMemoryReservationStore>,
    pub gateway: Arc<MockBillingGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub reaper: TimeoutReaper,
    pub checkout: CheckoutService,
    pub settlement: SettlementProcessor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway("ALWAYS_SUCCESS")
    }

    pub fn with_gateway(behavior: &str) -> Self {
        let ledger = MemoryTicketLedger::new();
        let store = Arc::new(InMemoryReservationStore::new());
        let gateway = Arc::new(MockBillingGateway::new(behavior));
        let notifier = Arc::new(RecordingNotifier::default());

        let reaper = TimeoutReaper::spawn(Arc::new(ledger.clone()), store.clone(), RESERVATION_TIMEOUT);

        let checkout = CheckoutService {
            ledger: Arc::new(ledger.clone()),
            store: store.clone(),
            reaper: reaper.clone(),
            gateway: gateway.clone(),
            settings: CheckoutSettings::default(),
        };
        let settlement = SettlementProcessor {
            ledger: Arc::new(ledger.clone()),
            store: store.clone(),
            reaper: reaper.clone(),
            notifier: notifier.clone(),
        };

        Self {
            ledger,
            store,
            gateway,
            notifier,
            reaper,
            checkout,
            settlement,
        }
    }

    pub fn app_state(&self, callback_token: Option<&str>) -> AppState {
        AppState {
            checkout: self.checkout.clone(),
            settlement: self.settlement.clone(),
            ledger: Arc::new(self.ledger.clone()),
            store: self.store.clone() as Arc<dyn ReservationStore>,
            callback_token: callback_token.map(str::to_string),
        }
    }

    /// Waits for spawned confirmation tasks to run.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<ConfirmationMail> {
        for _ in 0..100 {
            let sent = self.notifier.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::task::yield_now().await;
        }
        self.notifier.sent()
    }
}

pub fn attendee(name: &str) -> AttendeePayload {
    HashMap::from([
        ("name".to_string(), name.to_string()),
        ("email".to_string(), format!("{}@example.com", name.to_lowercase())),
    ])
}

pub fn buy_request(ticket_name: &str, amount: i64, referral_code: Option<&str>) -> BuyTicketRequest {
    BuyTicketRequest {
        ticket_name: ticket_name.to_string(),
        ticket_amount: amount,
        referral_code: referral_code.map(str::to_string),
        attendees: (0..amount.max(0)).map(|i| attendee(&format!("Guest{i}"))).collect(),
    }
}

pub fn notification(tracking_id: TrackingId, status: &str, amount: i64) -> PaymentNotification {
    PaymentNotification {
        id: format!("FT{}", tracking_id.0),
        bill_link: format!("mock.bill/{}", tracking_id.0),
        bill_link_id: tracking_id.0,
        bill_title: "VIP".to_string(),
        sender_name: "Budi".to_string(),
        sender_bank: "bca".to_string(),
        sender_email: "budi@example.com".to_string(),
        amount,
        status: status.to_string(),
        sender_bank_type: "bank_account".to_string(),
        created_at: "2026-10-17 10:00:00".to_string(),
    }
}
