//! Runs against a real Postgres when `TEST_DATABASE_URL` is set; skipped otherwise.

mod common;

use common::{buy_request, notification};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use ticket_reservations::domain::reservation::TrackingId;
use ticket_reservations::error::ReservationError;
use ticket_reservations::gateways::mock::MockBillingGateway;
use ticket_reservations::gateways::{BillingGateway, CreateBillRequest, CreateBillResponse};
use ticket_reservations::ledger::postgres::PgTicketLedger;
use ticket_reservations::ledger::TicketLedger;
use ticket_reservations::service::checkout_service::{CheckoutService, CheckoutSettings};
use ticket_reservations::service::notifier::LogNotifier;
use ticket_reservations::service::reaper::TimeoutReaper;
use ticket_reservations::service::reservation_store::InMemoryReservationStore;
use ticket_reservations::service::settlement::{SettlementOutcome, SettlementProcessor};
use uuid::Uuid;

/// Link ids must not collide with rows left by earlier runs.
struct RandomLinkGateway(MockBillingGateway);

#[async_trait::async_trait]
impl BillingGateway for RandomLinkGateway {
    fn name(&self) -> &'static str {
        "random-link"
    }

    async fn create_bill(&self, request: CreateBillRequest) -> Result<CreateBillResponse, ReservationError> {
        let mut bill = self.0.create_bill(request).await?;
        bill.link_id = (Uuid::new_v4().as_u128() >> 66) as i64;
        Ok(bill)
    }
}

async fn pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new().max_connections(16).connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some(pool)
}

fn services(pool: &PgPool) -> (CheckoutService, SettlementProcessor) {
    let ledger: Arc<dyn TicketLedger> = Arc::new(PgTicketLedger::new(pool.clone()));
    let store = Arc::new(InMemoryReservationStore::new());
    let reaper = TimeoutReaper::spawn(ledger.clone(), store.clone(), common::RESERVATION_TIMEOUT);

    let checkout = CheckoutService {
        ledger: ledger.clone(),
        store: store.clone(),
        reaper: reaper.clone(),
        gateway: Arc::new(RandomLinkGateway(MockBillingGateway::new("ALWAYS_SUCCESS"))),
        settings: CheckoutSettings::default(),
    };
    let settlement = SettlementProcessor {
        ledger,
        store,
        reaper,
        notifier: Arc::new(LogNotifier),
    };
    (checkout, settlement)
}

async fn seed_tickets(pool: &PgPool, event_id: Uuid, name: &str, price: i64, count: usize) {
    for _ in 0..count {
        sqlx::query("INSERT INTO tickets (event_id, name, price, hash) VALUES ($1, $2, $3, $4)")
            .bind(event_id)
            .bind(name)
            .bind(price)
            .bind(Uuid::new_v4().simple().to_string())
            .execute(pool)
            .await
            .unwrap();
    }
}

async fn count_status(pool: &PgPool, event_id: Uuid, status: &str) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM tickets WHERE event_id = $1 AND status = $2::ticket_status")
        .bind(event_id)
        .bind(status)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn skip_locked_allocation_never_oversells() {
    let Some(pool) = pool().await else {
        return;
    };
    let (checkout, _) = services(&pool);
    let event_id = Uuid::new_v4();
    seed_tickets(&pool, event_id, "VIP", 100_000, 5).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let checkout = checkout.clone();
        handles.push(tokio::spawn(async move {
            checkout.buy(event_id, buy_request("VIP", 1, None)).await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(ReservationError::InsufficientInventory { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(won, 5);
    assert_eq!(count_status(&pool, event_id, "pending").await, 5);
    assert_eq!(count_status(&pool, event_id, "available").await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locked_referral_row_admits_one_redemption() {
    let Some(pool) = pool().await else {
        return;
    };
    let (checkout, _) = services(&pool);
    let event_id = Uuid::new_v4();
    let code = format!("ONCE-{}", Uuid::new_v4().simple());
    seed_tickets(&pool, event_id, "VIP", 100_000, 4).await;
    sqlx::query("INSERT INTO referral_codes (code, discount_percentage, max_uses) VALUES ($1, 50, 1)")
        .bind(&code)
        .execute(&pool)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let checkout = checkout.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            checkout.buy(event_id, buy_request("VIP", 1, Some(&code))).await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(ReservationError::ReferralExhausted(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(won, 1);

    let uses: i32 = sqlx::query("SELECT current_uses FROM referral_codes WHERE code = $1")
        .bind(&code)
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("current_uses");
    assert_eq!(uses, 1);
    assert_eq!(count_status(&pool, event_id, "pending").await, 1);
}

#[tokio::test]
async fn sale_round_trip_writes_payment_and_attendees() {
    let Some(pool) = pool().await else {
        return;
    };
    let (checkout, settlement) = services(&pool);
    let event_id = Uuid::new_v4();
    seed_tickets(&pool, event_id, "VIP", 100_000, 3).await;

    let resp = checkout.buy(event_id, buy_request("VIP", 2, None)).await.unwrap();
    let tracking_id = TrackingId(resp.bill.link_id);

    let outcome = settlement
        .settle(&notification(tracking_id, "SUCCESSFUL", resp.bill.amount))
        .await
        .unwrap();
    assert_eq!(outcome, SettlementOutcome::Sold { tickets: 2 });
    assert_eq!(count_status(&pool, event_id, "sold").await, 2);

    let attendees: i64 = sqlx::query("SELECT COUNT(*) AS n FROM attendees WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(attendees, 2);
}
