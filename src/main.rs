use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use ticket_reservations::config::AppConfig;
use ticket_reservations::gateways::flip::FlipGateway;
use ticket_reservations::gateways::mock::MockBillingGateway;
use ticket_reservations::gateways::BillingGateway;
use ticket_reservations::ledger::postgres::PgTicketLedger;
use ticket_reservations::ledger::TicketLedger;
use ticket_reservations::service::checkout_service::{CheckoutService, CheckoutSettings};
use ticket_reservations::service::notifier::{HttpNotifier, LogNotifier, Notifier};
use ticket_reservations::service::reaper::TimeoutReaper;
use ticket_reservations::service::reservation_store::{InMemoryReservationStore, ReservationStore};
use ticket_reservations::service::settlement::SettlementProcessor;
use ticket_reservations::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let client = reqwest::Client::new();
    let ledger: Arc<dyn TicketLedger> = Arc::new(PgTicketLedger::new(pool));
    let store: Arc<dyn ReservationStore> = Arc::new(InMemoryReservationStore::new());
    let reaper = TimeoutReaper::spawn(ledger.clone(), store.clone(), cfg.reservation_timeout);

    let gateway: Arc<dyn BillingGateway> = if cfg.billing_adapter == "mock" {
        tracing::warn!("using mock billing gateway");
        Arc::new(MockBillingGateway::new("ALWAYS_SUCCESS"))
    } else {
        Arc::new(FlipGateway {
            base_url: cfg.flip_base_url.clone(),
            secret_key: cfg.flip_secret_key.clone(),
            timeout_ms: cfg.gateway_timeout_ms,
            client: client.clone(),
        })
    };

    let notifier: Arc<dyn Notifier> = match &cfg.notify_relay_url {
        Some(relay_url) => Arc::new(HttpNotifier {
            relay_url: relay_url.clone(),
            client: client.clone(),
        }),
        None => Arc::new(LogNotifier),
    };

    let checkout = CheckoutService {
        ledger: ledger.clone(),
        store: store.clone(),
        reaper: reaper.clone(),
        gateway,
        settings: CheckoutSettings {
            service_fee_per_ticket: cfg.service_fee_per_ticket,
            bill_expiry: chrono::Duration::minutes(cfg.bill_expiry_minutes),
            redirect_url: cfg.bill_redirect_url.clone(),
        },
    };

    let settlement = SettlementProcessor {
        ledger: ledger.clone(),
        store: store.clone(),
        reaper,
        notifier,
    };

    let state = AppState {
        checkout,
        settlement,
        ledger,
        store,
        callback_token: cfg.flip_validation_token.clone(),
    };

    let app = ticket_reservations::http::router::app(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
