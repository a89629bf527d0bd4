mod common;

use common::{buy_request, notification, Harness, RESERVATION_TIMEOUT};
use ticket_reservations::domain::reservation::TrackingId;
use ticket_reservations::domain::ticket::TicketStatus;
use ticket_reservations::error::ReservationError;
use ticket_reservations::ledger::memory::FailPoint;
use ticket_reservations::service::reaper::{ReapEvent, ReapOutcome};
use ticket_reservations::service::reservation_store::ReservationStore;
use ticket_reservations::service::settlement::SettlementOutcome;
use uuid::Uuid;

async fn reserve_one(h: &Harness, event_id: Uuid) -> (TrackingId, i64) {
    h.ledger.seed_tickets(event_id, "VIP", 100_000, 2).await;
    let resp = h
        .checkout
        .buy(event_id, buy_request("VIP", 1, None))
        .await
        .expect("reservation");
    (TrackingId(resp.bill.link_id), resp.bill.amount)
}

#[tokio::test]
async fn repeated_success_notification_is_applied_once() {
    let h = Harness::new();
    let event_id = Uuid::new_v4();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;
    let paid = notification(tracking_id, "SUCCESSFUL", amount);

    let first = h.settlement.settle(&paid).await.unwrap();
    let second = h.settlement.settle(&paid).await.unwrap();

    assert_eq!(first, SettlementOutcome::Sold { tickets: 1 });
    assert_eq!(second, SettlementOutcome::Duplicate);

    let state = h.ledger.snapshot().await;
    assert_eq!(state.payments.len(), 1);
    assert_eq!(state.attendees.len(), 1);
    assert_eq!(state.count(event_id, "VIP", TicketStatus::Sold), 1);
    assert_eq!(h.wait_for_mail(1).await.len(), 1);
}

#[tokio::test]
async fn payment_row_guards_a_reservation_that_reappears() {
    let h = Harness::new();
    let event_id = Uuid::new_v4();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;
    let held = h.store.get(tracking_id).await.unwrap();

    h.settlement
        .settle(&notification(tracking_id, "SUCCESSFUL", amount))
        .await
        .unwrap();

    h.store.put(held).await;
    let replay = h
        .settlement
        .settle(&notification(tracking_id, "SUCCESSFUL", amount))
        .await
        .unwrap();

    assert_eq!(replay, SettlementOutcome::Duplicate);
    let state = h.ledger.snapshot().await;
    assert_eq!(state.payments.len(), 1);
    assert_eq!(state.attendees.len(), 1);
}

#[tokio::test]
async fn failed_and_expired_payments_release_tickets() {
    for status in ["FAILED", "EXPIRED", "CANCELLED"] {
        let h = Harness::new();
        let event_id = Uuid::new_v4();
        let (tracking_id, amount) = reserve_one(&h, event_id).await;

        let outcome = h
            .settlement
            .settle(&notification(tracking_id, status, amount))
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Released { tickets: 1 }, "{status}");

        let state = h.ledger.snapshot().await;
        assert_eq!(state.count(event_id, "VIP", TicketStatus::Available), 2);
        assert!(state.payments.is_empty());
        assert!(h.notifier.sent().is_empty());
    }
}

#[tokio::test]
async fn unrecognized_status_releases_the_hold() {
    let h = Harness::new();
    let event_id = Uuid::new_v4();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;

    let outcome = h
        .settlement
        .settle(&notification(tracking_id, "PENDING_REVIEW", amount))
        .await
        .unwrap();

    assert_eq!(outcome, SettlementOutcome::Released { tickets: 1 });
    assert_eq!(h.ledger.snapshot().await.count(event_id, "VIP", TicketStatus::Pending), 0);
}

#[tokio::test]
async fn notification_for_unknown_bill_is_ignored() {
    let h = Harness::new();
    let event_id = Uuid::new_v4();
    reserve_one(&h, event_id).await;

    let outcome = h
        .settlement
        .settle(&notification(TrackingId(424242), "SUCCESSFUL", 1000))
        .await
        .unwrap();

    assert_eq!(outcome, SettlementOutcome::Duplicate);
    assert_eq!(h.store.len().await, 1);
    assert!(h.ledger.snapshot().await.payments.is_empty());
}

#[tokio::test]
async fn failed_settlement_keeps_the_reservation_for_a_retry() {
    let h = Harness::new();
    let event_id = Uuid::new_v4();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;
    let paid = notification(tracking_id, "SUCCESSFUL", amount);

    h.ledger.fail_on(FailPoint::InsertAttendee);
    let err = h.settlement.settle(&paid).await.unwrap_err();
    assert!(matches!(err, ReservationError::PersistenceFailure(_)));

    let state = h.ledger.snapshot().await;
    assert!(state.payments.is_empty());
    assert!(state.attendees.is_empty());
    assert_eq!(state.count(event_id, "VIP", TicketStatus::Pending), 1);
    assert!(h.store.get(tracking_id).await.is_some());

    h.ledger.clear_failures();
    let retried = h.settlement.settle(&paid).await.unwrap();
    assert_eq!(retried, SettlementOutcome::Sold { tickets: 1 });
    assert_eq!(h.ledger.snapshot().await.count(event_id, "VIP", TicketStatus::Sold), 1);
}

#[tokio::test(start_paused = true)]
async fn unpaid_reservation_times_out_and_late_payment_is_ignored() {
    let h = Harness::new();
    let mut events = h.reaper.subscribe();
    let event_id = Uuid::new_v4();
    let started = tokio::time::Instant::now();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;

    let ReapEvent { tracking_id: reaped, outcome } = events.recv().await.unwrap();
    assert!(started.elapsed() >= RESERVATION_TIMEOUT);
    assert_eq!(reaped, tracking_id);
    assert_eq!(outcome, ReapOutcome::Released { tickets: 1 });

    let state = h.ledger.snapshot().await;
    assert_eq!(state.count(event_id, "VIP", TicketStatus::Available), 2);
    assert_eq!(h.store.len().await, 0);

    let late = h
        .settlement
        .settle(&notification(tracking_id, "SUCCESSFUL", amount))
        .await
        .unwrap();
    assert_eq!(late, SettlementOutcome::Duplicate);

    let state = h.ledger.snapshot().await;
    assert!(state.payments.is_empty());
    assert_eq!(state.count(event_id, "VIP", TicketStatus::Sold), 0);
}

#[tokio::test(start_paused = true)]
async fn settled_reservation_is_left_alone_by_the_reaper() {
    let h = Harness::new();
    let event_id = Uuid::new_v4();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;

    h.settlement
        .settle(&notification(tracking_id, "SUCCESSFUL", amount))
        .await
        .unwrap();

    tokio::time::sleep(RESERVATION_TIMEOUT * 2).await;
    assert_eq!(h.ledger.snapshot().await.count(event_id, "VIP", TicketStatus::Sold), 1);

    let outcome = h.reaper.reap(tracking_id).await.unwrap();
    assert_eq!(outcome, ReapOutcome::AlreadySettled);
    assert_eq!(h.ledger.snapshot().await.count(event_id, "VIP", TicketStatus::Sold), 1);
}

#[tokio::test(start_paused = true)]
async fn reaper_picks_up_a_reservation_whose_settlement_failed() {
    let h = Harness::new();
    let mut events = h.reaper.subscribe();
    let event_id = Uuid::new_v4();
    let (tracking_id, amount) = reserve_one(&h, event_id).await;

    h.ledger.fail_on(FailPoint::InsertPayment);
    h.settlement
        .settle(&notification(tracking_id, "SUCCESSFUL", amount))
        .await
        .unwrap_err();
    h.ledger.clear_failures();

    let event = events.recv().await.unwrap();
    assert_eq!(event.tracking_id, tracking_id);
    assert_eq!(event.outcome, ReapOutcome::Released { tickets: 1 });
    assert_eq!(h.ledger.snapshot().await.count(event_id, "VIP", TicketStatus::Available), 2);
}

#[tokio::test(start_paused = true)]
async fn reaper_retries_after_a_failed_release() {
    let h = Harness::new();
    let mut events = h.reaper.subscribe();
    let event_id = Uuid::new_v4();
    let (tracking_id, _) = reserve_one(&h, event_id).await;

    h.ledger.fail_on(FailPoint::Commit);
    let first = events.recv().await.unwrap();
    assert!(matches!(first.outcome, ReapOutcome::Failed(_)));
    assert!(h.store.get(tracking_id).await.is_some());
    assert_eq!(h.ledger.snapshot().await.count(event_id, "VIP", TicketStatus::Pending), 1);

    h.ledger.clear_failures();
    let second = events.recv().await.unwrap();
    assert_eq!(second.outcome, ReapOutcome::Released { tickets: 1 });
    assert_eq!(h.store.len().await, 0);
}

#[tokio::test]
async fn success_status_must_match_the_gateway_spelling() {
    for status in ["successful", " SUCCESSFUL ", "Successful"] {
        let h = Harness::new();
        let event_id = Uuid::new_v4();
        let (tracking_id, amount) = reserve_one(&h, event_id).await;

        let outcome = h
            .settlement
            .settle(&notification(tracking_id, status, amount))
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Released { tickets: 1 }, "{status:?}");

        let state = h.ledger.snapshot().await;
        assert!(state.payments.is_empty());
        assert_eq!(state.count(event_id, "VIP", TicketStatus::Sold), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn reaper_stops_once_every_handle_is_dropped() {
    let h = Harness::new();
    let mut events = h.reaper.subscribe();
    drop(h);

    let closed = tokio::time::timeout(RESERVATION_TIMEOUT, events.recv()).await;
    assert!(matches!(closed, Ok(Err(tokio::sync::broadcast::error::RecvError::Closed))));
}
