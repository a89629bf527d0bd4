//! Timeout reaper: one actor task owns a deadline queue keyed by tracking id and
//! releases reservations nobody settled in time.
//!
//! A timer is never cancelled outright. Settling a reservation resolves its entry,
//! and a timer that still fires finds either a payment row or an empty store slot
//! and does nothing. Deadlines run on `tokio::time`, so paused-clock tests can
//! fast-forward through them.

use crate::domain::reservation::TrackingId;
use crate::domain::ticket::TicketStatus;
use crate::error::ReservationError;
use crate::ledger::TicketLedger;
use crate::service::reservation_store::ReservationStore;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapOutcome {
    Released { tickets: u64 },
    AlreadySettled,
    AlreadyConsumed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapEvent {
    pub tracking_id: TrackingId,
    pub outcome: ReapOutcome,
}

enum TimerCommand {
    Schedule(TrackingId, Instant),
    Resolve(TrackingId),
}

/// What a firing timer needs. Holds no command sender, so the actor stops once every
/// `TimeoutReaper` handle is dropped.
#[derive(Clone)]
struct Releaser {
    ledger: Arc<dyn TicketLedger>,
    store: Arc<dyn ReservationStore>,
    events: broadcast::Sender<ReapEvent>,
}

#[derive(Clone)]
pub struct TimeoutReaper {
    releaser: Releaser,
    delay: Duration,
    commands: mpsc::UnboundedSender<TimerCommand>,
}

impl TimeoutReaper {
    /// Starts the timer actor on the current runtime.
    pub fn spawn(ledger: Arc<dyn TicketLedger>, store: Arc<dyn ReservationStore>, delay: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let releaser = Releaser { ledger, store, events };

        tokio::spawn(run(releaser.clone(), delay, rx, commands.downgrade()));

        Self {
            releaser,
            delay,
            commands,
        }
    }

    /// Arms the timer for a reservation already visible in the store.
    pub fn schedule(&self, tracking_id: TrackingId) {
        let deadline = Instant::now() + self.delay;
        if self.commands.send(TimerCommand::Schedule(tracking_id, deadline)).is_err() {
            tracing::error!(%tracking_id, "reaper queue closed; reservation will not time out");
        }
    }

    /// Drops the pending timer for a reservation that has been settled.
    pub fn resolve(&self, tracking_id: TrackingId) {
        let _ = self.commands.send(TimerCommand::Resolve(tracking_id));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReapEvent> {
        self.releaser.events.subscribe()
    }

    pub async fn reap(&self, tracking_id: TrackingId) -> Result<ReapOutcome, ReservationError> {
        self.releaser.reap(tracking_id).await
    }
}

async fn run(
    releaser: Releaser,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<TimerCommand>,
    rearm: mpsc::WeakUnboundedSender<TimerCommand>,
) {
    let mut deadlines: HashMap<TrackingId, Instant> = HashMap::new();
    let mut queue: BinaryHeap<Reverse<(Instant, TrackingId)>> = BinaryHeap::new();

    loop {
        let next = queue.peek().map(|Reverse((at, _))| *at);
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(TimerCommand::Schedule(tracking_id, at)) => {
                    deadlines.insert(tracking_id, at);
                    queue.push(Reverse((at, tracking_id)));
                }
                Some(TimerCommand::Resolve(tracking_id)) => {
                    deadlines.remove(&tracking_id);
                }
                None => break,
            },
            () = wait_until(next) => {
                let now = Instant::now();
                while let Some(Reverse((at, tracking_id))) = queue.peek().copied() {
                    if at > now {
                        break;
                    }
                    queue.pop();
                    // stale heap entries (resolved or re-armed) are skipped
                    if deadlines.get(&tracking_id) != Some(&at) {
                        continue;
                    }
                    deadlines.remove(&tracking_id);

                    tokio::spawn(fire(releaser.clone(), tracking_id, delay, rearm.clone()));
                }
            }
        }
    }

    if !deadlines.is_empty() {
        tracing::warn!(pending = deadlines.len(), "reaper stopped with timers still armed");
    }
}

async fn fire(
    releaser: Releaser,
    tracking_id: TrackingId,
    delay: Duration,
    rearm: mpsc::WeakUnboundedSender<TimerCommand>,
) {
    let outcome = match releaser.reap(tracking_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let rearmed = rearm
                .upgrade()
                .is_some_and(|commands| {
                    commands
                        .send(TimerCommand::Schedule(tracking_id, Instant::now() + delay))
                        .is_ok()
                });
            if rearmed {
                tracing::error!(%tracking_id, error = %e, "reaping failed; re-arming timer");
            } else {
                tracing::error!(%tracking_id, error = %e, "reaping failed and reaper is stopped");
            }
            ReapOutcome::Failed(e.to_string())
        }
    };
    let _ = releaser.events.send(ReapEvent { tracking_id, outcome });
}

impl Releaser {
    /// Payment ledger first, then the atomic take. A settlement that committed but
    /// has not yet left the store is deferred to.
    async fn reap(&self, tracking_id: TrackingId) -> Result<ReapOutcome, ReservationError> {
        if self.ledger.payment_exists(tracking_id).await? {
            tracing::info!(%tracking_id, "payment received; nothing to release");
            return Ok(ReapOutcome::AlreadySettled);
        }

        let Some(reservation) = self.store.take_and_delete(tracking_id).await else {
            tracing::debug!(%tracking_id, "reservation already consumed");
            return Ok(ReapOutcome::AlreadyConsumed);
        };

        let released = async {
            let mut tx = self.ledger.begin().await?;
            let released = tx
                .change_ticket_status(&reservation.ticket_ids, TicketStatus::Pending, TicketStatus::Available)
                .await?;
            tx.release_referral_usage(tracking_id).await?;
            tx.commit().await?;
            Ok::<u64, anyhow::Error>(released)
        }
        .await;

        match released {
            Ok(tickets) => {
                tracing::info!(%tracking_id, tickets, "reverted ticket statuses due to no payment");
                Ok(ReapOutcome::Released { tickets })
            }
            Err(e) => {
                // keep the hold visible so the re-armed timer can try again
                if !self.store.put(reservation).await {
                    tracing::error!(%tracking_id, "tracking id reused while release was retried");
                }
                Err(ReservationError::PersistenceFailure(e))
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
