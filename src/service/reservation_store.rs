use crate::domain::reservation::{Reservation, TrackingId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Open reservations keyed by tracking id. All mutation goes through these calls;
/// `take_and_delete` hands a reservation to at most one caller.
#[async_trait::async_trait]
pub trait ReservationStore: Send + Sync {
    /// Inserts only if no reservation is open under the same tracking id. Returns
    /// false, leaving the existing entry untouched, when the id is taken.
    async fn put(&self, reservation: Reservation) -> bool;

    async fn get(&self, tracking_id: TrackingId) -> Option<Reservation>;

    async fn take_and_delete(&self, tracking_id: TrackingId) -> Option<Reservation>;

    async fn len(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryReservationStore {
    inner: Mutex<HashMap<TrackingId, Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn put(&self, reservation: Reservation) -> bool {
        match self.inner.lock().await.entry(reservation.tracking_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(reservation);
                true
            }
        }
    }

    async fn get(&self, tracking_id: TrackingId) -> Option<Reservation> {
        self.inner.lock().await.get(&tracking_id).cloned()
    }

    async fn take_and_delete(&self, tracking_id: TrackingId) -> Option<Reservation> {
        self.inner.lock().await.remove(&tracking_id)
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
