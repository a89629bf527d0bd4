use crate::domain::referral::{quote, DiscountSnapshot, PriceQuote};
use crate::domain::reservation::{BuyTicketData, BuyTicketRequest, BuyTicketResponse, Reservation, TrackingId};
use crate::domain::ticket::{Ticket, TicketStatus};
use crate::error::ReservationError;
use crate::gateways::{BillingGateway, CreateBillRequest, CreateBillResponse};
use crate::ledger::{LedgerTx, TicketLedger};
use crate::service::allocator::{validate_amount, InventoryAllocator};
use crate::service::reaper::TimeoutReaper;
use crate::service::referral_validator::ReferralValidator;
use crate::service::reservation_store::ReservationStore;
use anyhow::anyhow;
use chrono::{FixedOffset, Offset, Utc};
use std::sync::Arc;
use uuid::Uuid;

const BILL_TIMEZONE_OFFSET_SECS: i32 = 7 * 3600;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub service_fee_per_ticket: i64,
    pub bill_expiry: chrono::Duration,
    pub redirect_url: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            service_fee_per_ticket: 1000,
            bill_expiry: chrono::Duration::minutes(7),
            redirect_url: String::new(),
        }
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    pub ledger: Arc<dyn TicketLedger>,
    pub store: Arc<dyn ReservationStore>,
    pub reaper: TimeoutReaper,
    pub gateway: Arc<dyn BillingGateway>,
    pub settings: CheckoutSettings,
}

struct Hold {
    tickets: Vec<Ticket>,
    discount: Option<DiscountSnapshot>,
    price: PriceQuote,
    bill: CreateBillResponse,
}

impl CheckoutService {
    /// Holds tickets, bills the buyer, and arms the timeout. Tickets are committed as
    /// pending before the reservation becomes visible, and the reservation is visible
    /// before its timer is armed.
    pub async fn buy(&self, event_id: Uuid, req: BuyTicketRequest) -> Result<BuyTicketResponse, ReservationError> {
        validate_request(&req)?;

        let mut tx = self.ledger.begin().await?;
        let hold = match self.hold_and_bill(&mut *tx, event_id, &req).await {
            Ok(hold) => hold,
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(error = %rb, "failed to rollback transaction");
                }
                return Err(e);
            }
        };

        let tracking_id = TrackingId(hold.bill.link_id);
        if let Err(e) = tx.commit().await {
            tracing::error!(%tracking_id, error = %e, "failed to commit reservation; bill left unbacked");
            return Err(ReservationError::PersistenceFailure(e));
        }

        let reservation = Reservation {
            tracking_id,
            event_id,
            ticket_ids: hold.tickets.iter().map(|t| t.id).collect(),
            ticket_hashes: hold.tickets.iter().map(|t| t.hash.clone()).collect(),
            attendees: req.attendees.clone(),
            discount: hold.discount.clone(),
            billed_amount: hold.price.total,
            created_at: Utc::now(),
        };
        let ticket_ids = reservation.ticket_ids.clone();

        if !self.store.put(reservation).await {
            tracing::error!(%tracking_id, "gateway reused an open tracking id; undoing hold");
            self.undo_hold(tracking_id, &ticket_ids, hold.discount.is_some()).await?;
            return Err(ReservationError::PersistenceFailure(anyhow!(
                "tracking id {tracking_id} already has an open reservation"
            )));
        }
        self.reaper.schedule(tracking_id);

        tracing::info!(
            %tracking_id,
            %event_id,
            ticket_name = %req.ticket_name,
            tickets = ticket_ids.len(),
            amount = hold.price.total,
            referral = hold.discount.as_ref().map(|d| d.code.as_str()).unwrap_or("-"),
            "tickets reserved"
        );

        Ok(BuyTicketResponse {
            reservation: BuyTicketData {
                event_id,
                ticket_amount: req.ticket_amount,
                ticket_ids,
                attendees: req.attendees,
            },
            bill: hold.bill,
        })
    }

    /// Hands back tickets (and a redeemed referral use) committed for a reservation
    /// that could not be stored.
    async fn undo_hold(
        &self,
        tracking_id: TrackingId,
        ticket_ids: &[Uuid],
        redeemed_referral: bool,
    ) -> Result<(), ReservationError> {
        let mut tx = self.ledger.begin().await?;
        let undone = async {
            tx.change_ticket_status(ticket_ids, TicketStatus::Pending, TicketStatus::Available)
                .await?;
            if redeemed_referral {
                tx.release_referral_usage(tracking_id).await?;
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        match undone {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(error = %rb, "failed to rollback transaction");
                }
                return Err(ReservationError::PersistenceFailure(e));
            }
        }
        Ok(())
    }

    async fn hold_and_bill(
        &self,
        tx: &mut dyn LedgerTx,
        event_id: Uuid,
        req: &BuyTicketRequest,
    ) -> Result<Hold, ReservationError> {
        let discount = match req.referral_code() {
            Some(code) => Some(ReferralValidator::validate(tx, code, Utc::now()).await?),
            None => None,
        };

        let tickets = InventoryAllocator::reserve(tx, event_id, &req.ticket_name, req.ticket_amount).await?;
        let unit_price = tickets.first().map(|t| t.price).unwrap_or_default();
        let price = quote(
            unit_price,
            req.ticket_amount,
            discount.as_ref().map(|d| d.discount_percentage),
            self.settings.service_fee_per_ticket,
        );

        let bill = self
            .gateway
            .create_bill(CreateBillRequest {
                title: req.ticket_name.clone(),
                amount: price.total,
                bill_type: "SINGLE".to_string(),
                expired_date: Utc::now().with_timezone(&bill_timezone()) + self.settings.bill_expiry,
                redirect_url: self.settings.redirect_url.clone(),
                is_address_required: false,
                is_phone_number_required: false,
            })
            .await
            .map_err(|e| {
                tracing::warn!(gateway = self.gateway.name(), error = %e, "bill creation failed");
                e
            })?;

        if let Some(discount) = &discount {
            tx.record_referral_usage(discount.referral_code_id, TrackingId(bill.link_id))
                .await?;
        }

        Ok(Hold {
            tickets,
            discount,
            price,
            bill,
        })
    }
}

fn validate_request(req: &BuyTicketRequest) -> Result<(), ReservationError> {
    validate_amount(req.ticket_amount)?;
    if req.ticket_name.trim().is_empty() {
        return Err(ReservationError::InvalidArgument("ticket_name is required".to_string()));
    }
    if i64::try_from(req.attendees.len()).ok() != Some(req.ticket_amount) {
        return Err(ReservationError::InvalidArgument(format!(
            "expected {} attendees, got {}",
            req.ticket_amount,
            req.attendees.len()
        )));
    }
    Ok(())
}

fn bill_timezone() -> FixedOffset {
    FixedOffset::east_opt(BILL_TIMEZONE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}
