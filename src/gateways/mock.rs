use crate::error::ReservationError;
use crate::gateways::{BillingGateway, CreateBillRequest, CreateBillResponse};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

pub struct MockBillingGateway {
    pub behavior: String,
    next_link_id: AtomicI64,
    requests: Mutex<Vec<CreateBillRequest>>,
}

impl MockBillingGateway {
    pub fn new(behavior: &str) -> Self {
        Self {
            behavior: behavior.to_string(),
            next_link_id: AtomicI64::new(1000),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Bills requested so far, in call order.
    pub fn requests(&self) -> Vec<CreateBillRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl BillingGateway for MockBillingGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_bill(&self, request: CreateBillRequest) -> Result<CreateBillResponse, ReservationError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        match self.behavior.as_str() {
            "ALWAYS_FAILURE" => Err(ReservationError::GatewayUnavailable("mock decline".to_string())),
            _ => {
                let link_id = self.next_link_id.fetch_add(1, Ordering::SeqCst);
                Ok(CreateBillResponse {
                    link_id,
                    link_url: format!("mock.bill/{link_id}"),
                    title: request.title.clone(),
                    bill_type: request.bill_type.clone(),
                    amount: request.amount,
                    redirect_url: Some(request.redirect_url.clone()),
                    expired_date: Some(request.expired_date.format("%Y-%m-%d %H:%M").to_string()),
                    created_from: Some("API".to_string()),
                    status: serde_json::json!("ACTIVE"),
                    step: serde_json::json!(1),
                    is_address_required: serde_json::json!(u8::from(request.is_address_required)),
                    is_phone_number_required: serde_json::json!(u8::from(request.is_phone_number_required)),
                })
            }
        }
    }
}
