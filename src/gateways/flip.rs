use crate::error::ReservationError;
use crate::gateways::{BillingGateway, CreateBillRequest, CreateBillResponse};

pub struct FlipGateway {
    pub base_url: String,
    pub secret_key: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl BillingGateway for FlipGateway {
    fn name(&self) -> &'static str {
        "flip"
    }

    async fn create_bill(&self, request: CreateBillRequest) -> Result<CreateBillResponse, ReservationError> {
        let bill_url = format!("{}/pwf/bill", self.base_url.trim_end_matches('/'));

        let resp = self
            .client
            .post(bill_url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&request.form_fields())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                let body = r
                    .text()
                    .await
                    .map_err(|e| ReservationError::GatewayUnavailable(format!("reading bill response: {e}")))?;
                tracing::debug!(response = %body, "bill created");
                serde_json::from_str::<CreateBillResponse>(&body)
                    .map_err(|e| ReservationError::GatewayUnavailable(format!("decoding bill response: {e}")))
            }
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                Err(ReservationError::GatewayUnavailable(format!(
                    "HTTP_{}: {}",
                    status.as_u16(),
                    body.chars().take(200).collect::<String>()
                )))
            }
            Err(e) if e.is_timeout() => Err(ReservationError::GatewayUnavailable("gateway timeout".to_string())),
            Err(e) => Err(ReservationError::GatewayUnavailable(format!("network error: {e}"))),
        }
    }
}
