use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub ticket_hashes: Vec<String>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(&self, mail: ConfirmationMail) -> Result<()>;
}

pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation(&self, mail: ConfirmationMail) -> Result<()> {
        tracing::info!(
            recipient = %mail.recipient,
            tickets = mail.ticket_hashes.len(),
            "confirmation mail (log only)"
        );
        Ok(())
    }
}

/// Hands confirmations to an external mail relay, which renders QR codes and sends.
#[derive(Clone)]
pub struct HttpNotifier {
    pub relay_url: String,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl Notifier for HttpNotifier {
    async fn send_confirmation(&self, mail: ConfirmationMail) -> Result<()> {
        self.client
            .post(&self.relay_url)
            .header("X-Event-Type", "tickets.purchased")
            .json(&mail)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub fn render_purchase_body(payer_name: &str, ticket_title: &str, amount: i64, ticket_hashes: &[String]) -> String {
    let mut body = format!(
        "Dear {payer_name},\n\nThank you for your purchase. Your order has been processed.\n\n{ticket_title}: {} ticket(s), total paid {amount}.\n\nTicket codes:\n",
        ticket_hashes.len()
    );
    for hash in ticket_hashes {
        body.push_str("  - ");
        body.push_str(hash);
        body.push('\n');
    }
    body
}
