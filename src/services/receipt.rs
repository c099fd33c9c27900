//! Receipt delivery, triggered by the lifecycle when a payment first
//! reaches `Success`.

use std::sync::Arc;

use crate::domain::Transaction;
use crate::ports::{Notifier, PayerDirectory};

const RECEIPT_TEMPLATE: &str = "payment_receipt";

#[derive(Clone)]
pub struct ReceiptService {
    notifier: Arc<dyn Notifier>,
    payers: Arc<dyn PayerDirectory>,
    from_address: Option<String>,
}

impl ReceiptService {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        payers: Arc<dyn PayerDirectory>,
        from_address: Option<String>,
    ) -> Self {
        Self {
            notifier,
            payers,
            from_address,
        }
    }

    /// Sends a receipt for the transaction if there is someone to send it to.
    /// A missing from-address, payer or payer email suppresses delivery
    /// silently; a delivery failure is logged and swallowed.
    pub async fn send_receipt(&self, tx: &Transaction) {
        let Some(from) = &self.from_address else {
            return;
        };
        let Some(payer_id) = tx.paid_by_id else {
            return;
        };
        let payer = match self.payers.load(payer_id).await {
            Ok(Some(payer)) => payer,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(payment = %tx.id, "payer lookup failed: {e}");
                return;
            }
        };
        let Some(email) = &payer.email else {
            return;
        };

        let mut body = self.notifier.render(RECEIPT_TEMPLATE, tx);
        if let Some(message) = &payer.receipt_message {
            body.push_str(message);
        }
        let subject = format!("Payment receipt (Ref no. #{})", tx.id);

        if let Err(e) = self.notifier.send(from, email, &subject, &body).await {
            tracing::warn!(payment = %tx.id, "receipt delivery failed: {e}");
        }
    }
}
