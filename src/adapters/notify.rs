//! Default notification binding: renders a plain-text receipt and logs the
//! dispatch. Deployments wire a real mail sender behind the same port.

use async_trait::async_trait;

use crate::domain::Transaction;
use crate::ports::{Notifier, NotifyError};

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn render(&self, template: &str, tx: &Transaction) -> String {
        format!(
            "[{template}] Payment {} for {} {}: {}\n",
            tx.id, tx.amount, tx.currency, tx.status
        )
    }

    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(from, to, subject, body_len = body.len(), "receipt dispatched");
        Ok(())
    }
}
