//! Payer entity, the receipt recipient for a transaction.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Payer {
    pub id: Uuid,
    pub email: Option<String>,
    /// Free-text footer appended to the rendered receipt body.
    pub receipt_message: Option<String>,
}
