//! Recurring-billing profile entity.

use bigdecimal::BigDecimal;
use serde::Serialize;
use uuid::Uuid;

/// A stored billing agreement. The gateway-issued `billing_token` stands in
/// for card data when a recurring purchase is submitted.
#[derive(Debug, Clone, Serialize)]
pub struct RecurringProfile {
    pub id: Uuid,
    pub billing_token: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub merchant_reference: String,
}
