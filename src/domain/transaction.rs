//! Transaction domain entity.
//! Framework-agnostic representation of a single card-gateway transaction.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::gateway::client::GatewayResult;
use crate::gateway::response::ResponseXml;

/// Gateway transaction type. Determines which field mapping and which
/// lifecycle rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TxnType {
    #[default]
    Purchase,
    Auth,
    Complete,
    Refund,
    Validate,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Purchase => "Purchase",
            TxnType::Auth => "Auth",
            TxnType::Complete => "Complete",
            TxnType::Refund => "Refund",
            TxnType::Validate => "Validate",
        }
    }
}

impl FromStr for TxnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Purchase" => Ok(TxnType::Purchase),
            "Auth" => Ok(TxnType::Auth),
            "Complete" => Ok(TxnType::Complete),
            "Refund" => Ok(TxnType::Refund),
            "Validate" => Ok(TxnType::Validate),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment outcome as maintained across the lifecycle. A transaction starts
/// `Incomplete` and moves to `Success` or `Failure` once the gateway result
/// has been applied; hosted-flow transactions stay `Pending` until the
/// asynchronous callback lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PaymentStatus {
    #[default]
    Incomplete,
    Pending,
    Success,
    Failure,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Incomplete => "Incomplete",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failure => "Failure",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Incomplete" => Ok(PaymentStatus::Incomplete),
            "Pending" => Ok(PaymentStatus::Pending),
            "Success" => Ok(PaymentStatus::Success),
            "Failure" => Ok(PaymentStatus::Failure),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain entity for a card payment driven through the gateway.
///
/// `response_xml` is the raw gateway payload, retained verbatim for audit.
/// It is parsed lazily into `response_cache`; replacing the payload with
/// [`Transaction::set_response_xml`] resets the cache. The cache itself is
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub txn_type: TxnType,
    pub status: PaymentStatus,
    pub amount: BigDecimal,
    pub currency: String,
    /// Gateway-assigned reference. Unique across transactions once set.
    pub txn_ref: Option<String>,
    pub auth_code: Option<String>,
    pub merchant_reference: String,
    pub hosted_redirect_url: Option<String>,
    /// Settlement date, populated only for the direct (server-hosted) flow.
    pub settlement_date: Option<NaiveDate>,
    pub response_xml: Option<String>,
    /// First six and last two digits of the card number. The full number is
    /// never stored.
    pub card_number_truncated: Option<String>,
    pub card_holder_name: Option<String>,
    pub date_expiry: Option<String>,
    /// Optional deadline forwarded to the hosted flow as a gateway option.
    pub timeout_date: Option<DateTime<Utc>>,
    /// The Auth transaction this Complete transaction finalises.
    pub auth_payment_id: Option<Uuid>,
    /// The original transaction this Refund transaction reverses.
    pub refunded_for_id: Option<Uuid>,
    pub paid_by_id: Option<Uuid>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    response_cache: OnceLock<Option<ResponseXml>>,
}

impl Transaction {
    pub fn new(amount: BigDecimal, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            txn_type: TxnType::default(),
            status: PaymentStatus::default(),
            amount,
            currency: currency.into(),
            txn_ref: None,
            auth_code: None,
            merchant_reference: String::new(),
            hosted_redirect_url: None,
            settlement_date: None,
            response_xml: None,
            card_number_truncated: None,
            card_holder_name: None,
            date_expiry: None,
            timeout_date: None,
            auth_payment_id: None,
            refunded_for_id: None,
            paid_by_id: None,
            message: None,
            created_at: now,
            updated_at: now,
            response_cache: OnceLock::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replaces the raw response payload and drops any cached parse, so the
    /// next accessor call reads the fresh payload.
    pub fn set_response_xml(&mut self, raw: String) {
        self.response_xml = Some(raw);
        self.response_cache = OnceLock::new();
    }

    /// Lazily parsed view of the retained response payload. Returns `None`
    /// when no payload is present or when it cannot be parsed; a failed
    /// parse is cached too, so a malformed payload is only inspected once.
    pub fn response(&self) -> Option<&ResponseXml> {
        self.response_cache
            .get_or_init(|| self.response_xml.as_deref().and_then(ResponseXml::parse))
            .as_ref()
    }

    /// Settlement amount from the response. Only populated by the
    /// hosted-page flow; the direct flow never returns it.
    pub fn amount_settlement(&self) -> Option<String> {
        self.response()
            .and_then(|xml| xml.amount_settlement())
            .map(str::to_owned)
    }

    pub fn response_card_name(&self) -> Option<String> {
        self.response()
            .and_then(|xml| xml.card_name())
            .map(str::to_owned)
    }

    pub fn response_card_holder_name(&self) -> Option<String> {
        self.response()
            .and_then(|xml| xml.card_holder_name())
            .map(str::to_owned)
    }

    pub fn response_date_expiry(&self) -> Option<String> {
        self.response()
            .and_then(|xml| xml.date_expiry())
            .map(str::to_owned)
    }

    pub fn response_card_number(&self) -> Option<String> {
        self.response()
            .and_then(|xml| xml.card_number())
            .map(str::to_owned)
    }

    /// Writes an interpreted gateway outcome onto this transaction. The raw
    /// payload is retained verbatim and the parse cache reset.
    pub fn apply_result(&mut self, result: &GatewayResult) {
        self.status = result.status;
        if let Some(txn_ref) = &result.txn_ref {
            self.txn_ref = Some(txn_ref.clone());
        }
        if let Some(auth_code) = &result.auth_code {
            self.auth_code = Some(auth_code.clone());
        }
        if let Some(name) = &result.card_holder_name {
            self.card_holder_name = Some(name.clone());
        }
        if let Some(truncated) = &result.card_number_truncated {
            self.card_number_truncated = Some(truncated.clone());
        }
        if let Some(expiry) = &result.date_expiry {
            self.date_expiry = Some(expiry.clone());
        }
        if let Some(date) = result.settlement_date {
            self.settlement_date = Some(date);
        }
        if let Some(raw) = &result.response_xml {
            self.set_response_xml(raw.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> Transaction {
        Transaction::new("12.50".parse().unwrap(), "NZD")
    }

    #[test]
    fn new_transaction_defaults() {
        let tx = transaction();
        assert_eq!(tx.txn_type, TxnType::Purchase);
        assert_eq!(tx.status, PaymentStatus::Incomplete);
        assert!(tx.txn_ref.is_none());
        assert!(tx.response().is_none());
    }

    #[test]
    fn txn_type_round_trips_through_strings() {
        for t in [
            TxnType::Purchase,
            TxnType::Auth,
            TxnType::Complete,
            TxnType::Refund,
            TxnType::Validate,
        ] {
            assert_eq!(t.as_str().parse::<TxnType>().unwrap(), t);
        }
        assert!("Chargeback".parse::<TxnType>().is_err());
    }

    #[test]
    fn response_parse_is_cached_until_payload_replaced() {
        let mut tx = transaction();
        tx.set_response_xml("<Txn><CardName>Visa</CardName></Txn>".to_string());
        assert_eq!(tx.response_card_name().as_deref(), Some("Visa"));

        // Mutating the raw field directly does not bust the cache.
        tx.response_xml = Some("<Txn><CardName>Amex</CardName></Txn>".to_string());
        assert_eq!(tx.response_card_name().as_deref(), Some("Visa"));

        // Replacing through the setter does.
        tx.set_response_xml("<Txn><CardName>Amex</CardName></Txn>".to_string());
        assert_eq!(tx.response_card_name().as_deref(), Some("Amex"));
    }

    #[test]
    fn apply_result_retains_raw_payload_and_outcome() {
        let mut tx = transaction();
        let result = GatewayResult {
            status: PaymentStatus::Success,
            txn_ref: Some("REF-1".to_string()),
            auth_code: Some("A77".to_string()),
            card_holder_name: Some("A CUSTOMER".to_string()),
            card_number_truncated: Some("411111....11".to_string()),
            date_expiry: Some("1227".to_string()),
            settlement_date: None,
            response_xml: Some("<Txn><Success>1</Success></Txn>".to_string()),
        };
        tx.apply_result(&result);
        assert_eq!(tx.status, PaymentStatus::Success);
        assert_eq!(tx.txn_ref.as_deref(), Some("REF-1"));
        assert_eq!(tx.auth_code.as_deref(), Some("A77"));
        assert_eq!(
            tx.response_xml.as_deref(),
            Some("<Txn><Success>1</Success></Txn>")
        );
    }

    #[test]
    fn apply_result_keeps_existing_fields_when_result_is_sparse() {
        let mut tx = transaction();
        tx.txn_ref = Some("KEEP".to_string());
        let result = GatewayResult {
            status: PaymentStatus::Failure,
            txn_ref: None,
            auth_code: None,
            card_holder_name: None,
            card_number_truncated: None,
            date_expiry: None,
            settlement_date: None,
            response_xml: None,
        };
        tx.apply_result(&result);
        assert_eq!(tx.status, PaymentStatus::Failure);
        assert_eq!(tx.txn_ref.as_deref(), Some("KEEP"));
    }
}
