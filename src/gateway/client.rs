//! Gateway client port.
//!
//! The lifecycle manager only ever talks to the gateway through this trait;
//! the HTTP transport in [`crate::gateway::http`] is one implementation,
//! tests script their own.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::PaymentStatus;
use crate::gateway::request::GatewayRequest;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway circuit breaker is open")]
    CircuitOpen,
    #[error("gateway returned an unusable response")]
    MalformedResponse,
}

/// Interpreted outcome of a direct gateway call, ready to be applied onto a
/// transaction. `response_xml` is the untouched payload.
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub status: PaymentStatus,
    pub txn_ref: Option<String>,
    pub auth_code: Option<String>,
    pub card_holder_name: Option<String>,
    pub card_number_truncated: Option<String>,
    pub date_expiry: Option<String>,
    pub settlement_date: Option<NaiveDate>,
    pub response_xml: Option<String>,
}

impl GatewayResult {
    /// An approved result carrying a gateway reference.
    pub fn approved(txn_ref: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Success,
            txn_ref: Some(txn_ref.into()),
            auth_code: None,
            card_holder_name: None,
            card_number_truncated: None,
            date_expiry: None,
            settlement_date: None,
            response_xml: None,
        }
    }

    /// A declined result, optionally retaining the raw payload.
    pub fn declined(response_xml: Option<String>) -> Self {
        Self {
            status: PaymentStatus::Failure,
            txn_ref: None,
            auth_code: None,
            card_holder_name: None,
            card_number_truncated: None,
            date_expiry: None,
            settlement_date: None,
            response_xml,
        }
    }
}

/// Redirect handle returned by the hosted variant; the payer is sent to
/// `url` and the result arrives later through the asynchronous callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedRedirect {
    pub url: String,
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn do_payment(&self, request: &GatewayRequest) -> Result<GatewayResult, GatewayError>;

    async fn do_hosted_payment(
        &self,
        request: &GatewayRequest,
    ) -> Result<HostedRedirect, GatewayError>;
}
