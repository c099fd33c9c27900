//! XML-over-HTTP gateway transport.
//!
//! Generic transport for a gateway that accepts a flat XML field document
//! and answers in kind. Gateway-specific request signing is a deployment
//! concern layered on top; this client posts the field set, interprets the
//! reply, and guards the endpoint with a circuit breaker.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;

use crate::domain::PaymentStatus;
use crate::gateway::client::{GatewayClient, GatewayError, GatewayResult, HostedRedirect};
use crate::gateway::request::GatewayRequest;
use crate::gateway::response::ResponseXml;

/// Endpoint and credential configuration for the transport. Credentials are
/// appended to the outgoing field set under the keys the gateway expects for
/// each flow.
#[derive(Debug, Clone, Default)]
pub struct GatewayEndpoints {
    pub post_url: String,
    pub hosted_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub hosted_user_id: Option<String>,
    pub hosted_key: Option<String>,
}

pub struct HttpGatewayClient {
    client: Client,
    endpoints: GatewayEndpoints,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpGatewayClient {
    pub fn new(endpoints: GatewayEndpoints) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpGatewayClient {
            client,
            endpoints,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    async fn post_fields(&self, url: &str, body: String) -> Result<String, GatewayError> {
        let client = self.client.clone();
        let url = url.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .header("content-type", "application/xml")
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(GatewayError::Transport(format!(
                        "gateway answered {}",
                        response.status()
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))
            })
            .await;

        match result {
            Ok(text) => Ok(text),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn direct_body(&self, request: &GatewayRequest) -> String {
        let mut request = request.clone();
        if let Some(username) = &self.endpoints.username {
            request.insert_credential("PostUsername", username.clone());
        }
        if let Some(password) = &self.endpoints.password {
            request.insert_credential("PostPassword", password.clone());
        }
        request.to_xml("Txn")
    }

    fn hosted_body(&self, request: &GatewayRequest) -> String {
        let mut request = request.clone();
        if let Some(user_id) = &self.endpoints.hosted_user_id {
            request.insert_credential("HostedUserId", user_id.clone());
        }
        if let Some(key) = &self.endpoints.hosted_key {
            request.insert_credential("HostedKey", key.clone());
        }
        request.to_xml("GenerateRequest")
    }
}

/// Reads the reply into a [`GatewayResult`]. An unparseable payload is not
/// an error at this layer: it becomes a declined result that still retains
/// the raw body for audit.
fn interpret_payment_response(raw: String) -> GatewayResult {
    let Some(xml) = ResponseXml::parse(&raw) else {
        return GatewayResult::declined(Some(raw));
    };

    let status = match xml.success_flag() {
        Some(true) => PaymentStatus::Success,
        _ => PaymentStatus::Failure,
    };
    let settlement_date = xml
        .top("SettlementDate")
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok());

    GatewayResult {
        status,
        txn_ref: xml.txn_ref().map(str::to_owned),
        auth_code: xml.auth_code().map(str::to_owned),
        card_holder_name: xml.card_holder_name().map(str::to_owned),
        card_number_truncated: xml.card_number().map(str::to_owned),
        date_expiry: xml.date_expiry().map(str::to_owned),
        settlement_date,
        response_xml: Some(raw),
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn do_payment(&self, request: &GatewayRequest) -> Result<GatewayResult, GatewayError> {
        let body = self.direct_body(request);
        let raw = self.post_fields(&self.endpoints.post_url, body).await?;
        Ok(interpret_payment_response(raw))
    }

    async fn do_hosted_payment(
        &self,
        request: &GatewayRequest,
    ) -> Result<HostedRedirect, GatewayError> {
        let body = self.hosted_body(request);
        let raw = self.post_fields(&self.endpoints.hosted_url, body).await?;
        let xml = ResponseXml::parse(&raw).ok_or(GatewayError::MalformedResponse)?;
        let url = xml
            .top("URI")
            .filter(|u| !u.is_empty())
            .ok_or(GatewayError::MalformedResponse)?;
        Ok(HostedRedirect {
            url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpret_maps_a_successful_reply() {
        let raw = "<Response>\
            <Success>1</Success>\
            <TxnRef>R-1</TxnRef>\
            <AuthCode>A9</AuthCode>\
            <CardHolderName>J SHOPPER</CardHolderName>\
            <CardNumber>411111........11</CardNumber>\
            <DateExpiry>1227</DateExpiry>\
            <SettlementDate>2026-03-02</SettlementDate>\
        </Response>";
        let result = interpret_payment_response(raw.to_string());
        assert_eq!(result.status, PaymentStatus::Success);
        assert_eq!(result.txn_ref.as_deref(), Some("R-1"));
        assert_eq!(result.auth_code.as_deref(), Some("A9"));
        assert_eq!(
            result.settlement_date,
            Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
        );
        assert_eq!(result.response_xml.as_deref(), Some(raw));
    }

    #[test]
    fn interpret_treats_an_unparseable_reply_as_declined_with_payload_kept() {
        let result = interpret_payment_response("not xml at all".to_string());
        assert_eq!(result.status, PaymentStatus::Failure);
        assert_eq!(result.response_xml.as_deref(), Some("not xml at all"));
        assert!(result.txn_ref.is_none());
    }

    #[test]
    fn interpret_prefers_the_nested_transaction_shape() {
        let raw = "<Response>\
            <TxnRef>flat</TxnRef>\
            <Transaction><Success>1</Success><TxnRef>nested</TxnRef></Transaction>\
        </Response>";
        let result = interpret_payment_response(raw.to_string());
        assert_eq!(result.status, PaymentStatus::Success);
        assert_eq!(result.txn_ref.as_deref(), Some("nested"));
    }
}
