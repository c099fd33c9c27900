//! HTTP transport tests against a local mock gateway.

use cardgate_core::domain::{PaymentStatus, Transaction, TxnType};
use cardgate_core::gateway::{GatewayClient, GatewayEndpoints, GatewayError, HttpGatewayClient};
use cardgate_core::gateway::request::{build_auth_request, build_hosted_request, PaymentInput};

fn transaction(txn_type: TxnType) -> Transaction {
    let mut tx = Transaction::new("19.99".parse().unwrap(), "NZD");
    tx.txn_type = txn_type;
    tx
}

fn client_for(server: &mockito::ServerGuard) -> HttpGatewayClient {
    HttpGatewayClient::new(GatewayEndpoints {
        post_url: format!("{}/post", server.url()),
        hosted_url: format!("{}/hosted", server.url()),
        username: Some("merchant".to_string()),
        password: Some("secret".to_string()),
        hosted_user_id: Some("hosted-user".to_string()),
        hosted_key: Some("hosted-key".to_string()),
    })
}

#[tokio::test]
async fn direct_payment_interprets_an_approval() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/post")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex("<TxnType>Purchase</TxnType>".to_string()),
            mockito::Matcher::Regex("<PostUsername>merchant</PostUsername>".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(
            "<Response>\
                <Success>1</Success>\
                <TxnRef>GW-REF-77</TxnRef>\
                <AuthCode>OK123</AuthCode>\
                <CardHolderName>J SHOPPER</CardHolderName>\
                <CardNumber>411111........11</CardNumber>\
                <DateExpiry>1227</DateExpiry>\
             </Response>",
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let tx = transaction(TxnType::Purchase);
    let request = build_auth_request(&tx, &PaymentInput::new());

    let result = client.do_payment(&request).await.unwrap();
    assert_eq!(result.status, PaymentStatus::Success);
    assert_eq!(result.txn_ref.as_deref(), Some("GW-REF-77"));
    assert_eq!(result.auth_code.as_deref(), Some("OK123"));
    assert_eq!(result.card_number_truncated.as_deref(), Some("411111........11"));
    assert!(result.response_xml.as_deref().unwrap().contains("GW-REF-77"));
}

#[tokio::test]
async fn direct_payment_maps_a_decline() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/post")
        .with_status(200)
        .with_body("<Response><Success>0</Success><TxnRef>GW-1</TxnRef></Response>")
        .create_async()
        .await;

    let client = client_for(&server);
    let tx = transaction(TxnType::Purchase);
    let result = client
        .do_payment(&build_auth_request(&tx, &PaymentInput::new()))
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Failure);
    assert_eq!(result.txn_ref.as_deref(), Some("GW-1"));
}

#[tokio::test]
async fn unparseable_reply_becomes_a_decline_with_payload_retained() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/post")
        .with_status(200)
        .with_body("half a document <oops")
        .create_async()
        .await;

    let client = client_for(&server);
    let tx = transaction(TxnType::Purchase);
    let result = client
        .do_payment(&build_auth_request(&tx, &PaymentInput::new()))
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Failure);
    assert_eq!(result.response_xml.as_deref(), Some("half a document <oops"));
}

#[tokio::test]
async fn http_error_surfaces_as_transport_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/post")
        .with_status(502)
        .create_async()
        .await;

    let client = client_for(&server);
    let tx = transaction(TxnType::Purchase);
    let err = client
        .do_payment(&build_auth_request(&tx, &PaymentInput::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
}

#[tokio::test]
async fn hosted_payment_extracts_the_redirect() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hosted")
        .match_body(mockito::Matcher::Regex(
            "<HostedUserId>hosted-user</HostedUserId>".to_string(),
        ))
        .with_status(200)
        .with_body(
            "<Request valid=\"1\">\
                <URI>https://gateway.example.com/pay/session-9</URI>\
             </Request>",
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let tx = transaction(TxnType::Purchase);
    let request = build_hosted_request(
        &tx,
        &PaymentInput::new(),
        "https://shop.example.com/gateway/hosted/response",
    );

    let redirect = client.do_hosted_payment(&request).await.unwrap();
    assert_eq!(redirect.url, "https://gateway.example.com/pay/session-9");
}

#[tokio::test]
async fn hosted_payment_without_a_redirect_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hosted")
        .with_status(200)
        .with_body("<Request valid=\"0\"></Request>")
        .create_async()
        .await;

    let client = client_for(&server);
    let tx = transaction(TxnType::Purchase);
    let request = build_hosted_request(&tx, &PaymentInput::new(), "https://x.example/cb");

    let err = client.do_hosted_payment(&request).await.unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse));
}
