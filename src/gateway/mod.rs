pub mod client;
pub mod http;
pub mod request;
pub mod response;

pub use client::{GatewayClient, GatewayError, GatewayResult, HostedRedirect};
pub use http::{GatewayEndpoints, HttpGatewayClient};
pub use request::{GatewayRequest, PaymentFlow, PaymentInput};
pub use response::ResponseXml;
