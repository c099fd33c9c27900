use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::client::GatewayError;
use crate::ports::StoreError;

/// Errors raised by the transaction lifecycle. Only precondition failures
/// escape a lifecycle operation; everything raised mid-sequence is caught at
/// the operation boundary and handled there.
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("prior transaction is missing or unresolvable")]
    MissingPriorTransaction,

    #[error("a successful completion already exists for this authorisation")]
    DuplicateCompletion,

    #[error("recurring profile {0} not found")]
    UnknownRecurringProfile(Uuid),

    #[error("gateway communication failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// HTTP-facing error for the axum surface.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Backend(detail) => AppError::Internal(detail),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::MissingPriorTransaction
            | PaymentError::DuplicateCompletion
            | PaymentError::UnknownRecurringProfile(_) => AppError::BadRequest(e.to_string()),
            PaymentError::Persistence(inner) => inner.into(),
            PaymentError::Gateway(inner) => AppError::Internal(inner.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let error = AppError::NotFound("transaction".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let error = AppError::BadRequest("missing prior".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_maps_to_500() {
        let error = AppError::Internal("boom".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn precondition_payment_errors_become_bad_requests() {
        let error: AppError = PaymentError::MissingPriorTransaction.into();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        let error: AppError = PaymentError::DuplicateCompletion.into();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_not_found_keeps_its_status_through_conversion() {
        let error: AppError = PaymentError::Persistence(StoreError::NotFound("x".into())).into();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn response_carries_the_status() {
        let response = AppError::NotFound("transaction".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
