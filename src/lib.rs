pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ports;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::ports::TransactionStore;
use crate::services::PaymentService;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub store: Arc<dyn TransactionStore>,
    pub payments: PaymentService,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transactions/:id", get(handlers::get_transaction))
        .route("/transactions/:id/can-complete", get(handlers::can_complete))
        .with_state(state)
}
