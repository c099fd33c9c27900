use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use sqlx::migrate::Migrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use cardgate_core::adapters::{
    create_pool, LogNotifier, PostgresPayerDirectory, PostgresRecurringProfileStore,
    PostgresTransactionStore,
};
use cardgate_core::config::Config;
use cardgate_core::gateway::{GatewayEndpoints, HttpGatewayClient};
use cardgate_core::ports::TransactionStore;
use cardgate_core::services::{hosted_response_url, LifecycleOptions, PaymentService, ReceiptService};
use cardgate_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = create_pool(&config.database_url).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let store: Arc<dyn TransactionStore> = Arc::new(PostgresTransactionStore::new(pool.clone()));
    let profiles = Arc::new(PostgresRecurringProfileStore::new(pool.clone()));
    let payers = Arc::new(PostgresPayerDirectory::new(pool.clone()));
    let notifier = Arc::new(LogNotifier::default());
    let receipts = ReceiptService::new(notifier, payers, config.receipt_from.clone());

    let gateway = Arc::new(HttpGatewayClient::new(GatewayEndpoints {
        post_url: config.gateway_post_url.clone(),
        hosted_url: config.gateway_hosted_url.clone(),
        username: config.gateway_username.clone(),
        password: config.gateway_password.clone(),
        hosted_user_id: config.hosted_user_id.clone(),
        hosted_key: config.hosted_key.clone(),
    }));
    tracing::info!("Gateway client initialized for {}", config.gateway_post_url);

    let public_base = Url::parse(&config.public_base_url)?;
    let payments = PaymentService::new(
        store.clone(),
        gateway,
        profiles,
        receipts,
        LifecycleOptions {
            use_transactional_writes: config.use_transactional_writes,
            hosted_response_url: hosted_response_url(&public_base)?,
        },
    );

    let app = create_app(AppState {
        db: pool,
        store,
        payments,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
