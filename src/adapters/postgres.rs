//! Postgres implementations of the persistence ports.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction as SqlxTransaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Payer, RecurringProfile, Transaction};
use crate::ports::{
    PayerDirectory, RecurringProfileStore, StoreError, StoreResult, TransactionStore,
};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Postgres-backed transaction store.
///
/// A unit of work opened with `begin` is held as a live `sqlx` transaction;
/// subsequent reads and writes run on it until `commit` or `rollback`. The
/// lifecycle serialises operations per transaction, so a single slot is all
/// the unit-of-work state this store needs.
pub struct PostgresTransactionStore {
    pool: PgPool,
    active: Mutex<Option<SqlxTransaction<'static, Postgres>>>,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            active: Mutex::new(None),
        }
    }
}

const SAVE_SQL: &str = r#"
INSERT INTO payments (
    id, txn_type, status, amount, currency, txn_ref, auth_code,
    merchant_reference, hosted_redirect_url, settlement_date, response_xml,
    card_number_truncated, card_holder_name, date_expiry, timeout_date,
    auth_payment_id, refunded_for_id, paid_by_id, message, created_at, updated_at
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
)
ON CONFLICT (id) DO UPDATE SET
    txn_type = EXCLUDED.txn_type,
    status = EXCLUDED.status,
    amount = EXCLUDED.amount,
    currency = EXCLUDED.currency,
    txn_ref = EXCLUDED.txn_ref,
    auth_code = EXCLUDED.auth_code,
    merchant_reference = EXCLUDED.merchant_reference,
    hosted_redirect_url = EXCLUDED.hosted_redirect_url,
    settlement_date = EXCLUDED.settlement_date,
    response_xml = EXCLUDED.response_xml,
    card_number_truncated = EXCLUDED.card_number_truncated,
    card_holder_name = EXCLUDED.card_holder_name,
    date_expiry = EXCLUDED.date_expiry,
    timeout_date = EXCLUDED.timeout_date,
    auth_payment_id = EXCLUDED.auth_payment_id,
    refunded_for_id = EXCLUDED.refunded_for_id,
    paid_by_id = EXCLUDED.paid_by_id,
    message = EXCLUDED.message,
    updated_at = EXCLUDED.updated_at
"#;

fn save_query(tx: &Transaction) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(SAVE_SQL)
        .bind(tx.id)
        .bind(tx.txn_type.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(&tx.txn_ref)
        .bind(&tx.auth_code)
        .bind(&tx.merchant_reference)
        .bind(&tx.hosted_redirect_url)
        .bind(tx.settlement_date)
        .bind(&tx.response_xml)
        .bind(&tx.card_number_truncated)
        .bind(&tx.card_holder_name)
        .bind(&tx.date_expiry)
        .bind(tx.timeout_date)
        .bind(tx.auth_payment_id)
        .bind(tx.refunded_for_id)
        .bind(tx.paid_by_id)
        .bind(&tx.message)
        .bind(tx.created_at)
        .bind(tx.updated_at)
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn save(&self, tx: &Transaction) -> StoreResult<()> {
        let mut active = self.active.lock().await;
        match active.as_mut() {
            Some(txn) => {
                save_query(tx).execute(&mut **txn).await?;
            }
            None => {
                save_query(tx).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let query =
            sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = $1").bind(id);
        let mut active = self.active.lock().await;
        let row = match active.as_mut() {
            Some(txn) => query.fetch_optional(&mut **txn).await?,
            None => query.fetch_optional(&self.pool).await?,
        };
        row.map(PaymentRow::into_domain).transpose()
    }

    async fn find_successful_complete_for(
        &self,
        auth_id: Uuid,
    ) -> StoreResult<Option<Transaction>> {
        let query = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT * FROM payments
            WHERE status = 'Success' AND txn_type = 'Complete' AND auth_payment_id = $1
            LIMIT 1
            "#,
        )
        .bind(auth_id);
        let mut active = self.active.lock().await;
        let row = match active.as_mut() {
            Some(txn) => query.fetch_optional(&mut **txn).await?,
            None => query.fetch_optional(&self.pool).await?,
        };
        row.map(PaymentRow::into_domain).transpose()
    }

    fn supports_unit_of_work(&self) -> bool {
        true
    }

    async fn begin(&self) -> StoreResult<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(StoreError::Backend("unit of work already open".into()));
        }
        *active = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        let txn = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| StoreError::Backend("no unit of work open".into()))?;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        let txn = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| StoreError::Backend("no unit of work open".into()))?;
        txn.rollback().await?;
        Ok(())
    }
}

/// Internal row type for sqlx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    txn_type: String,
    status: String,
    amount: BigDecimal,
    currency: String,
    txn_ref: Option<String>,
    auth_code: Option<String>,
    merchant_reference: String,
    hosted_redirect_url: Option<String>,
    settlement_date: Option<NaiveDate>,
    response_xml: Option<String>,
    card_number_truncated: Option<String>,
    card_holder_name: Option<String>,
    date_expiry: Option<String>,
    timeout_date: Option<DateTime<Utc>>,
    auth_payment_id: Option<Uuid>,
    refunded_for_id: Option<Uuid>,
    paid_by_id: Option<Uuid>,
    message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let mut tx = Transaction::new(self.amount, self.currency);
        tx.id = self.id;
        tx.txn_type = self.txn_type.parse().map_err(StoreError::Backend)?;
        tx.status = self.status.parse().map_err(StoreError::Backend)?;
        tx.txn_ref = self.txn_ref;
        tx.auth_code = self.auth_code;
        tx.merchant_reference = self.merchant_reference;
        tx.hosted_redirect_url = self.hosted_redirect_url;
        tx.settlement_date = self.settlement_date;
        tx.card_number_truncated = self.card_number_truncated;
        tx.card_holder_name = self.card_holder_name;
        tx.date_expiry = self.date_expiry;
        tx.timeout_date = self.timeout_date;
        tx.auth_payment_id = self.auth_payment_id;
        tx.refunded_for_id = self.refunded_for_id;
        tx.paid_by_id = self.paid_by_id;
        tx.message = self.message;
        tx.created_at = self.created_at;
        tx.updated_at = self.updated_at;
        // Reloading the raw payload through the setter starts from a fresh
        // parse cache.
        if let Some(raw) = self.response_xml {
            tx.set_response_xml(raw);
        }
        Ok(tx)
    }
}

/// Postgres-backed recurring-billing profile store.
#[derive(Clone)]
pub struct PostgresRecurringProfileStore {
    pool: PgPool,
}

impl PostgresRecurringProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecurringProfileRow {
    id: Uuid,
    billing_token: String,
    amount: BigDecimal,
    currency: String,
    merchant_reference: String,
}

#[async_trait]
impl RecurringProfileStore for PostgresRecurringProfileStore {
    async fn load(&self, id: Uuid) -> StoreResult<Option<RecurringProfile>> {
        let row = sqlx::query_as::<_, RecurringProfileRow>(
            "SELECT * FROM recurring_profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| RecurringProfile {
            id: r.id,
            billing_token: r.billing_token,
            amount: r.amount,
            currency: r.currency,
            merchant_reference: r.merchant_reference,
        }))
    }
}

/// Postgres-backed payer lookup.
#[derive(Clone)]
pub struct PostgresPayerDirectory {
    pool: PgPool,
}

impl PostgresPayerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PayerRow {
    id: Uuid,
    email: Option<String>,
    receipt_message: Option<String>,
}

#[async_trait]
impl PayerDirectory for PostgresPayerDirectory {
    async fn load(&self, id: Uuid) -> StoreResult<Option<Payer>> {
        let row = sqlx::query_as::<_, PayerRow>("SELECT * FROM payers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Payer {
            id: r.id,
            email: r.email,
            receipt_message: r.receipt_message,
        }))
    }
}
