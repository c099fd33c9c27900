//! Ports: the narrow interfaces the lifecycle core reaches its
//! collaborators through. Adapters live in [`crate::adapters`].

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Payer, RecurringProfile, Transaction};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence port for transactions. `begin`/`commit`/`rollback` bracket a
/// single in-flight unit of work; stores without native transactions keep
/// the no-op defaults and report `supports_unit_of_work() == false`.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Creates or updates the record.
    async fn save(&self, tx: &Transaction) -> StoreResult<()>;

    async fn load(&self, id: Uuid) -> StoreResult<Option<Transaction>>;

    /// The successful Complete transaction referencing the given Auth
    /// transaction, if one exists. Backs the duplicate-completion guard.
    async fn find_successful_complete_for(
        &self,
        auth_id: Uuid,
    ) -> StoreResult<Option<Transaction>>;

    fn supports_unit_of_work(&self) -> bool {
        false
    }

    async fn begin(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait RecurringProfileStore: Send + Sync {
    async fn load(&self, id: Uuid) -> StoreResult<Option<RecurringProfile>>;
}

#[async_trait]
pub trait PayerDirectory: Send + Sync {
    async fn load(&self, id: Uuid) -> StoreResult<Option<Payer>>;
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Notification collaborator: renders a receipt body for a transaction and
/// delivers it.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn render(&self, template: &str, tx: &Transaction) -> String;

    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}
