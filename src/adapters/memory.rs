//! In-memory implementations of the persistence ports.
//!
//! Used in tests and local development. The transaction store records every
//! port call in order, which is how the lifecycle's persist-before-network
//! and rollback behavior gets asserted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Payer, PaymentStatus, RecurringProfile, Transaction, TxnType};
use crate::ports::{
    PayerDirectory, RecurringProfileStore, StoreError, StoreResult, TransactionStore,
};

/// Shared, ordered record of collaborator calls. Cloning hands out another
/// handle onto the same log, so a scripted gateway can interleave its own
/// entries with the store's.
#[derive(Clone, Default)]
pub struct CallLog(Arc<StdMutex<Vec<String>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<Uuid, Transaction>,
    snapshot: Option<HashMap<Uuid, Transaction>>,
}

#[derive(Default)]
pub struct MemoryTransactionStore {
    inner: Mutex<MemoryInner>,
    log: CallLog,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the call log shared by this store.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Seeds a record without logging, for test fixtures.
    pub async fn insert(&self, tx: Transaction) {
        self.inner.lock().await.records.insert(tx.id, tx);
    }

    /// Reads a record without logging, for test assertions.
    pub async fn get(&self, id: Uuid) -> Option<Transaction> {
        self.inner.lock().await.records.get(&id).cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn save(&self, tx: &Transaction) -> StoreResult<()> {
        self.log.record(format!("save {}", tx.id));
        self.inner.lock().await.records.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        self.log.record(format!("load {id}"));
        Ok(self.inner.lock().await.records.get(&id).cloned())
    }

    async fn find_successful_complete_for(
        &self,
        auth_id: Uuid,
    ) -> StoreResult<Option<Transaction>> {
        self.log.record(format!("find_complete {auth_id}"));
        Ok(self
            .inner
            .lock()
            .await
            .records
            .values()
            .find(|tx| {
                tx.txn_type == TxnType::Complete
                    && tx.status == PaymentStatus::Success
                    && tx.auth_payment_id == Some(auth_id)
            })
            .cloned())
    }

    fn supports_unit_of_work(&self) -> bool {
        true
    }

    async fn begin(&self) -> StoreResult<()> {
        self.log.record("begin");
        let mut inner = self.inner.lock().await;
        if inner.snapshot.is_some() {
            return Err(StoreError::Backend("unit of work already open".into()));
        }
        inner.snapshot = Some(inner.records.clone());
        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        self.log.record("commit");
        let mut inner = self.inner.lock().await;
        inner
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Backend("no unit of work open".into()))?;
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        self.log.record("rollback");
        let mut inner = self.inner.lock().await;
        let snapshot = inner
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Backend("no unit of work open".into()))?;
        inner.records = snapshot;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRecurringProfileStore {
    profiles: Mutex<HashMap<Uuid, RecurringProfile>>,
}

impl MemoryRecurringProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: RecurringProfile) {
        self.profiles.lock().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl RecurringProfileStore for MemoryRecurringProfileStore {
    async fn load(&self, id: Uuid) -> StoreResult<Option<RecurringProfile>> {
        Ok(self.profiles.lock().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryPayerDirectory {
    payers: Mutex<HashMap<Uuid, Payer>>,
}

impl MemoryPayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, payer: Payer) {
        self.payers.lock().await.insert(payer.id, payer);
    }
}

#[async_trait]
impl PayerDirectory for MemoryPayerDirectory {
    async fn load(&self, id: Uuid) -> StoreResult<Option<Payer>> {
        Ok(self.payers.lock().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollback_restores_the_snapshot() {
        let store = MemoryTransactionStore::new();
        let tx = Transaction::new("1.00".parse().unwrap(), "NZD");
        let id = tx.id;

        store.begin().await.unwrap();
        store.save(&tx).await.unwrap();
        assert!(store.get(id).await.is_some());
        store.rollback().await.unwrap();
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn commit_keeps_writes() {
        let store = MemoryTransactionStore::new();
        let tx = Transaction::new("1.00".parse().unwrap(), "NZD");
        let id = tx.id;

        store.begin().await.unwrap();
        store.save(&tx).await.unwrap();
        store.commit().await.unwrap();
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn find_successful_complete_filters_on_type_status_and_relation() {
        let store = MemoryTransactionStore::new();
        let auth_id = Uuid::new_v4();

        let mut complete = Transaction::new("1.00".parse().unwrap(), "NZD");
        complete.txn_type = TxnType::Complete;
        complete.status = PaymentStatus::Failure;
        complete.auth_payment_id = Some(auth_id);
        store.insert(complete.clone()).await;

        assert!(store
            .find_successful_complete_for(auth_id)
            .await
            .unwrap()
            .is_none());

        complete.status = PaymentStatus::Success;
        store.insert(complete).await;
        assert!(store
            .find_successful_complete_for(auth_id)
            .await
            .unwrap()
            .is_some());
    }
}
