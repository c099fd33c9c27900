//! Transaction lifecycle manager.
//!
//! Drives a [`Transaction`] through exactly one state transition per public
//! operation. Every operation follows the same shape: check preconditions
//! before touching the record, open a unit of work when the store supports
//! one, set the transaction type, persist, build the field mapping, call the
//! gateway, apply and persist the result. Anything raised between persist
//! and gateway call is caught at the operation boundary, rolled back and
//! routed to the error hook; callers observe the outcome through the
//! transaction's own state.

use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::domain::{PaymentStatus, Transaction, TxnType};
use crate::error::PaymentError;
use crate::gateway::client::{GatewayClient, HostedRedirect};
use crate::gateway::request::{
    build_auth_request, build_complete_request, build_hosted_request, build_recurring_request,
    build_refund_request, PaymentInput,
};
use crate::ports::{RecurringProfileStore, TransactionStore};
use crate::services::receipt::ReceiptService;

/// Path of the response-processing endpoint the hosted flow redirects back
/// to. Used for both the success and the failure URL.
pub const HOSTED_RESPONSE_PATH: &str = "gateway/hosted/response";

pub fn hosted_response_url(public_base: &Url) -> Result<Url, url::ParseError> {
    public_base.join(HOSTED_RESPONSE_PATH)
}

pub struct LifecycleOptions {
    /// Wrap each operation's persist+call sequence in begin/commit. When
    /// unset, follows the store's native capability.
    pub use_transactional_writes: Option<bool>,
    /// Absolute URL of the hosted-flow callback endpoint.
    pub hosted_response_url: Url,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn GatewayClient>,
    profiles: Arc<dyn RecurringProfileStore>,
    receipts: ReceiptService,
    use_transactional_writes: bool,
    hosted_response_url: Url,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn GatewayClient>,
        profiles: Arc<dyn RecurringProfileStore>,
        receipts: ReceiptService,
        options: LifecycleOptions,
    ) -> Self {
        let use_transactional_writes = options
            .use_transactional_writes
            .unwrap_or_else(|| store.supports_unit_of_work());
        Self {
            store,
            gateway,
            profiles,
            receipts,
            use_transactional_writes,
            hosted_response_url: options.hosted_response_url,
        }
    }

    /// Authorise: reserve funds without capturing them.
    pub async fn authorize(
        &self,
        tx: &mut Transaction,
        input: &PaymentInput,
    ) -> Result<(), PaymentError> {
        let opened = match self.begin_uow().await {
            Ok(opened) => opened,
            Err(e) => {
                self.handle_error(tx, &e);
                return Ok(());
            }
        };
        let prior = tx.status;
        let outcome = async {
            tx.txn_type = TxnType::Auth;
            self.persist(tx, prior).await?;
            let request = build_auth_request(tx, input);
            let result = self.gateway.do_payment(&request).await?;
            tx.apply_result(&result);
            self.persist(tx, prior).await?;
            Ok(())
        }
        .await;
        self.conclude(tx, opened, outcome).await;
        Ok(())
    }

    /// Capture a previously authorised payment. Fails up front when the
    /// linked Auth transaction cannot be resolved or has already been
    /// completed successfully; a rejected call leaves the record untouched.
    pub async fn complete(&self, tx: &mut Transaction) -> Result<(), PaymentError> {
        let auth_id = tx
            .auth_payment_id
            .ok_or(PaymentError::MissingPriorTransaction)?;
        let auth = self
            .store
            .load(auth_id)
            .await?
            .ok_or(PaymentError::MissingPriorTransaction)?;
        if self
            .store
            .find_successful_complete_for(auth.id)
            .await?
            .is_some()
        {
            return Err(PaymentError::DuplicateCompletion);
        }

        let opened = match self.begin_uow().await {
            Ok(opened) => opened,
            Err(e) => {
                self.handle_error(tx, &e);
                return Ok(());
            }
        };
        let prior = tx.status;
        let outcome = async {
            tx.txn_type = TxnType::Complete;
            tx.merchant_reference = format!("Complete: {}", auth.merchant_reference);
            self.persist(tx, prior).await?;
            let request = build_complete_request(tx, &auth);
            let result = self.gateway.do_payment(&request).await?;
            tx.apply_result(&result);
            self.persist(tx, prior).await?;
            Ok(())
        }
        .await;
        self.conclude(tx, opened, outcome).await;
        Ok(())
    }

    /// Purchase: authorise and capture in one step.
    pub async fn purchase(
        &self,
        tx: &mut Transaction,
        input: &PaymentInput,
    ) -> Result<(), PaymentError> {
        let opened = match self.begin_uow().await {
            Ok(opened) => opened,
            Err(e) => {
                self.handle_error(tx, &e);
                return Ok(());
            }
        };
        let prior = tx.status;
        let outcome = async {
            tx.txn_type = TxnType::Purchase;
            self.persist(tx, prior).await?;
            let request = build_auth_request(tx, input);
            let result = self.gateway.do_payment(&request).await?;
            tx.apply_result(&result);
            self.persist(tx, prior).await?;
            Ok(())
        }
        .await;
        self.conclude(tx, opened, outcome).await;
        Ok(())
    }

    /// Refund a prior transaction. Returns whether the persist+call sequence
    /// ran to completion; a gateway decline still counts as a completed
    /// sequence, observable on the transaction itself.
    pub async fn refund(&self, tx: &mut Transaction) -> Result<bool, PaymentError> {
        let refunded_id = tx
            .refunded_for_id
            .ok_or(PaymentError::MissingPriorTransaction)?;
        let refunded = self
            .store
            .load(refunded_id)
            .await?
            .ok_or(PaymentError::MissingPriorTransaction)?;

        let opened = match self.begin_uow().await {
            Ok(opened) => opened,
            Err(e) => {
                self.handle_error(tx, &e);
                return Ok(false);
            }
        };
        let prior = tx.status;
        let outcome = async {
            tx.txn_type = TxnType::Refund;
            tx.merchant_reference = format!("Refund for: {}", refunded.merchant_reference);
            self.persist(tx, prior).await?;
            let request = build_refund_request(tx, &refunded);
            let result = self.gateway.do_payment(&request).await?;
            tx.apply_result(&result);
            self.persist(tx, prior).await?;
            Ok(())
        }
        .await;
        Ok(self.conclude(tx, opened, outcome).await)
    }

    /// Start a hosted-page purchase. Returns the redirect handle; the
    /// gateway's verdict arrives later through the asynchronous callback, so
    /// no result is applied here.
    pub async fn hosted_purchase(
        &self,
        tx: &mut Transaction,
        input: &PaymentInput,
    ) -> Result<HostedRedirect, PaymentError> {
        let opened = match self.begin_uow().await {
            Ok(opened) => opened,
            Err(e) => {
                self.handle_error(tx, &e);
                return Err(e);
            }
        };
        let prior = tx.status;
        let outcome = async {
            tx.txn_type = TxnType::Purchase;
            self.persist(tx, prior).await?;
            let request = build_hosted_request(tx, input, self.hosted_response_url.as_str());
            let redirect = self.gateway.do_hosted_payment(&request).await?;
            tx.hosted_redirect_url = Some(redirect.url.clone());
            self.persist(tx, prior).await?;
            Ok(redirect)
        }
        .await;
        match outcome {
            Ok(redirect) => {
                if opened {
                    if let Err(e) = self.store.commit().await {
                        let error = PaymentError::from(e);
                        self.handle_error(tx, &error);
                        return Err(error);
                    }
                }
                Ok(redirect)
            }
            Err(error) => {
                if opened {
                    if let Err(rollback_error) = self.store.rollback().await {
                        tracing::warn!(payment = %tx.id, "rollback failed: {rollback_error}");
                    }
                }
                self.handle_error(tx, &error);
                Err(error)
            }
        }
    }

    /// Charge a stored billing profile; its token stands in for card data.
    pub async fn recurring_purchase(
        &self,
        tx: &mut Transaction,
        profile_id: Uuid,
    ) -> Result<(), PaymentError> {
        let profile = self
            .profiles
            .load(profile_id)
            .await?
            .ok_or(PaymentError::UnknownRecurringProfile(profile_id))?;

        let opened = match self.begin_uow().await {
            Ok(opened) => opened,
            Err(e) => {
                self.handle_error(tx, &e);
                return Ok(());
            }
        };
        let prior = tx.status;
        let outcome = async {
            tx.txn_type = TxnType::Purchase;
            self.persist(tx, prior).await?;
            let request = build_recurring_request(tx, &profile);
            let result = self.gateway.do_payment(&request).await?;
            tx.apply_result(&result);
            self.persist(tx, prior).await?;
            Ok(())
        }
        .await;
        self.conclude(tx, opened, outcome).await;
        Ok(())
    }

    /// Whether this Auth transaction is still eligible for completion: it
    /// succeeded, and no successful Complete transaction references it yet.
    pub async fn can_complete(&self, tx: &Transaction) -> Result<bool, PaymentError> {
        if tx.txn_type != TxnType::Auth || tx.status != PaymentStatus::Success {
            return Ok(false);
        }
        Ok(self.successful_complete_payment(tx).await?.is_none())
    }

    /// The successful Complete transaction referencing this one, if any.
    pub async fn successful_complete_payment(
        &self,
        tx: &Transaction,
    ) -> Result<Option<Transaction>, PaymentError> {
        Ok(self.store.find_successful_complete_for(tx.id).await?)
    }

    async fn begin_uow(&self) -> Result<bool, PaymentError> {
        if self.use_transactional_writes && self.store.supports_unit_of_work() {
            self.store.begin().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Saves the transaction and fires receipt delivery when this persist
    /// moved the status onto `Success`. Persists that keep an already
    /// successful status, or end anywhere else, never notify.
    async fn persist(
        &self,
        tx: &mut Transaction,
        prior: PaymentStatus,
    ) -> Result<(), PaymentError> {
        tx.touch();
        self.store.save(tx).await?;
        if prior != PaymentStatus::Success && tx.status == PaymentStatus::Success {
            self.receipts.send_receipt(tx).await;
        }
        Ok(())
    }

    async fn conclude(
        &self,
        tx: &mut Transaction,
        opened: bool,
        outcome: Result<(), PaymentError>,
    ) -> bool {
        match outcome {
            Ok(()) => {
                if opened {
                    if let Err(e) = self.store.commit().await {
                        self.handle_error(tx, &PaymentError::from(e));
                        return false;
                    }
                }
                true
            }
            Err(error) => {
                if opened {
                    if let Err(rollback_error) = self.store.rollback().await {
                        tracing::warn!(payment = %tx.id, "rollback failed: {rollback_error}");
                    }
                }
                self.handle_error(tx, &error);
                false
            }
        }
    }

    /// Error hook: the failure is logged and reflected on the in-memory
    /// record, never re-raised. The store is left to the rollback that
    /// already ran.
    fn handle_error(&self, tx: &mut Transaction, error: &PaymentError) {
        tracing::error!(
            payment = %tx.id,
            txn_type = %tx.txn_type,
            "payment operation failed: {error}"
        );
        tx.status = PaymentStatus::Failure;
        tx.message = Some(error.to_string());
    }
}
