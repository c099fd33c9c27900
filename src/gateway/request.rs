//! Field mapping: translation from a transaction plus raw caller input into
//! the exact field set a gateway call expects.
//!
//! Every builder is a pure function. Caller input is filtered through the
//! flow's allow-list (unrecognised keys are dropped silently), card-number
//! fragments are joined once all other copying is done, and the fields the
//! transaction itself owns are written last so caller input can never spoof
//! them.

use std::collections::BTreeMap;

use crate::domain::{RecurringProfile, Transaction};

/// Keys accepted from caller input on the direct (server-to-server) flow.
const DIRECT_INPUT_ELEMENTS: &[&str] = &[
    "Amount",
    "CardHolderName",
    "CardNumber",
    "BillingId",
    "Cvc2",
    "DateExpiry",
    "BillingToken",
    "GatewayTxnRef",
    "EnableAddBillCard",
    "InputCurrency",
    "MerchantReference",
    "Opt",
    "PostUsername",
    "PostPassword",
    "TxnType",
    "TxnData1",
    "TxnData2",
    "TxnData3",
    "TxnId",
    "EnableAvsData",
    "AvsAction",
    "AvsPostCode",
    "AvsStreetAddress",
    "DateStart",
    "IssueNumber",
    "Track2",
];

/// Keys accepted from caller input on the hosted-redirect flow. Card data is
/// deliberately absent; card entry happens on the gateway's page.
const HOSTED_INPUT_ELEMENTS: &[&str] = &[
    "HostedUserId",
    "HostedKey",
    "AmountInput",
    "CurrencyInput",
    "EmailAddress",
    "EnableAddBillCard",
    "MerchantReference",
    "TxnData1",
    "TxnData2",
    "TxnData3",
    "TxnType",
    "TxnId",
    "UrlFail",
    "UrlSuccess",
];

/// Integration mode, selected explicitly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFlow {
    /// Card data submitted directly to the gateway by this system.
    Direct,
    /// Payer redirected to the gateway's hosted page.
    Hosted,
}

impl PaymentFlow {
    pub fn allow_list(&self) -> &'static [&'static str] {
        match self {
            PaymentFlow::Direct => DIRECT_INPUT_ELEMENTS,
            PaymentFlow::Hosted => HOSTED_INPUT_ELEMENTS,
        }
    }

    fn allows(&self, key: &str) -> bool {
        self.allow_list().contains(&key)
    }
}

/// Raw caller-supplied input for a payment operation. The card number
/// arrives as a sequence of fragments, the way a split form field posts it.
#[derive(Debug, Clone, Default)]
pub struct PaymentInput {
    pub fields: BTreeMap<String, String>,
    pub card_number: Vec<String>,
}

impl PaymentInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_card_number<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.card_number = fragments.into_iter().map(Into::into).collect();
        self
    }
}

/// The finished field set for one gateway call. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    fields: BTreeMap<String, String>,
}

impl GatewayRequest {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Adds a transport-level credential. Fields the mapper already set,
    /// including anything the caller legitimately supplied through the
    /// allow-list, are left untouched.
    pub fn insert_credential(&mut self, key: &str, value: String) {
        self.fields.entry(key.to_string()).or_insert(value);
    }

    /// Serialises the field set as a flat XML document under `root`.
    pub fn to_xml(&self, root: &str) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(root);
        out.push('>');
        for (key, value) in &self.fields {
            out.push('<');
            out.push_str(key);
            out.push('>');
            out.push_str(&quick_xml::escape::escape(value.as_str()));
            out.push_str("</");
            out.push_str(key);
            out.push('>');
        }
        out.push_str("</");
        out.push_str(root);
        out.push('>');
        out
    }
}

fn copy_allowed(flow: PaymentFlow, input: &PaymentInput) -> BTreeMap<String, String> {
    input
        .fields
        .iter()
        .filter(|(key, _)| flow.allows(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

// Fragment concatenation happens after the bulk copy so a later copy step
// can never clobber the joined value.
fn join_card_number(fields: &mut BTreeMap<String, String>, input: &PaymentInput) {
    if !input.card_number.is_empty() {
        fields.insert("CardNumber".to_string(), input.card_number.concat());
    }
}

fn force_transaction_fields(fields: &mut BTreeMap<String, String>, tx: &Transaction) {
    fields.insert("TxnId".to_string(), tx.id.to_string());
    fields.insert("TxnType".to_string(), tx.txn_type.as_str().to_string());
    fields.insert("Amount".to_string(), tx.amount.to_string());
    fields.insert("InputCurrency".to_string(), tx.currency.clone());
}

/// Field mapping for Authorize and Purchase: allow-listed caller input, the
/// joined card number, then the transaction's own fields on top.
pub fn build_auth_request(tx: &Transaction, input: &PaymentInput) -> GatewayRequest {
    let mut fields = copy_allowed(PaymentFlow::Direct, input);
    join_card_number(&mut fields, input);
    force_transaction_fields(&mut fields, tx);
    GatewayRequest { fields }
}

/// Field mapping for Complete: no caller input; carries the Auth
/// transaction's gateway reference forward.
pub fn build_complete_request(tx: &Transaction, auth: &Transaction) -> GatewayRequest {
    let mut fields = BTreeMap::new();
    force_transaction_fields(&mut fields, tx);
    if let Some(auth_ref) = &auth.txn_ref {
        fields.insert("GatewayTxnRef".to_string(), auth_ref.clone());
    }
    GatewayRequest { fields }
}

/// Field mapping for Refund: carries the refunded transaction's gateway
/// reference and this transaction's merchant reference.
pub fn build_refund_request(tx: &Transaction, refunded: &Transaction) -> GatewayRequest {
    let mut fields = BTreeMap::new();
    force_transaction_fields(&mut fields, tx);
    if let Some(original_ref) = &refunded.txn_ref {
        fields.insert("GatewayTxnRef".to_string(), original_ref.clone());
    }
    fields.insert(
        "MerchantReference".to_string(),
        tx.merchant_reference.clone(),
    );
    GatewayRequest { fields }
}

/// Field mapping for the hosted-redirect flow. Both callback URLs point at
/// the single response-processing endpoint; the amount keys differ from the
/// direct flow by gateway contract.
pub fn build_hosted_request(
    tx: &Transaction,
    input: &PaymentInput,
    response_url: &str,
) -> GatewayRequest {
    let mut fields = copy_allowed(PaymentFlow::Hosted, input);
    fields.insert("TxnId".to_string(), tx.id.to_string());
    fields.insert("TxnType".to_string(), tx.txn_type.as_str().to_string());
    fields.insert("AmountInput".to_string(), tx.amount.to_string());
    fields.insert("CurrencyInput".to_string(), tx.currency.clone());
    fields.insert(
        "MerchantReference".to_string(),
        tx.merchant_reference.clone(),
    );
    if let Some(timeout) = tx.timeout_date {
        fields.insert("Opt".to_string(), timeout.format("%Y%m%d%H%M%S").to_string());
    }
    fields.insert("UrlFail".to_string(), response_url.to_string());
    fields.insert("UrlSuccess".to_string(), response_url.to_string());
    GatewayRequest { fields }
}

/// Field mapping for a recurring purchase: the profile's billing token
/// stands in for card data.
pub fn build_recurring_request(tx: &Transaction, profile: &RecurringProfile) -> GatewayRequest {
    let mut fields = BTreeMap::new();
    fields.insert("BillingToken".to_string(), profile.billing_token.clone());
    fields.insert("TxnId".to_string(), tx.id.to_string());
    fields.insert("TxnType".to_string(), tx.txn_type.as_str().to_string());
    fields.insert("Amount".to_string(), profile.amount.to_string());
    fields.insert("InputCurrency".to_string(), profile.currency.clone());
    fields.insert(
        "MerchantReference".to_string(),
        profile.merchant_reference.clone(),
    );
    GatewayRequest { fields }
}
