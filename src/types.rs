use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AccountId = u64;

pub type TransactionId = u64;

pub type OperationTypeId = u32;

pub type Amount = Decimal;

/// Number of fractional digits every stored amount and balance carries
pub const AMOUNT_SCALE: u32 = 2;

/// Bring an amount to the fixed ledger scale (`0` becomes `0.00`)
///
/// Callers must have checked that `amount` has no more than `AMOUNT_SCALE` fractional digits,
/// otherwise the value gets rounded.
pub fn to_ledger_scale(mut amount: Amount) -> Amount {
    amount.rescale(AMOUNT_SCALE);
    amount
}

/// Whether an operation type adds to or takes from a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Credit,
    Debit,
}

impl OperationKind {
    /// `+1` for credits, `-1` for debits
    pub fn sign(self) -> Amount {
        match self {
            OperationKind::Credit => Decimal::ONE,
            OperationKind::Debit => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Reference data classifying a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationType {
    pub id: OperationTypeId,
    pub description: String,
    pub kind: OperationKind,
}

impl OperationType {
    /// Turn a positive magnitude into the effect it has on a balance
    pub fn signed_effect(&self, amount: Amount) -> Amount {
        amount * self.kind.sign()
    }
}

/// Snapshot of an account as seen from outside the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub document_number: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

/// A balance change that has been validated but not yet applied
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub operation_type_id: OperationTypeId,
    pub amount: Amount,
    pub signed_amount: Amount,
    pub event_date: DateTime<Utc>,
}

/// An applied, immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub operation_type_id: OperationTypeId,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Amount,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub signed_amount: Amount,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub balance_after: Amount,
    pub event_date: DateTime<Utc>,
}
