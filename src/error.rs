use thiserror::Error;

use crate::types::{AccountId, Amount, OperationTypeId};

/// Every way a ledger operation can be rejected
///
/// All variants are local validation failures: the operation that produced them left no trace
/// in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("an account with document number {0} already exists")]
    DuplicateDocument(String),

    #[error("document number must not be empty")]
    InvalidDocument,

    #[error("account not found (account = {0})")]
    AccountNotFound(AccountId),

    #[error("unknown operation type (operation type = {0})")]
    UnknownOperationType(OperationTypeId),

    #[error("amount must be positive with at most two decimal places (amount = {0})")]
    InvalidAmount(Amount),

    #[error("insufficient funds (account = {account}, balance = {balance}, amount = {amount})")]
    InsufficientFunds {
        account: AccountId,
        balance: Amount,
        amount: Amount,
    },

    #[error("balance out of representable range (account = {0})")]
    BalanceOverflow(AccountId),
}

impl LedgerError {
    /// Short machine-readable name for logs and response bodies
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::DuplicateDocument(_) => "duplicate_document",
            LedgerError::InvalidDocument => "invalid_document",
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::UnknownOperationType(_) => "unknown_operation_type",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::BalanceOverflow(_) => "balance_overflow",
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
