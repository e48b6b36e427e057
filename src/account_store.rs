use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{LedgerError, LedgerResult};
use crate::transaction_log::TransactionLog;
use crate::types::{
    to_ledger_scale, Account, AccountId, Amount, PendingEntry, Transaction, AMOUNT_SCALE,
};

/// Whether a debit may take a balance below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverdraftPolicy {
    Allow,
    Deny,
}

/// Store account information and the transactions settled against it
pub trait AccountStore: Send + Sync {
    /// Open a new account with a zero balance
    /// The document number must not belong to another account.
    fn create_account(&self, document_number: &str, created_at: DateTime<Utc>)
        -> LedgerResult<Account>;

    fn account(&self, account: AccountId) -> LedgerResult<Account>;

    fn balance(&self, account: AccountId) -> LedgerResult<Amount>;

    /// All transactions of the account, in the order they were applied
    fn transactions(&self, account: AccountId) -> LedgerResult<Vec<Transaction>>;

    /// Apply a signed balance change and record it, as one indivisible step
    ///
    /// This is the only way a balance ever changes. The overdraft check, the balance update and
    /// the log append happen under the same per-account lock; on error nothing is changed.
    fn apply_delta(
        &self,
        account: AccountId,
        entry: PendingEntry,
        overdraft: OverdraftPolicy,
    ) -> LedgerResult<Transaction>;
}

#[derive(Debug)]
struct AccountData {
    document_number: String,
    created_at: DateTime<Utc>,
    balance: Amount,
    log: TransactionLog,
}

impl AccountData {
    fn snapshot(&self, id: AccountId) -> Account {
        Account {
            id,
            document_number: self.document_number.clone(),
            balance: self.balance,
            created_at: self.created_at,
        }
    }
}

/// A RAM-backed account store with one lock per account
///
/// The map itself is sharded by `DashMap`; a shard lock is only held long enough to clone the
/// account handle out, so work on different accounts never waits on each other.
pub struct DashMapAccountStore {
    accounts: DashMap<AccountId, Arc<Mutex<AccountData>>>,
    documents: DashMap<String, AccountId>,
    next_account: AtomicU64,
    next_transaction: AtomicU64,
}

impl Default for DashMapAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashMapAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            documents: DashMap::new(),
            next_account: AtomicU64::new(1),
            next_transaction: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn handle(&self, account: AccountId) -> LedgerResult<Arc<Mutex<AccountData>>> {
        self.accounts
            .get(&account)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotFound(account))
    }
}

impl AccountStore for DashMapAccountStore {
    fn create_account(
        &self,
        document_number: &str,
        created_at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let document_number = document_number.trim();
        if document_number.is_empty() {
            return Err(LedgerError::InvalidDocument);
        }

        // the document entry stays locked until the account is visible, so two concurrent
        // creations with the same document cannot both succeed
        match self.documents.entry(document_number.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateDocument(
                document_number.to_string(),
            )),
            Entry::Vacant(vacant) => {
                let id = self.next_account.fetch_add(1, Ordering::Relaxed);
                let data = AccountData {
                    document_number: document_number.to_string(),
                    created_at,
                    balance: to_ledger_scale(Amount::ZERO),
                    log: TransactionLog::new(),
                };
                let account = data.snapshot(id);
                self.accounts.insert(id, Arc::new(Mutex::new(data)));
                vacant.insert(id);
                Ok(account)
            }
        }
    }

    fn account(&self, account: AccountId) -> LedgerResult<Account> {
        let handle = self.handle(account)?;
        let data = handle.lock();
        Ok(data.snapshot(account))
    }

    fn balance(&self, account: AccountId) -> LedgerResult<Amount> {
        let handle = self.handle(account)?;
        let balance = handle.lock().balance;
        Ok(balance)
    }

    fn transactions(&self, account: AccountId) -> LedgerResult<Vec<Transaction>> {
        let handle = self.handle(account)?;
        let transactions = handle.lock().log.to_vec();
        Ok(transactions)
    }

    fn apply_delta(
        &self,
        account: AccountId,
        entry: PendingEntry,
        overdraft: OverdraftPolicy,
    ) -> LedgerResult<Transaction> {
        let handle = self.handle(account)?;
        let mut data = handle.lock();

        let new_balance = data
            .balance
            .checked_add(entry.signed_amount)
            .ok_or(LedgerError::BalanceOverflow(account))?;
        // near the 96-bit limit `checked_add` gives up fractional digits instead of failing
        if new_balance.scale() < AMOUNT_SCALE {
            return Err(LedgerError::BalanceOverflow(account));
        }

        if overdraft == OverdraftPolicy::Deny
            && entry.signed_amount.is_sign_negative()
            && new_balance < Amount::ZERO
        {
            return Err(LedgerError::InsufficientFunds {
                account,
                balance: data.balance,
                amount: entry.amount,
            });
        }

        let transaction = Transaction {
            id: self.next_transaction.fetch_add(1, Ordering::Relaxed),
            account_id: account,
            operation_type_id: entry.operation_type_id,
            amount: entry.amount,
            signed_amount: entry.signed_amount,
            balance_after: new_balance,
            event_date: entry.event_date,
        };
        data.log.append(transaction.clone());
        data.balance = new_balance;
        Ok(transaction)
    }
}
