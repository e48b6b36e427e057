use log::{debug, warn};
use std::sync::Arc;

use crate::account_store::{AccountStore, OverdraftPolicy};
use crate::clock::Clock;
use crate::error::{LedgerError, LedgerResult};
use crate::operation_types::OperationTypeRegistry;
use crate::types::{
    to_ledger_scale, AccountId, Amount, OperationTypeId, PendingEntry, Transaction, AMOUNT_SCALE,
};

/// Validates incoming transactions and settles them against the account store
pub struct TransactionProcessor {
    registry: Arc<OperationTypeRegistry>,
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    overdraft: OverdraftPolicy,
    accept_signed_amounts: bool,
}

impl TransactionProcessor {
    pub fn new(
        registry: Arc<OperationTypeRegistry>,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        overdraft: OverdraftPolicy,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            overdraft,
            accept_signed_amounts: false,
        }
    }

    /// Take a negative amount by its magnitude, leaving the direction to the operation type
    ///
    /// Off by default, in which case a negative amount is rejected like a zero one.
    pub fn with_signed_amounts(mut self, accept: bool) -> Self {
        self.accept_signed_amounts = accept;
        self
    }

    pub fn overdraft(&self) -> OverdraftPolicy {
        self.overdraft
    }

    /// A valid amount is strictly positive and has at most two fractional digits
    fn validate_amount(&self, amount: Amount) -> LedgerResult<Amount> {
        let magnitude = if self.accept_signed_amounts {
            amount.abs()
        } else {
            amount
        };

        if magnitude <= Amount::ZERO || magnitude.normalize().scale() > AMOUNT_SCALE {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(to_ledger_scale(magnitude))
    }

    fn build_entry(
        &self,
        operation_type_id: OperationTypeId,
        amount: Amount,
    ) -> LedgerResult<PendingEntry> {
        let amount = self.validate_amount(amount)?;
        let operation_type = self.registry.resolve(operation_type_id)?;

        Ok(PendingEntry {
            operation_type_id,
            amount,
            signed_amount: operation_type.signed_effect(amount),
            event_date: self.clock.now(),
        })
    }

    /// Post a single transaction
    ///
    /// Either exactly one transaction is recorded and the balance moves by its signed amount, or
    /// an error is returned and nothing changed. Errors are never retried here.
    pub fn post(
        &self,
        account: AccountId,
        operation_type_id: OperationTypeId,
        amount: Amount,
    ) -> LedgerResult<Transaction> {
        let result = self
            .build_entry(operation_type_id, amount)
            .and_then(|entry| self.store.apply_delta(account, entry, self.overdraft));

        match &result {
            Ok(transaction) => debug!(
                "Posted transaction (tx = {}, account = {}, amount = {}, balance = {})",
                transaction.id, account, transaction.signed_amount, transaction.balance_after
            ),
            Err(err) => warn!(
                "Rejected transaction (account = {}, operation type = {}, reason = {}): {}",
                account,
                operation_type_id,
                err.code(),
                err
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_store::DashMapAccountStore;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const PURCHASE: OperationTypeId = 1;
    const PAYMENT: OperationTypeId = 4;

    fn setup(overdraft: OverdraftPolicy) -> (Arc<DashMapAccountStore>, TransactionProcessor) {
        let store = Arc::new(DashMapAccountStore::new());
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let processor = TransactionProcessor::new(
            Arc::new(OperationTypeRegistry::default()),
            store.clone(),
            Arc::new(clock),
            overdraft,
        );
        (store, processor)
    }

    #[test]
    fn single_payment() {
        let (store, processor) = setup(OverdraftPolicy::Deny);
        store.create_account("1234567", Utc::now()).unwrap();

        let transaction = processor.post(1, PAYMENT, dec!(123.45)).unwrap();
        assert_eq!(
            transaction,
            Transaction {
                id: 1,
                account_id: 1,
                operation_type_id: PAYMENT,
                amount: dec!(123.45),
                signed_amount: dec!(123.45),
                balance_after: dec!(123.45),
                event_date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            }
        );
        assert_eq!(store.balance(1).unwrap(), dec!(123.45));
    }

    #[test]
    fn payment_then_purchase() {
        let (store, processor) = setup(OverdraftPolicy::Deny);
        store.create_account("1234567", Utc::now()).unwrap();

        processor.post(1, PAYMENT, dec!(2.0)).unwrap();
        let transaction = processor.post(1, PURCHASE, dec!(1.0)).unwrap();

        assert_eq!(transaction.signed_amount, dec!(-1.00));
        assert_eq!(transaction.balance_after, dec!(1.00));
        assert_eq!(store.balance(1).unwrap().to_string(), "1.00");
    }

    #[test]
    fn debit_with_overdraft_allowed() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        processor.post(1, PURCHASE, dec!(100.00)).unwrap();
        assert_eq!(store.balance(1).unwrap(), dec!(-100.00));
    }

    #[test]
    fn debit_with_overdraft_denied() {
        let (store, processor) = setup(OverdraftPolicy::Deny);
        store.create_account("1234567", Utc::now()).unwrap();

        assert_eq!(
            processor.post(1, PURCHASE, dec!(100.00)).unwrap_err(),
            LedgerError::InsufficientFunds {
                account: 1,
                balance: dec!(0.00),
                amount: dec!(100.00),
            }
        );
        assert_eq!(store.balance(1).unwrap(), Amount::ZERO);
        assert!(store.transactions(1).unwrap().is_empty());
    }

    #[test]
    fn invalid_amounts() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        for amount in [dec!(0), dec!(0.00), dec!(-5.00), dec!(1.005), dec!(0.001)] {
            assert_eq!(
                processor.post(1, PAYMENT, amount).unwrap_err(),
                LedgerError::InvalidAmount(amount)
            );
        }
        assert!(store.transactions(1).unwrap().is_empty());
    }

    #[test]
    fn signed_amounts_use_magnitude() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        let processor = processor.with_signed_amounts(true);
        store.create_account("1234567", Utc::now()).unwrap();

        let debit = processor.post(1, PURCHASE, dec!(-25.50)).unwrap();
        assert_eq!(debit.amount, dec!(25.50));
        assert_eq!(debit.signed_amount, dec!(-25.50));

        let credit = processor.post(1, PAYMENT, dec!(-5.50)).unwrap();
        assert_eq!(credit.signed_amount, dec!(5.50));
        assert_eq!(store.balance(1).unwrap(), dec!(-20.00));

        assert_eq!(
            processor.post(1, PAYMENT, dec!(0)).unwrap_err(),
            LedgerError::InvalidAmount(dec!(0))
        );
    }

    #[test]
    fn trailing_zeros_are_not_extra_precision() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        let transaction = processor.post(1, PAYMENT, dec!(1.2300)).unwrap();
        assert_eq!(transaction.amount.to_string(), "1.23");
    }

    #[test]
    fn unknown_operation_type() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        assert_eq!(
            processor.post(1, 5, dec!(10.00)).unwrap_err(),
            LedgerError::UnknownOperationType(5)
        );
        assert!(store.transactions(1).unwrap().is_empty());
    }

    #[test]
    fn non_existing_account() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        assert_eq!(
            processor.post(2, PAYMENT, dec!(10.00)).unwrap_err(),
            LedgerError::AccountNotFound(2)
        );
        assert_eq!(store.balance(1).unwrap(), Amount::ZERO);
        assert!(store.transactions(1).unwrap().is_empty());
    }

    #[test]
    fn final_balance_is_exact_sum() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        // values that drift when summed as binary floating point
        for _ in 0..10 {
            processor.post(1, PAYMENT, dec!(0.10)).unwrap();
            processor.post(1, PURCHASE, dec!(0.20)).unwrap();
        }
        processor.post(1, PAYMENT, dec!(1.00)).unwrap();

        assert_eq!(store.balance(1).unwrap(), Amount::ZERO);
        let sum: Amount = store
            .transactions(1)
            .unwrap()
            .iter()
            .map(|t| t.signed_amount)
            .sum();
        assert_eq!(sum, Amount::ZERO);
    }

    #[test]
    fn concurrent_posts_are_all_counted() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        store.create_account("1234567", Utc::now()).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..10u32 {
                let processor = &processor;
                scope.spawn(move || {
                    for i in 0..100u32 {
                        let amount = Amount::new(i64::from(worker * 100 + i + 1), 2);
                        let operation = if i % 3 == 0 { PURCHASE } else { PAYMENT };
                        processor.post(1, operation, amount).unwrap();
                    }
                });
            }
        });

        let transactions = store.transactions(1).unwrap();
        assert_eq!(transactions.len(), 1000);
        let sum: Amount = transactions.iter().map(|t| t.signed_amount).sum();
        assert_eq!(store.balance(1).unwrap(), sum);
    }

    #[test]
    fn balancing_transfer_between_two_accounts() {
        let (store, processor) = setup(OverdraftPolicy::Allow);
        let first = store.create_account("1234567", Utc::now()).unwrap().id;
        let second = store.create_account("87654321", Utc::now()).unwrap().id;

        let rounds = [
            (dec!(512.33), dec!(12.07)),
            (dec!(0.01), dec!(999.99)),
            (dec!(250.50), dec!(250.50)),
            (dec!(73.10), dec!(73.09)),
        ];

        std::thread::scope(|scope| {
            for &(debit, credit) in &rounds {
                let processor = &processor;
                scope.spawn(move || {
                    processor.post(first, PURCHASE, debit).unwrap();
                    processor.post(first, PAYMENT, credit).unwrap();

                    let net = credit - debit;
                    if net > Amount::ZERO {
                        processor.post(second, PAYMENT, net).unwrap();
                    } else if net < Amount::ZERO {
                        processor.post(second, PURCHASE, -net).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.balance(first).unwrap(), store.balance(second).unwrap());
        assert_eq!(store.balance(first).unwrap(), dec!(499.71));
    }
}
