use crate::types::Transaction;
#[cfg(test)]
use crate::types::Amount;

/// Append-only history of the transactions applied to one account
///
/// Entries are kept in application order and are never changed or removed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, transaction: Transaction) {
        self.entries.push(transaction);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    /// Sum of the signed effects of all entries, which is what the balance must equal
    #[cfg(test)]
    pub fn net_effect(&self) -> Amount {
        self.entries
            .iter()
            .map(|transaction| transaction.signed_amount)
            .sum()
    }

    /// Copy of the entries for handing out past a lock
    pub fn to_vec(&self) -> Vec<Transaction> {
        self.entries.clone()
    }
}
