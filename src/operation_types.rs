use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{LedgerError, LedgerResult};
use crate::types::{OperationKind, OperationType, OperationTypeId};

/// Layout of an operation type file
#[derive(Debug, Deserialize)]
struct RawRegistry {
    operation_types: Vec<OperationType>,
}

/// Read-only lookup table of the operation types the ledger accepts
///
/// Built once at startup and never mutated afterwards, so it can be shared between request
/// handlers behind a plain `Arc` without any locking.
#[derive(Debug, Clone)]
pub struct OperationTypeRegistry {
    types: HashMap<OperationTypeId, OperationType>,
}

impl Default for OperationTypeRegistry {
    fn default() -> Self {
        let defaults = [
            (1, "COMPRA A VISTA", OperationKind::Debit),
            (2, "COMPRA PARCELADA", OperationKind::Debit),
            (3, "SAQUE", OperationKind::Debit),
            (4, "PAGAMENTO", OperationKind::Credit),
        ];
        let types = defaults
            .iter()
            .map(|&(id, description, kind)| {
                (
                    id,
                    OperationType {
                        id,
                        description: description.to_string(),
                        kind,
                    },
                )
            })
            .collect();
        Self { types }
    }
}

impl OperationTypeRegistry {
    /// Build a registry, rejecting empty lists and repeated identifiers
    pub fn new(operation_types: impl IntoIterator<Item = OperationType>) -> Result<Self> {
        let mut types = HashMap::new();
        for operation_type in operation_types {
            let id = operation_type.id;
            if types.insert(id, operation_type).is_some() {
                return Err(anyhow!("Operation type defined twice (operation type = {})", id));
            }
        }

        if types.is_empty() {
            return Err(anyhow!("No operation types defined"));
        }
        Ok(Self { types })
    }

    /// Parse a TOML document with one `[[operation_types]]` table per type
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: RawRegistry = toml::from_str(source)?;
        Self::new(raw.operation_types)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read operation types from {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Invalid operation types in {}", path.display()))
    }

    pub fn resolve(&self, id: OperationTypeId) -> LedgerResult<&OperationType> {
        self.types
            .get(&id)
            .ok_or(LedgerError::UnknownOperationType(id))
    }

    /// All known operation types, ordered by identifier
    pub fn all(&self) -> Vec<OperationType> {
        let mut types: Vec<_> = self.types.values().cloned().collect();
        types.sort_by_key(|operation_type| operation_type.id);
        types
    }
}
