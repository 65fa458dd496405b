//! Registry id → (SMILES, SELFIES).
//!
//! Lookups are memoized per resolver: the same reagent appears in thousands
//! of procedures, and the encoder is the expensive part. The memo is a
//! `DashMap` so enrichment can fan out over rayon workers.

use crate::convert::StructureEncoder;
use crate::model::RegistryId;
use crate::reference::ReferenceTable;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    pub smiles: String,
    pub selfies: String,
}

/// Why a registry id has no usable structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unresolved {
    #[error("registry number {0} is not in the reference table")]
    Missing(String),

    #[error("structure of registry number {id} could not be encoded: {reason}")]
    Encoding { id: String, reason: String },
}

pub struct StructureResolver<'a> {
    table: &'a ReferenceTable,
    encoder: &'a dyn StructureEncoder,
    memo: DashMap<String, Result<Resolved, Unresolved>>,
}

impl<'a> StructureResolver<'a> {
    pub fn new(table: &'a ReferenceTable, encoder: &'a dyn StructureEncoder) -> Self {
        Self {
            table,
            encoder,
            memo: DashMap::new(),
        }
    }

    /// Resolve one id. Pure with respect to the table: the same id always
    /// yields the same outcome.
    pub fn resolve(&self, id: &RegistryId) -> Result<Resolved, Unresolved> {
        let key = id.key();
        if let Some(hit) = self.memo.get(&key) {
            return hit.value().clone();
        }
        let outcome = self.lookup(&key);
        self.memo.insert(key, outcome.clone());
        outcome
    }

    fn lookup(&self, key: &str) -> Result<Resolved, Unresolved> {
        let smiles = self
            .table
            .get(key)
            .ok_or_else(|| Unresolved::Missing(key.to_string()))?;
        let selfies = self
            .encoder
            .encode(smiles)
            .map_err(|e| Unresolved::Encoding {
                id: key.to_string(),
                reason: e.message,
            })?;
        Ok(Resolved {
            smiles: smiles.to_string(),
            selfies,
        })
    }

    /// Distinct ids looked up so far.
    pub fn cached(&self) -> usize {
        self.memo.len()
    }
}
