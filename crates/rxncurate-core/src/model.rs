//! Reaction corpus records as they appear on the wire.
//!
//! Field names are part of the file format. Every object also keeps the
//! fields this crate does not interpret, so a record survives load → save
//! unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Beilstein registry number. Numeric in origin but compared as text; the
/// wire form (number or string) is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryId {
    Number(Number),
    Text(String),
}

impl RegistryId {
    /// Canonical text key used for table lookups and set comparisons.
    pub fn key(&self) -> String {
        match self {
            RegistryId::Number(n) => n.to_string(),
            RegistryId::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryId::Number(n) => write!(f, "{n}"),
            RegistryId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RegistryId {
    fn from(value: u64) -> Self {
        RegistryId::Number(value.into())
    }
}

impl From<&str> for RegistryId {
    fn from(value: &str) -> Self {
        RegistryId::Text(value.to_string())
    }
}

/// Reaction identifier. A composition merge replaces the surviving record's
/// id with `[previous, candidate]`; the previous id may already be a list, so
/// merged ids nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReactionId {
    Number(Number),
    Text(String),
    Merged(Vec<ReactionId>),
}

impl ReactionId {
    pub fn merged(previous: ReactionId, candidate: ReactionId) -> Self {
        ReactionId::Merged(vec![previous, candidate])
    }

    /// Compact JSON rendering, usable as a hash key.
    pub fn key(&self) -> String {
        self.to_value().to_string()
    }

    fn to_value(&self) -> Value {
        match self {
            ReactionId::Number(n) => Value::Number(n.clone()),
            ReactionId::Text(s) => Value::String(s.clone()),
            ReactionId::Merged(ids) => Value::Array(ids.iter().map(ReactionId::to_value).collect()),
        }
    }
}

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<u64> for ReactionId {
    fn from(value: u64) -> Self {
        ReactionId::Number(value.into())
    }
}

impl From<&str> for ReactionId {
    fn from(value: &str) -> Self {
        ReactionId::Text(value.to_string())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A list of registry references (reagents, catalysts, solvents, reactants or
/// products). Enrichment adds `smiles`/`selfies`, aligned with resolution
/// order; unresolvable ids are left out of the derived lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRefs {
    #[serde(default)]
    pub beilstein_rn: Vec<RegistryId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smiles: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfies: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRefs {
    pub fn new(ids: impl IntoIterator<Item = RegistryId>) -> Self {
        Self {
            beilstein_rn: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Registry ids as a set of canonical keys (order and repeats ignored).
    pub fn key_set(&self) -> BTreeSet<String> {
        self.beilstein_rn.iter().map(RegistryId::key).collect()
    }

    /// Every id has a structure and an encoding.
    pub fn is_fully_resolved(&self) -> bool {
        let n = self.beilstein_rn.len();
        self.smiles.as_ref().map_or(false, |s| s.len() == n)
            && self.selfies.as_ref().map_or(false, |s| s.len() == n)
    }
}

/// One experimental procedure of a reaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(default)]
    pub reagents: EntityRefs,

    #[serde(default)]
    pub catalysts: EntityRefs,

    #[serde(default)]
    pub solvents: EntityRefs,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_text: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Procedure {
    /// The three reference lists enrichment resolves, by field name.
    pub fn entity_lists_mut(&mut self) -> [(&'static str, &mut EntityRefs); 3] {
        [
            ("reagents", &mut self.reagents),
            ("catalysts", &mut self.catalysts),
            ("solvents", &mut self.solvents),
        ]
    }

    pub fn entity_lists(&self) -> [(&'static str, &EntityRefs); 3] {
        [
            ("reagents", &self.reagents),
            ("catalysts", &self.catalysts),
            ("solvents", &self.solvents),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub reaction_id: ReactionId,

    #[serde(default)]
    pub reactants: EntityRefs,

    #[serde(default)]
    pub products: EntityRefs,

    #[serde(default)]
    pub procedures: Vec<Procedure>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReactionRecord {
    pub fn new(reaction_id: impl Into<ReactionId>) -> Self {
        Self {
            reaction_id: reaction_id.into(),
            reactants: EntityRefs::default(),
            products: EntityRefs::default(),
            procedures: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Ordered sequence of records; the unit of serialization.
pub type Corpus = Vec<ReactionRecord>;
