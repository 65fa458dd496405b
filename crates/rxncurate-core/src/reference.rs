//! The registry-number reference table and the builder that produces it.
//!
//! Substance exports list one or more molfiles per registry number. Only two
//! candidates are ever tried: the second (the salt-stripped parent in the
//! export format) and then the first. Substances where neither converts are
//! skipped. Later sources override earlier ones.

use crate::convert::{ConversionError, StructureCanonicalizer};
use crate::corpus::{read_json, write_json_atomic, CorpusError};
use crate::model::RegistryId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Registry id → SMILES. Keys are canonical registry keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTable {
    entries: BTreeMap<String, String>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn lookup(&self, id: &RegistryId) -> Option<&str> {
        self.get(&id.key())
    }

    /// Insert or replace; returns the replaced structure.
    pub fn insert(&mut self, key: impl Into<String>, smiles: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), smiles.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), CorpusError> {
        write_json_atomic(self, path)
    }
}

impl FromIterator<(String, String)> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Registry id → raw molfile candidates, as exported per substance file.
pub type SubstanceCandidates = BTreeMap<String, Vec<String>>;

pub fn load_candidates(path: &Path) -> Result<SubstanceCandidates, CorpusError> {
    read_json(path)
}

/// Candidate indices in the order they are attempted.
pub fn preference_order(candidates: usize) -> impl Iterator<Item = usize> {
    [1, 0].into_iter().filter(move |&i| i < candidates)
}

/// First candidate that canonicalizes, in preference order. Returns the last
/// failure when none does.
pub fn resolve_ranked(
    candidates: &[String],
    canonicalizer: &dyn StructureCanonicalizer,
) -> Result<String, ConversionError> {
    let mut last_err = ConversionError::new("substance has no structure candidates");
    for index in preference_order(candidates.len()) {
        match canonicalizer.canonicalize(&candidates[index]) {
            Ok(smiles) => return Ok(smiles),
            Err(err) => {
                debug!(candidate = index, error = %err, "structure candidate rejected");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub substances: usize,
    pub converted: usize,
    pub skipped: usize,
    /// Entries that overrode an existing table entry.
    pub replaced: usize,
}

/// Convert every substance and fold the results into `table`.
///
/// Conversion runs on the rayon pool; insertion happens afterwards in input
/// order so overrides are deterministic.
pub fn build_into(
    table: &mut ReferenceTable,
    substances: &SubstanceCandidates,
    canonicalizer: &dyn StructureCanonicalizer,
) -> BuildReport {
    let converted: Vec<(&String, Result<String, ConversionError>)> = substances
        .par_iter()
        .map(|(rn, candidates)| (rn, resolve_ranked(candidates, canonicalizer)))
        .collect();

    let mut report = BuildReport {
        substances: substances.len(),
        ..BuildReport::default()
    };
    for (rn, outcome) in converted {
        match outcome {
            Ok(smiles) => {
                report.converted += 1;
                if table.insert(rn.clone(), smiles).is_some() {
                    report.replaced += 1;
                }
            }
            Err(err) => {
                report.skipped += 1;
                debug!(registry_number = %rn, error = %err, "substance skipped");
            }
        }
    }
    info!(
        substances = report.substances,
        converted = report.converted,
        skipped = report.skipped,
        "reference table updated"
    );
    report
}

/// Build (or extend) a table from substance files, applied in order.
pub fn build_from_files(
    table: &mut ReferenceTable,
    inputs: &[impl AsRef<Path>],
    canonicalizer: &dyn StructureCanonicalizer,
) -> Result<BuildReport, CorpusError> {
    let mut total = BuildReport::default();
    for input in inputs {
        let substances = load_candidates(input.as_ref())?;
        let report = build_into(table, &substances, canonicalizer);
        total.substances += report.substances;
        total.converted += report.converted;
        total.skipped += report.skipped;
        total.replaced += report.replaced;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Accepts "ok:<smiles>" and rejects everything else.
    fn fake(raw: &str) -> Result<String, ConversionError> {
        raw.strip_prefix("ok:")
            .map(str::to_string)
            .ok_or_else(|| ConversionError::new(format!("rejected {raw}")))
    }

    fn candidates(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn second_candidate_is_preferred() {
        let got = resolve_ranked(&candidates(&["ok:first", "ok:second", "ok:third"]), &fake);
        assert_eq!(got.unwrap(), "second");
    }

    #[test]
    fn first_candidate_is_the_fallback() {
        assert_eq!(
            resolve_ranked(&candidates(&["ok:first", "broken"]), &fake).unwrap(),
            "first"
        );
        assert_eq!(resolve_ranked(&candidates(&["ok:only"]), &fake).unwrap(), "only");
    }

    #[test]
    fn later_candidates_are_never_tried() {
        let err = resolve_ranked(&candidates(&["broken", "broken", "ok:third"]), &fake);
        assert_eq!(err.unwrap_err().message, "rejected broken");
        assert!(resolve_ranked(&[], &fake).is_err());
    }

    #[test]
    fn build_skips_failures_and_overrides_in_order() {
        let mut table = ReferenceTable::new();
        table.insert("1", "old");

        let mut substances = SubstanceCandidates::new();
        substances.insert("1".into(), candidates(&["ok:C"]));
        substances.insert("2".into(), candidates(&["nope", "nope"]));
        substances.insert("3".into(), candidates(&["x", "ok:O"]));

        let report = build_into(&mut table, &substances, &fake);
        assert_eq!(
            report,
            BuildReport {
                substances: 3,
                converted: 2,
                skipped: 1,
                replaced: 1
            }
        );
        assert_eq!(table.get("1"), Some("C"));
        assert_eq!(table.get("2"), None);
        assert_eq!(table.lookup(&RegistryId::from(3)), Some("O"));
    }

    #[test]
    fn build_from_files_applies_sources_in_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&a, r#"{"1": ["ok:C"], "2": ["ok:N"]}"#).unwrap();
        std::fs::write(&b, r#"{"1": ["ok:CC"]}"#).unwrap();

        let mut table = ReferenceTable::new();
        let report = build_from_files(&mut table, &[&a, &b], &fake).unwrap();
        assert_eq!(report.converted, 3);
        assert_eq!(report.replaced, 1);
        assert_eq!(table.get("1"), Some("CC"));
        assert_eq!(table.get("2"), Some("N"));
    }

    #[test]
    fn table_round_trips_as_a_plain_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reagents.json");
        let table: ReferenceTable = [("100".to_string(), "CCO".to_string())].into_iter().collect();
        table.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"100": "CCO"}));
        assert_eq!(ReferenceTable::load(&path).unwrap(), table);
    }
}
