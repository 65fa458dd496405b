//! Equivalence merge of a combined corpus.
//!
//! Phase 1 folds records into an accumulator. A candidate matches an
//! accumulated record when their reaction ids are equal (identity) or when
//! their reactant and product registry sets are equal (composition). The
//! candidate's procedures are appended to every record it matches; a
//! composition match also replaces that record's id with
//! `[previous id, candidate id]`. A candidate that matches nothing is
//! appended as a new record.
//!
//! Phase 2 drops, within each record, every procedure that repeats an
//! earlier one's reagent set, solvent set and experimental text. Catalysts
//! are not part of the comparison.

use crate::model::{Procedure, ReactionId, ReactionRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub records_in: usize,
    pub records_out: usize,
    pub identity_matches: usize,
    pub composition_matches: usize,
    /// Candidates whose procedures were appended to more than one record.
    pub multi_matched: usize,
    pub procedures_merged: usize,
    pub duplicate_procedures: usize,
    pub procedures_out: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Identity,
    Composition,
}

/// Reactant keys, product keys.
type Composition = (BTreeSet<String>, BTreeSet<String>);

fn composition(record: &ReactionRecord) -> Composition {
    (record.reactants.key_set(), record.products.key_set())
}

/// Run both phases.
pub fn merge(corpus: Vec<ReactionRecord>) -> (Vec<ReactionRecord>, MergeReport) {
    let mut report = MergeReport {
        records_in: corpus.len(),
        ..MergeReport::default()
    };

    let mut merged = merge_records(corpus, &mut report);
    report.procedures_merged = merged.iter().map(|r| r.procedures.len()).sum();
    for record in &mut merged {
        report.duplicate_procedures += dedup_procedures(record);
    }
    report.records_out = merged.len();
    report.procedures_out = report.procedures_merged - report.duplicate_procedures;

    info!(
        records_in = report.records_in,
        records_out = report.records_out,
        identity_matches = report.identity_matches,
        composition_matches = report.composition_matches,
        duplicate_procedures = report.duplicate_procedures,
        "merged corpus"
    );
    (merged, report)
}

// ============================================================================
// Phase 1: record merge
// ============================================================================

/// Accumulated records plus lookup indices over their current ids and
/// compositions. Equivalent to scanning every accumulated record per
/// candidate, in accumulator order.
#[derive(Default)]
struct Accumulator {
    records: Vec<ReactionRecord>,
    by_id: HashMap<String, Vec<usize>>,
    by_composition: HashMap<Composition, Vec<usize>>,
}

impl Accumulator {
    fn push(&mut self, record: ReactionRecord, composition: Composition) {
        let index = self.records.len();
        self.by_id
            .entry(record.reaction_id.key())
            .or_default()
            .push(index);
        self.by_composition.entry(composition).or_default().push(index);
        self.records.push(record);
    }

    /// Every accumulated record the candidate matches, in accumulator order.
    /// Identity takes precedence when both hold.
    fn matches(&self, id_key: &str, composition: &Composition) -> Vec<(usize, MatchKind)> {
        let mut hits = BTreeMap::new();
        for &index in self.by_composition.get(composition).into_iter().flatten() {
            hits.insert(index, MatchKind::Composition);
        }
        for &index in self.by_id.get(id_key).into_iter().flatten() {
            hits.insert(index, MatchKind::Identity);
        }
        hits.into_iter().collect()
    }

    fn replace_id(&mut self, index: usize, id: ReactionId) {
        let old_key = self.records[index].reaction_id.key();
        if let Some(indices) = self.by_id.get_mut(&old_key) {
            indices.retain(|&i| i != index);
            if indices.is_empty() {
                self.by_id.remove(&old_key);
            }
        }
        self.by_id.entry(id.key()).or_default().push(index);
        self.records[index].reaction_id = id;
    }
}

/// Phase 1 only.
pub fn merge_records(corpus: Vec<ReactionRecord>, report: &mut MergeReport) -> Vec<ReactionRecord> {
    let mut acc = Accumulator::default();

    for candidate in corpus {
        let id_key = candidate.reaction_id.key();
        let candidate_composition = composition(&candidate);
        let matches = acc.matches(&id_key, &candidate_composition);

        if matches.is_empty() {
            acc.push(candidate, candidate_composition);
            continue;
        }
        // Known multiplicity case: the scan does not stop at the first match,
        // so every matched record receives the candidate's procedures.
        if matches.len() > 1 {
            report.multi_matched += 1;
            warn!(
                reaction = %candidate.reaction_id,
                targets = matches.len(),
                "candidate matches several records; procedures appended to each"
            );
        }

        let ReactionRecord {
            reaction_id,
            mut procedures,
            ..
        } = candidate;
        let last = matches.len() - 1;
        for (n, &(index, kind)) in matches.iter().enumerate() {
            let incoming = if n == last {
                std::mem::take(&mut procedures)
            } else {
                procedures.clone()
            };
            acc.records[index].procedures.extend(incoming);

            match kind {
                MatchKind::Identity => report.identity_matches += 1,
                MatchKind::Composition => {
                    report.composition_matches += 1;
                    let previous = acc.records[index].reaction_id.clone();
                    acc.replace_id(index, ReactionId::merged(previous, reaction_id.clone()));
                }
            }
        }
    }
    acc.records
}

// ============================================================================
// Phase 2: procedure dedup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProcedureKey {
    reagents: BTreeSet<String>,
    solvents: BTreeSet<String>,
    exp_text: Option<String>,
}

impl ProcedureKey {
    fn of(procedure: &Procedure) -> Self {
        Self {
            reagents: procedure.reagents.key_set(),
            solvents: procedure.solvents.key_set(),
            exp_text: procedure.exp_text.clone(),
        }
    }
}

/// Same reagents, same solvents, same text; catalysts ignored.
pub fn is_duplicate_procedure(a: &Procedure, b: &Procedure) -> bool {
    ProcedureKey::of(a) == ProcedureKey::of(b)
}

/// Keep the first procedure of every equivalence class. Returns how many
/// were removed.
pub fn dedup_procedures(record: &mut ReactionRecord) -> usize {
    let before = record.procedures.len();
    let mut seen = HashSet::with_capacity(before);
    record
        .procedures
        .retain(|procedure| seen.insert(ProcedureKey::of(procedure)));
    before - record.procedures.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityRefs, RegistryId};
    use serde_json::json;

    fn refs(ids: &[u64]) -> EntityRefs {
        EntityRefs::new(ids.iter().map(|&id| RegistryId::from(id)))
    }

    fn procedure(text: &str) -> Procedure {
        Procedure {
            reagents: refs(&[10]),
            solvents: refs(&[20]),
            exp_text: Some(text.to_string()),
            ..Procedure::default()
        }
    }

    fn record(id: &str, reactants: &[u64], products: &[u64], texts: &[&str]) -> ReactionRecord {
        let mut record = ReactionRecord::new(id);
        record.reactants = refs(reactants);
        record.products = refs(products);
        record.procedures = texts.iter().map(|t| procedure(t)).collect();
        record
    }

    #[test]
    fn composition_match_merges_and_combines_ids() {
        let corpus = vec![
            record("R1", &[1, 2], &[3], &["p1"]),
            record("R2", &[2, 1], &[3], &["p2"]),
        ];
        let (merged, report) = merge(corpus);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            serde_json::to_value(&merged[0].reaction_id).unwrap(),
            json!(["R1", "R2"])
        );
        let texts: Vec<_> = merged[0]
            .procedures
            .iter()
            .map(|p| p.exp_text.as_deref().unwrap())
            .collect();
        assert_eq!(texts, vec!["p1", "p2"]);
        assert_eq!(report.composition_matches, 1);
    }

    #[test]
    fn identity_match_keeps_the_id() {
        let corpus = vec![
            record("R1", &[1], &[3], &["p1"]),
            record("R1", &[9], &[8], &["p2"]),
        ];
        let (merged, report) = merge(corpus);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].reaction_id, ReactionId::from("R1"));
        assert_eq!(merged[0].reactants, refs(&[1]));
        assert_eq!(merged[0].procedures.len(), 2);
        assert_eq!(report.identity_matches, 1);
    }

    #[test]
    fn repeated_composition_matches_nest_ids() {
        let corpus = vec![
            record("R1", &[1], &[2], &["a"]),
            record("R2", &[1], &[2], &["b"]),
            record("R3", &[1], &[2], &["c"]),
        ];
        let (merged, _) = merge(corpus);
        assert_eq!(
            serde_json::to_value(&merged[0].reaction_id).unwrap(),
            json!([["R1", "R2"], "R3"])
        );
        assert_eq!(merged[0].procedures.len(), 3);
    }

    #[test]
    fn candidate_is_appended_to_every_match() {
        // The first record shares the candidate's id, the second its composition.
        let corpus = vec![
            record("X", &[5], &[6], &["a"]),
            record("Y", &[1], &[2], &["c"]),
            record("X", &[1], &[2], &["new"]),
        ];
        let (merged, report) = merge(corpus);
        assert_eq!(merged.len(), 2);
        assert_eq!(report.multi_matched, 1);
        assert_eq!(merged[0].reaction_id, ReactionId::from("X"));
        assert_eq!(merged[0].procedures.len(), 2);
        assert_eq!(
            serde_json::to_value(&merged[1].reaction_id).unwrap(),
            json!(["Y", "X"])
        );
        assert_eq!(merged[1].procedures.len(), 2);
    }

    #[test]
    fn identity_wins_when_both_hold() {
        let corpus = vec![
            record("R1", &[1], &[2], &["a"]),
            record("R1", &[1], &[2], &["b"]),
        ];
        let (merged, report) = merge(corpus);
        assert_eq!(merged[0].reaction_id, ReactionId::from("R1"));
        assert_eq!(report.identity_matches, 1);
        assert_eq!(report.composition_matches, 0);
    }

    #[test]
    fn index_follows_replaced_ids() {
        // After R1 absorbs R2 its id is a list; a later "R1" no longer
        // matches it by identity and, with a new composition, stays separate.
        let corpus = vec![
            record("R1", &[1], &[2], &["a"]),
            record("R2", &[1], &[2], &["b"]),
            record("R1", &[7], &[8], &["c"]),
        ];
        let (merged, _) = merge(corpus);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].reaction_id, ReactionId::from("R1"));
    }

    #[test]
    fn dedup_ignores_catalysts_and_keeps_the_first() {
        let mut first = procedure("same");
        first.catalysts = refs(&[77]);
        first.extra.insert("tag".into(), json!("first"));
        let mut second = procedure("same");
        second.catalysts = refs(&[88]);
        second.reagents = refs(&[10, 10]);
        let third = procedure("different");

        assert!(is_duplicate_procedure(&first, &second));
        assert!(!is_duplicate_procedure(&first, &third));

        let mut record = record("R1", &[1], &[2], &[]);
        record.procedures = vec![first.clone(), second, third];
        assert_eq!(dedup_procedures(&mut record), 1);
        assert_eq!(record.procedures[0], first);
        assert_eq!(record.procedures.len(), 2);
    }

    #[test]
    fn missing_text_only_matches_missing_text() {
        let mut with_none = procedure("x");
        with_none.exp_text = None;
        assert!(!is_duplicate_procedure(&with_none, &procedure("")));
        assert!(is_duplicate_procedure(&with_none, &with_none.clone()));
    }

    #[test]
    fn merging_twice_changes_nothing() {
        let corpus = vec![
            record("R1", &[1, 2], &[3], &["p", "p"]),
            record("R2", &[1, 2], &[3], &["p", "q"]),
            record("R3", &[4], &[5], &["r"]),
            record("R1", &[6], &[7], &["s"]),
        ];
        let (once, _) = merge(corpus);
        let (twice, report) = merge(once.clone());
        assert_eq!(once, twice);
        assert_eq!(report.duplicate_procedures, 0);
    }
}
