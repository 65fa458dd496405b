//! Attach SMILES/SELFIES to every reagent, catalyst and solvent reference.
//!
//! A procedure is kept only if every id in all three lists resolved; a
//! record is kept only if at least one procedure survived.

use crate::model::{EntityRefs, Procedure, ReactionRecord};
use crate::resolver::StructureResolver;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichReport {
    pub records_in: usize,
    pub records_out: usize,
    pub procedures_in: usize,
    pub procedures_out: usize,
    /// Reference occurrences that did not resolve (counted per occurrence).
    pub unresolved_refs: usize,
}

impl EnrichReport {
    fn absorb(&mut self, other: EnrichReport) {
        self.records_in += other.records_in;
        self.records_out += other.records_out;
        self.procedures_in += other.procedures_in;
        self.procedures_out += other.procedures_out;
        self.unresolved_refs += other.unresolved_refs;
    }

    pub fn records_dropped(&self) -> usize {
        self.records_in - self.records_out
    }

    pub fn procedures_dropped(&self) -> usize {
        self.procedures_in - self.procedures_out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Kept(ReactionRecord),
    /// No procedure survived.
    Dropped,
}

impl EnrichOutcome {
    pub fn kept(self) -> Option<ReactionRecord> {
        match self {
            EnrichOutcome::Kept(record) => Some(record),
            EnrichOutcome::Dropped => None,
        }
    }
}

/// Fill `smiles`/`selfies` for one list. Returns how many ids did not resolve.
pub fn enrich_refs(refs: &mut EntityRefs, resolver: &StructureResolver<'_>) -> usize {
    let mut smiles = Vec::with_capacity(refs.beilstein_rn.len());
    let mut selfies = Vec::with_capacity(refs.beilstein_rn.len());
    let mut unresolved = 0;
    for id in &refs.beilstein_rn {
        match resolver.resolve(id) {
            Ok(resolved) => {
                smiles.push(resolved.smiles);
                selfies.push(resolved.selfies);
            }
            Err(reason) => {
                trace!(%reason, "reference unresolved");
                unresolved += 1;
            }
        }
    }
    refs.smiles = Some(smiles);
    refs.selfies = Some(selfies);
    unresolved
}

/// Enrich all three lists. The procedure is complete when this returns 0.
pub fn enrich_procedure(procedure: &mut Procedure, resolver: &StructureResolver<'_>) -> usize {
    procedure
        .entity_lists_mut()
        .into_iter()
        .map(|(_, refs)| enrich_refs(refs, resolver))
        .sum()
}

/// Enrich a record and drop its incomplete procedures.
pub fn enrich_record(
    mut record: ReactionRecord,
    resolver: &StructureResolver<'_>,
) -> (EnrichOutcome, EnrichReport) {
    let mut report = EnrichReport {
        records_in: 1,
        procedures_in: record.procedures.len(),
        ..EnrichReport::default()
    };

    let reaction_id = &record.reaction_id;
    record.procedures.retain_mut(|procedure| {
        let unresolved = enrich_procedure(procedure, resolver);
        report.unresolved_refs += unresolved;
        if unresolved > 0 {
            debug!(reaction = %reaction_id, unresolved, "procedure dropped");
        }
        unresolved == 0
    });
    report.procedures_out = record.procedures.len();

    if record.procedures.is_empty() {
        debug!(reaction = %record.reaction_id, "record dropped: no complete procedure");
        return (EnrichOutcome::Dropped, report);
    }
    report.records_out = 1;
    (EnrichOutcome::Kept(record), report)
}

/// Enrich a batch, preserving the order of surviving records. The parallel
/// and sequential paths produce identical output.
pub fn enrich_batch(
    records: Vec<ReactionRecord>,
    resolver: &StructureResolver<'_>,
    parallel: bool,
) -> (Vec<ReactionRecord>, EnrichReport) {
    let outcomes: Vec<(EnrichOutcome, EnrichReport)> = if parallel {
        records
            .into_par_iter()
            .map(|record| enrich_record(record, resolver))
            .collect()
    } else {
        records
            .into_iter()
            .map(|record| enrich_record(record, resolver))
            .collect()
    };

    let mut report = EnrichReport::default();
    let mut kept = Vec::with_capacity(outcomes.len());
    for (outcome, partial) in outcomes {
        report.absorb(partial);
        kept.extend(outcome.kept());
    }
    info!(
        records_in = report.records_in,
        records_out = report.records_out,
        procedures_in = report.procedures_in,
        procedures_out = report.procedures_out,
        unresolved_refs = report.unresolved_refs,
        "enriched batch"
    );
    (kept, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConversionError;
    use crate::model::RegistryId;
    use crate::reference::ReferenceTable;

    fn fake(smiles: &str) -> Result<String, ConversionError> {
        Ok(format!("[{smiles}]"))
    }

    fn table() -> ReferenceTable {
        let mut table = ReferenceTable::new();
        table.insert("100", "CCO");
        table.insert("101", "O");
        table.insert("102", "ClCCl");
        table
    }

    fn refs(ids: &[u64]) -> EntityRefs {
        EntityRefs::new(ids.iter().map(|&id| RegistryId::from(id)))
    }

    fn procedure(reagents: &[u64], catalysts: &[u64], solvents: &[u64]) -> Procedure {
        Procedure {
            reagents: refs(reagents),
            catalysts: refs(catalysts),
            solvents: refs(solvents),
            exp_text: Some("text".into()),
            ..Procedure::default()
        }
    }

    #[test]
    fn unresolved_catalyst_drops_the_only_procedure_and_the_record() {
        let table = table();
        let resolver = StructureResolver::new(&table, &fake);
        let mut record = ReactionRecord::new("R1");
        record.procedures.push(procedure(&[100], &[999], &[]));

        let (kept, report) = enrich_batch(vec![record], &resolver, false);
        assert!(kept.is_empty());
        assert_eq!(report.records_dropped(), 1);
        assert_eq!(report.unresolved_refs, 1);
    }

    #[test]
    fn complete_procedures_survive_with_aligned_lists() {
        let table = table();
        let resolver = StructureResolver::new(&table, &fake);
        let mut record = ReactionRecord::new("R1");
        record.procedures.push(procedure(&[100], &[], &[101, 102]));
        record.procedures.push(procedure(&[100, 555], &[], &[]));
        record.procedures.push(procedure(&[101], &[], &[]));

        let (kept, report) = enrich_batch(vec![record], &resolver, false);
        assert_eq!(kept.len(), 1);
        let procedures = &kept[0].procedures;
        assert_eq!(procedures.len(), 2);
        assert_eq!(report.procedures_dropped(), 1);

        let first = &procedures[0];
        assert_eq!(first.reagents.smiles, Some(vec!["CCO".to_string()]));
        assert_eq!(first.reagents.selfies, Some(vec!["[CCO]".to_string()]));
        assert_eq!(first.catalysts.smiles, Some(vec![]));
        assert_eq!(
            first.solvents.smiles,
            Some(vec!["O".to_string(), "ClCCl".to_string()])
        );
        for procedure in procedures {
            for (_, list) in procedure.entity_lists() {
                assert!(list.is_fully_resolved());
            }
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let table = table();
        let resolver = StructureResolver::new(&table, &fake);
        let records: Vec<ReactionRecord> = (0..64u64)
            .map(|i| {
                let mut record = ReactionRecord::new(i);
                let reagent = if i % 3 == 0 { 999 } else { 100 + i % 3 };
                record.procedures.push(procedure(&[reagent], &[], &[101]));
                record.procedures.push(procedure(&[101], &[], &[]));
                record
            })
            .collect();

        let sequential = enrich_batch(records.clone(), &resolver, false);
        let parallel = enrich_batch(records, &resolver, true);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.0.len(), 64);
    }

    #[test]
    fn single_record_outcome() {
        let table = table();
        let resolver = StructureResolver::new(&table, &fake);
        let mut record = ReactionRecord::new("R1");
        record.procedures.push(procedure(&[100], &[], &[]));
        let (outcome, report) = enrich_record(record, &resolver);
        assert!(matches!(outcome, EnrichOutcome::Kept(ref r) if r.procedures.len() == 1));
        assert_eq!(report.records_out, 1);

        let mut record = ReactionRecord::new("R2");
        record.procedures.push(procedure(&[], &[], &[404]));
        let (outcome, _) = enrich_record(record, &resolver);
        assert_eq!(outcome, EnrichOutcome::Dropped);
    }

    #[test]
    fn records_without_procedures_are_dropped() {
        let table = table();
        let resolver = StructureResolver::new(&table, &fake);
        let (kept, report) = enrich_batch(vec![ReactionRecord::new("empty")], &resolver, true);
        assert!(kept.is_empty());
        assert_eq!(report.records_in, 1);
    }
}
