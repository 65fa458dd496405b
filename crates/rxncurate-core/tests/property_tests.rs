use proptest::prelude::*;
use rxncurate_core::{
    enrich_batch, is_duplicate_procedure, merge, ConversionError, EntityRefs, Procedure,
    ReactionRecord, ReferenceTable, RegistryId, StructureResolver,
};

// Small id and text alphabets so collisions (and therefore merges) are common.

fn refs() -> impl Strategy<Value = EntityRefs> {
    proptest::collection::vec(0u64..6, 0..3)
        .prop_map(|ids| EntityRefs::new(ids.into_iter().map(RegistryId::from)))
}

fn procedure() -> impl Strategy<Value = Procedure> {
    (
        refs(),
        refs(),
        refs(),
        proptest::option::of(prop_oneof![Just("stir"), Just("reflux"), Just("")]),
    )
        .prop_map(|(reagents, catalysts, solvents, text)| Procedure {
            reagents,
            catalysts,
            solvents,
            exp_text: text.map(str::to_string),
            ..Procedure::default()
        })
}

fn record() -> impl Strategy<Value = ReactionRecord> {
    (
        0u64..8,
        refs(),
        refs(),
        proptest::collection::vec(procedure(), 1..4),
    )
        .prop_map(|(id, reactants, products, procedures)| {
            let mut record = ReactionRecord::new(id);
            record.reactants = reactants;
            record.products = products;
            record.procedures = procedures;
            record
        })
}

fn corpus() -> impl Strategy<Value = Vec<ReactionRecord>> {
    proptest::collection::vec(record(), 0..12)
}

/// Raw exports carry one record per reaction id. Repeated ids combined with
/// composition merges can give two records the same nested id, after which a
/// second merge would fold them together.
fn corpus_with_unique_ids() -> impl Strategy<Value = Vec<ReactionRecord>> {
    corpus().prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.reaction_id = (i as u64).into();
                record
            })
            .collect()
    })
}

fn table() -> ReferenceTable {
    // 5 is never resolvable.
    (0..5u64)
        .map(|id| (id.to_string(), "C".repeat(id as usize + 1)))
        .collect()
}

fn encoder(smiles: &str) -> Result<String, ConversionError> {
    Ok(format!("[{}]", smiles.len()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn merge_is_idempotent(input in corpus_with_unique_ids()) {
        let (once, _) = merge(input);
        let (twice, report) = merge(once.clone());
        prop_assert_eq!(once, twice);
        prop_assert_eq!(report.duplicate_procedures, 0);
    }

    #[test]
    fn no_two_surviving_procedures_are_equivalent(input in corpus()) {
        let (merged, _) = merge(input);
        for record in &merged {
            for (i, a) in record.procedures.iter().enumerate() {
                for b in &record.procedures[i + 1..] {
                    prop_assert!(!is_duplicate_procedure(a, b));
                }
            }
        }
    }

    #[test]
    fn merge_never_invents_procedures(input in corpus()) {
        let before: usize = input.iter().map(|r| r.procedures.len()).sum();
        let (merged, report) = merge(input);
        prop_assert!(merged.len() <= report.records_in);
        prop_assert!(report.procedures_out <= report.procedures_merged);
        prop_assert!(before <= report.procedures_merged);
        let after: usize = merged.iter().map(|r| r.procedures.len()).sum();
        prop_assert_eq!(after, report.procedures_out);
    }

    #[test]
    fn enrichment_output_is_complete_and_order_independent(input in corpus()) {
        let table = table();
        let resolver = StructureResolver::new(&table, &encoder);
        let sequential = enrich_batch(input.clone(), &resolver, false);
        let parallel = enrich_batch(input, &resolver, true);
        prop_assert_eq!(&sequential, &parallel);

        for record in &sequential.0 {
            prop_assert!(!record.procedures.is_empty());
            for procedure in &record.procedures {
                for (_, list) in procedure.entity_lists() {
                    prop_assert!(list.is_fully_resolved());
                    prop_assert!(list.beilstein_rn.iter().all(|id| id != &RegistryId::from(5)));
                }
            }
        }
    }
}
