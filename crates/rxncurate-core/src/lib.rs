//! Reaction corpus curation
//!
//! Turns raw reaction exports into a deduplicated corpus:
//!
//! 1. [`reference`] builds the registry-number → SMILES table from substance
//!    exports.
//! 2. [`enrich`] attaches SMILES and SELFIES to every reagent, catalyst and
//!    solvent, dropping procedures (and then records) that cannot be fully
//!    resolved.
//! 3. [`corpus`] combines enriched batches and handles file I/O.
//! 4. [`merge`] folds equivalent reactions together and removes duplicate
//!    procedures.
//!
//! [`pipeline`] chains these over a configured set of batch files.

pub mod convert;
pub mod corpus;
pub mod enrich;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod reference;
pub mod resolver;

pub use convert::{
    ConversionError, MolfileCanonicalizer, SelfiesEncoder, StructureCanonicalizer,
    StructureEncoder,
};
pub use corpus::{combine, combine_files, load, save, write_json, CorpusError};
pub use enrich::{enrich_batch, enrich_procedure, enrich_record, EnrichOutcome, EnrichReport};
pub use merge::{dedup_procedures, is_duplicate_procedure, merge, merge_records, MergeReport};
pub use model::{Corpus, EntityRefs, Procedure, ReactionId, ReactionRecord, RegistryId};
pub use pipeline::{run, BatchRange, PipelineConfig, PipelineError, PipelineReport};
pub use reference::{build_from_files, build_into, BuildReport, ReferenceTable};
pub use resolver::{Resolved, StructureResolver, Unresolved};
