//! Batch driver: enrich every batch file, combine, merge, save.
//!
//! Batch names come from an explicit list followed by generated ranges
//! (`{prefix}_{i + 1}_{i + step}` for `i` in `start..stop` by `step`). Each
//! batch `name` is read from `{base_dir}/{name}.json`.

use crate::convert::StructureEncoder;
use crate::corpus::{self, read_json, CorpusError};
use crate::enrich::{enrich_batch, EnrichReport};
use crate::merge::{merge, MergeReport};
use crate::reference::ReferenceTable;
use crate::resolver::StructureResolver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("no batches configured")]
    NoBatches,
}

/// Generated batch names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRange {
    pub prefix: String,
    #[serde(default)]
    pub start: u64,
    pub stop: u64,
    pub step: u64,
}

impl BatchRange {
    /// Names stop at the first batch whose bounds overflow `u64`.
    pub fn names(&self) -> Vec<String> {
        let step = match usize::try_from(self.step) {
            Ok(step) if step > 0 => step,
            _ => return Vec::new(),
        };
        (self.start..self.stop)
            .step_by(step)
            .map_while(|i| {
                let first = i.checked_add(1)?;
                let last = i.checked_add(self.step)?;
                Some(format!("{}_{}_{}", self.prefix, first, last))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding batch files and outputs.
    pub base_dir: PathBuf,
    /// Reference table, relative to `base_dir` unless absolute.
    pub reference_table: PathBuf,
    pub batches: Vec<String>,
    pub batch_ranges: Vec<BatchRange>,
    /// Appended to a batch name for its enriched copy.
    pub updated_suffix: String,
    pub combined_name: String,
    pub output_name: String,
    pub write_intermediate: bool,
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            reference_table: PathBuf::from("reagents.json"),
            batches: Vec::new(),
            batch_ranges: Vec::new(),
            updated_suffix: "_updated".to_string(),
            combined_name: "total_reactions_with_duplicates".to_string(),
            output_name: "total_reactions_without_duplicates".to_string(),
            write_intermediate: true,
            parallel: true,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        Ok(read_json(path)?)
    }

    /// Explicit names first, then every range in order.
    pub fn batch_names(&self) -> Vec<String> {
        let mut names = self.batches.clone();
        for range in &self.batch_ranges {
            names.extend(range.names());
        }
        names
    }

    fn file(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.json"))
    }

    pub fn batch_path(&self, name: &str) -> PathBuf {
        self.file(name)
    }

    pub fn updated_path(&self, name: &str) -> PathBuf {
        self.file(&format!("{name}{}", self.updated_suffix))
    }

    pub fn combined_path(&self) -> PathBuf {
        self.file(&self.combined_name)
    }

    pub fn output_path(&self) -> PathBuf {
        self.file(&self.output_name)
    }

    pub fn reference_path(&self) -> PathBuf {
        self.base_dir.join(&self.reference_table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub name: String,
    #[serde(flatten)]
    pub enrich: EnrichReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub reference_entries: usize,
    pub batches: Vec<BatchReport>,
    pub combined_records: usize,
    pub merge: MergeReport,
    pub output: PathBuf,
}

pub fn run(
    config: &PipelineConfig,
    encoder: &dyn StructureEncoder,
) -> Result<PipelineReport, PipelineError> {
    let names = config.batch_names();
    if names.is_empty() {
        return Err(PipelineError::NoBatches);
    }

    let table = ReferenceTable::load(&config.reference_path())?;
    info!(entries = table.len(), "loaded reference table");
    let resolver = StructureResolver::new(&table, encoder);

    let mut batches = Vec::with_capacity(names.len());
    let mut enriched = Vec::with_capacity(names.len());
    for name in names {
        let raw = corpus::load(&config.batch_path(&name))?;
        let (records, report) = enrich_batch(raw, &resolver, config.parallel);
        info!(batch = %name, kept = report.records_out, dropped = report.records_dropped(), "batch done");
        if config.write_intermediate {
            corpus::save(&records, &config.updated_path(&name))?;
        }
        batches.push(BatchReport { name, enrich: report });
        enriched.push(records);
    }

    let combined = corpus::combine(enriched);
    let combined_records = combined.len();
    corpus::save(&combined, &config.combined_path())?;

    let (merged, merge_report) = merge(combined);
    let output = config.output_path();
    corpus::save(&merged, &output)?;
    info!(
        records = merged.len(),
        output = %output.display(),
        "pipeline finished"
    );

    Ok(PipelineReport {
        reference_entries: table.len(),
        batches,
        combined_records,
        merge: merge_report,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConversionError;
    use crate::model::{EntityRefs, Procedure, ReactionRecord, RegistryId};
    use tempfile::tempdir;

    #[test]
    fn ranges_follow_the_batch_naming_scheme() {
        let range = BatchRange {
            prefix: "electrochemical".into(),
            start: 0,
            stop: 80000,
            step: 5000,
        };
        let names = range.names();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "electrochemical_1_5000");
        assert_eq!(names[15], "electrochemical_75001_80000");
        assert!(BatchRange { step: 0, ..range }.names().is_empty());
    }

    #[test]
    fn ranges_near_the_integer_limit_stop_instead_of_overflowing() {
        let range = BatchRange {
            prefix: "b".into(),
            start: u64::MAX - 10,
            stop: u64::MAX,
            step: 8,
        };
        assert_eq!(
            range.names(),
            vec![format!("b_{}_{}", u64::MAX - 9, u64::MAX - 2)]
        );

        let wide = BatchRange {
            prefix: "b".into(),
            start: 0,
            stop: 10,
            step: u64::MAX,
        };
        assert_eq!(wide.names(), vec![format!("b_1_{}", u64::MAX)]);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"batches": ["oxidation_1_2640"], "parallel": false}"#,
        )
        .unwrap();
        assert_eq!(config.batch_names(), vec!["oxidation_1_2640"]);
        assert!(!config.parallel);
        assert!(config.write_intermediate);
        assert_eq!(
            config.updated_path("oxidation_1_2640"),
            PathBuf::from("./oxidation_1_2640_updated.json")
        );
        assert_eq!(
            config.output_path(),
            PathBuf::from("./total_reactions_without_duplicates.json")
        );
    }

    #[test]
    fn empty_batch_list_is_rejected() {
        let encoder = |s: &str| -> Result<String, ConversionError> { Ok(s.to_string()) };
        assert!(matches!(
            run(&PipelineConfig::default(), &encoder),
            Err(PipelineError::NoBatches)
        ));
    }

    #[test]
    fn run_writes_every_stage() {
        let dir = tempdir().unwrap();
        let mut table = ReferenceTable::new();
        table.insert("100", "CCO");
        table.save(&dir.path().join("reagents.json")).unwrap();

        let mut kept = ReactionRecord::new("R1");
        kept.procedures.push(Procedure {
            reagents: EntityRefs::new([RegistryId::from(100)]),
            ..Procedure::default()
        });
        let mut dropped = ReactionRecord::new("R2");
        dropped.procedures.push(Procedure {
            reagents: EntityRefs::new([RegistryId::from(999)]),
            ..Procedure::default()
        });
        corpus::save(&[kept], &dir.path().join("a.json")).unwrap();
        corpus::save(&[dropped], &dir.path().join("b.json")).unwrap();

        let config = PipelineConfig {
            base_dir: dir.path().to_path_buf(),
            batches: vec!["a".into(), "b".into()],
            parallel: false,
            ..PipelineConfig::default()
        };
        let encoder = |s: &str| -> Result<String, ConversionError> { Ok(format!("[{s}]")) };
        let report = run(&config, &encoder).unwrap();

        assert_eq!(report.batches.len(), 2);
        assert_eq!(report.combined_records, 1);
        assert_eq!(report.merge.records_out, 1);
        assert!(config.updated_path("a").exists());
        assert!(corpus::load(&config.updated_path("b")).unwrap().is_empty());
        assert_eq!(corpus::load(&config.combined_path()).unwrap().len(), 1);

        let output = corpus::load(&report.output).unwrap();
        assert_eq!(
            output[0].procedures[0].reagents.selfies,
            Some(vec!["[CCO]".to_string()])
        );
    }

    #[test]
    fn missing_batch_file_is_reported() {
        let dir = tempdir().unwrap();
        ReferenceTable::new()
            .save(&dir.path().join("reagents.json"))
            .unwrap();
        let config = PipelineConfig {
            base_dir: dir.path().to_path_buf(),
            batches: vec!["absent".into()],
            ..PipelineConfig::default()
        };
        let encoder = |s: &str| -> Result<String, ConversionError> { Ok(s.to_string()) };
        assert!(matches!(
            run(&config, &encoder),
            Err(PipelineError::Corpus(CorpusError::Read { .. }))
        ));
    }
}
