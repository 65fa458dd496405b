//! Chemistry collaborators.
//!
//! The corpus code only needs two conversions and treats both as fallible
//! black boxes: SMILES → SELFIES during enrichment, molfile → SMILES while
//! building the reference table. Closures implement both traits, so tests can
//! substitute deterministic fakes.

/// A structure conversion that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// SMILES → SELFIES.
pub trait StructureEncoder: Send + Sync {
    fn encode(&self, smiles: &str) -> Result<String, ConversionError>;
}

/// Raw structure (molfile) → canonical SMILES.
pub trait StructureCanonicalizer: Send + Sync {
    fn canonicalize(&self, raw: &str) -> Result<String, ConversionError>;
}

impl<F> StructureEncoder for F
where
    F: Fn(&str) -> Result<String, ConversionError> + Send + Sync,
{
    fn encode(&self, smiles: &str) -> Result<String, ConversionError> {
        self(smiles)
    }
}

impl<F> StructureCanonicalizer for F
where
    F: Fn(&str) -> Result<String, ConversionError> + Send + Sync,
{
    fn canonicalize(&self, raw: &str) -> Result<String, ConversionError> {
        self(raw)
    }
}

/// SELFIES encoder backed by `rxncurate-chem`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfiesEncoder;

impl StructureEncoder for SelfiesEncoder {
    fn encode(&self, smiles: &str) -> Result<String, ConversionError> {
        rxncurate_chem::smiles_to_selfies(smiles).map_err(|e| ConversionError::new(e.to_string()))
    }
}

/// Molfile reader backed by `rxncurate-chem`.
///
/// The converter's output is cut at the first whitespace, so trailing
/// names or annotations never reach the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct MolfileCanonicalizer;

impl StructureCanonicalizer for MolfileCanonicalizer {
    fn canonicalize(&self, raw: &str) -> Result<String, ConversionError> {
        let smiles =
            rxncurate_chem::molfile_to_smiles(raw).map_err(|e| ConversionError::new(e.to_string()))?;
        first_token(&smiles)
    }
}

pub(crate) fn first_token(text: &str) -> Result<String, ConversionError> {
    text.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ConversionError::new("converter produced an empty structure"))
}
