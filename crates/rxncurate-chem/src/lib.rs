//! Structure conversions for rxncurate
//!
//! Two conversions feed the corpus builder:
//! - molfile (V2000 connection table) → SMILES, used when building the
//!   registry-number reference table;
//! - SMILES → SELFIES, used when enriching reaction records.
//!
//! Both are best-effort: anything outside the supported subset is reported
//! as an error and the caller treats the substance as unresolved.

pub mod element;
pub mod kekulize;
pub mod mol;
pub mod molfile;
pub mod selfies;
pub mod smiles;

pub use kekulize::{kekulize, KekulizeError};
pub use mol::{Atom, Bond, BondOrder, Molecule};
pub use molfile::{molfile_to_smiles, parse_molfile, MolfileError};
pub use selfies::{encode as smiles_to_selfies, SelfiesError};
pub use smiles::{parse_smiles, write_smiles, SmilesError};
