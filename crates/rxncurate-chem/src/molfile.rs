//! MDL molfile (V2000 connection table) reader
//!
//! Reads the atom block, the bond block and the `M  CHG` / `M  ISO` property
//! lines. Explicit hydrogens hanging off a heavy atom are folded into that
//! atom's hydrogen count. V3000 tables are rejected so callers can fall back
//! to another encoding of the same substance.

use crate::element::{aromatic_implicit_hydrogens, hydrogens_for, is_element};
use crate::mol::{Atom, BondOrder, Molecule};
use crate::smiles::{write_smiles, SmilesError};
use nom::{
    character::complete::{i32 as signed, space0},
    multi::many1,
    sequence::preceded,
    IResult,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MolfileError {
    #[error("no counts line found")]
    MissingCountsLine,

    #[error("unsupported connection table version {0}")]
    UnsupportedVersion(String),

    #[error("malformed {section} line {line}: '{text}'")]
    Malformed {
        section: &'static str,
        line: usize,
        text: String,
    },

    #[error("unsupported atom symbol '{0}'")]
    UnsupportedAtom(String),

    #[error("unsupported bond type {0}")]
    UnsupportedBond(u8),

    #[error("atom number {0} outside the atom block")]
    AtomOutOfRange(usize),

    #[error("connection table has no atoms")]
    Empty,

    #[error(transparent)]
    Smiles(#[from] SmilesError),
}

/// Convert a V2000 molfile to a SMILES string.
pub fn molfile_to_smiles(text: &str) -> Result<String, MolfileError> {
    let mol = parse_molfile(text)?;
    Ok(write_smiles(&mol)?)
}

/// Parse a V2000 molfile into a molecule with explicit hydrogen counts.
pub fn parse_molfile(text: &str) -> Result<Molecule, MolfileError> {
    let lines: Vec<&str> = text.lines().collect();
    let counts_at = lines
        .iter()
        .position(|l| {
            let l = l.trim_end();
            l.ends_with("V2000") || l.ends_with("V3000")
        })
        .or_else(|| (lines.len() > 3).then_some(3))
        .ok_or(MolfileError::MissingCountsLine)?;

    let counts = lines[counts_at];
    if counts.trim_end().ends_with("V3000") {
        return Err(MolfileError::UnsupportedVersion("V3000".to_string()));
    }
    let malformed_counts = || MolfileError::Malformed {
        section: "counts",
        line: counts_at + 1,
        text: counts.to_string(),
    };
    let n_atoms: usize = column(counts, 0, 3)
        .and_then(|f| f.parse().ok())
        .ok_or_else(malformed_counts)?;
    let n_bonds: usize = column(counts, 3, 6)
        .and_then(|f| f.parse().ok())
        .ok_or_else(malformed_counts)?;
    if n_atoms == 0 {
        return Err(MolfileError::Empty);
    }

    let line_at = |idx: usize, section: &'static str| {
        lines.get(idx).copied().ok_or(MolfileError::Malformed {
            section,
            line: idx + 1,
            text: String::new(),
        })
    };

    let atom_start = counts_at + 1;
    let mut atoms = Vec::with_capacity(n_atoms);
    for idx in atom_start..atom_start + n_atoms {
        atoms.push(read_atom(line_at(idx, "atom")?, idx)?);
    }

    let bond_start = atom_start + n_atoms;
    let mut bonds = Vec::with_capacity(n_bonds);
    for idx in bond_start..bond_start + n_bonds {
        let line = line_at(idx, "bond")?;
        let malformed = || MolfileError::Malformed {
            section: "bond",
            line: idx + 1,
            text: line.to_string(),
        };
        let a: usize = column(line, 0, 3)
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
        let b: usize = column(line, 3, 6)
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
        let kind: u8 = column(line, 6, 9)
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
        let order = match kind {
            1 => BondOrder::Single,
            2 => BondOrder::Double,
            3 => BondOrder::Triple,
            4 => BondOrder::Aromatic,
            other => return Err(MolfileError::UnsupportedBond(other)),
        };
        bonds.push((atom_index(a, n_atoms)?, atom_index(b, n_atoms)?, order));
    }

    let mut charges_reset = false;
    for line in lines.iter().skip(bond_start + n_bonds) {
        if line.starts_with("M  END") {
            break;
        }
        if let Some(rest) = line.strip_prefix("M  CHG") {
            // The first CHG line supersedes every charge in the atom block.
            if !charges_reset {
                atoms.iter_mut().for_each(|a| a.charge = 0);
                charges_reset = true;
            }
            for (atom, value) in property_pairs(rest) {
                let idx = atom_index(atom, n_atoms)?;
                atoms[idx].charge = value.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
            }
        } else if let Some(rest) = line.strip_prefix("M  ISO") {
            for (atom, value) in property_pairs(rest) {
                let idx = atom_index(atom, n_atoms)?;
                atoms[idx].isotope = u16::try_from(value).ok();
            }
        }
    }

    for &(a, b, order) in &bonds {
        if order == BondOrder::Aromatic {
            atoms[a].aromatic = true;
            atoms[b].aromatic = true;
        }
    }

    Ok(fold_hydrogens(atoms, &bonds))
}

fn column(line: &str, start: usize, end: usize) -> Option<&str> {
    let end = end.min(line.len());
    line.get(start..end).map(str::trim).filter(|f| !f.is_empty())
}

fn atom_index(number: usize, n_atoms: usize) -> Result<usize, MolfileError> {
    if number == 0 || number > n_atoms {
        return Err(MolfileError::AtomOutOfRange(number));
    }
    Ok(number - 1)
}

fn read_atom(line: &str, idx: usize) -> Result<Atom, MolfileError> {
    let symbol = column(line, 31, 34)
        .or_else(|| line.split_whitespace().nth(3))
        .ok_or_else(|| MolfileError::Malformed {
            section: "atom",
            line: idx + 1,
            text: line.to_string(),
        })?;

    let mut atom = match symbol {
        "D" => Atom {
            isotope: Some(2),
            ..Atom::new("H")
        },
        "T" => Atom {
            isotope: Some(3),
            ..Atom::new("H")
        },
        s if is_element(s) => Atom::new(s),
        s => return Err(MolfileError::UnsupportedAtom(s.to_string())),
    };
    atom.charge = match column(line, 36, 39).and_then(|f| f.parse::<u8>().ok()) {
        Some(1) => 3,
        Some(2) => 2,
        Some(3) => 1,
        Some(5) => -1,
        Some(6) => -2,
        Some(7) => -3,
        _ => 0,
    };
    Ok(atom)
}

/// `(atom number, value)` pairs from the tail of an `M  CHG`/`M  ISO` line.
fn property_pairs(rest: &str) -> Vec<(usize, i32)> {
    let parsed: IResult<&str, Vec<i32>> = many1(preceded(space0, signed))(rest);
    let Ok((_, values)) = parsed else {
        return Vec::new();
    };
    let Some((&count, pairs)) = values.split_first() else {
        return Vec::new();
    };
    pairs
        .chunks_exact(2)
        .take(count.max(0) as usize)
        .filter_map(|pair| Some((usize::try_from(pair[0]).ok()?, pair[1])))
        .collect()
}

/// Remove terminal hydrogens and record every atom's total hydrogen count.
fn fold_hydrogens(atoms: Vec<Atom>, bonds: &[(usize, usize, BondOrder)]) -> Molecule {
    let n = atoms.len();
    let mut degree = vec![0usize; n];
    for &(a, b, _) in bonds {
        degree[a] += 1;
        degree[b] += 1;
    }

    let mut folded = vec![false; n];
    let mut explicit_h = vec![0u8; n];
    for &(a, b, order) in bonds {
        for (h, heavy) in [(a, b), (b, a)] {
            let atom = &atoms[h];
            let foldable = atom.element == "H"
                && atom.isotope.is_none()
                && atom.charge == 0
                && degree[h] == 1
                && order == BondOrder::Single
                && atoms[heavy].element != "H";
            if foldable {
                folded[h] = true;
                explicit_h[heavy] = explicit_h[heavy].saturating_add(1);
            }
        }
    }

    let mut mol = Molecule::new();
    let mut remap = vec![usize::MAX; n];
    for (idx, atom) in atoms.into_iter().enumerate() {
        if !folded[idx] {
            remap[idx] = mol.add_atom(atom);
        }
    }
    for &(a, b, order) in bonds {
        if !folded[a] && !folded[b] {
            mol.add_bond(remap[a], remap[b], order, false);
        }
    }

    for idx in (0..n).filter(|&i| !folded[i]) {
        let new = remap[idx];
        let k = explicit_h[idx];
        let sum = mol.bond_order_sum(new).saturating_add(k);
        let atom = &mol.atoms[new];
        let implied = if atom.aromatic {
            aromatic_implicit_hydrogens(&atom.element, sum)
        } else {
            hydrogens_for(&atom.element, atom.charge, sum)
        };
        let implied = if atom.element == "H" { 0 } else { implied };
        mol.atoms[new].h_count = Some(k.saturating_add(implied));
    }
    mol
}
