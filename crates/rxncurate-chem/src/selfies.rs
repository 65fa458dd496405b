//! SELFIES encoding of SMILES strings.
//!
//! The derivation follows the SMILES graph in written order: each atom
//! becomes a bracketed symbol prefixed by the order of the bond it was reached
//! through, branches become `[BranchL]` followed by `L` index symbols giving
//! the branch length, and ring closures become `[RingL]` followed by `L` index
//! symbols giving the distance back to the ring partner. Fragments are joined
//! with `.`.

use crate::kekulize::{kekulize, KekulizeError};
use crate::mol::{Atom, BondOrder, Molecule};
use crate::smiles::{parse_smiles, SmilesError};

/// Base-16 digits used for branch lengths and ring distances.
const INDEX_ALPHABET: [&str; 16] = [
    "[C]",
    "[Ring1]",
    "[Ring2]",
    "[Branch1]",
    "[=Branch1]",
    "[#Branch1]",
    "[Branch2]",
    "[=Branch2]",
    "[#Branch2]",
    "[O]",
    "[N]",
    "[=N]",
    "[=C]",
    "[#C]",
    "[S]",
    "[P]",
];

/// Branch and ring symbols carry at most three index digits.
const MAX_INDEX_DIGITS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelfiesError {
    #[error(transparent)]
    Smiles(#[from] SmilesError),

    #[error(transparent)]
    Kekulize(#[from] KekulizeError),

    #[error("bond order {0:?} has no SELFIES symbol")]
    UnsupportedBond(BondOrder),

    #[error("index {0} needs more than three SELFIES digits")]
    IndexOverflow(usize),

    #[error("bond {0} has no written order; encode molecules read from SMILES")]
    UnorderedBond(usize),
}

/// Encode a SMILES string as SELFIES.
pub fn encode(smiles: &str) -> Result<String, SelfiesError> {
    let mut mol = parse_smiles(smiles)?;
    kekulize(&mut mol)?;
    encode_molecule(&mol)
}

/// Encode an already-kekulized molecule read from SMILES.
///
/// Every bond must appear in some atom's written-order out-bonds; molecules
/// from other readers carry no such order and are rejected.
pub fn encode_molecule(mol: &Molecule) -> Result<String, SelfiesError> {
    let mut written = vec![false; mol.bonds.len()];
    for atom in 0..mol.atoms.len() {
        for &b in mol.out_bonds(atom) {
            written[b] = true;
        }
    }
    if let Some(bond) = written.iter().position(|&w| !w) {
        return Err(SelfiesError::UnorderedBond(bond));
    }

    let mut has_parent = vec![false; mol.atoms.len()];
    for bond in mol.bonds.iter().filter(|b| !b.ring) {
        has_parent[bond.b] = true;
    }

    let mut fragments = Vec::new();
    for root in (0..mol.atoms.len()).filter(|&a| !has_parent[a]) {
        fragments.push(derive_fragment(mol, None, root)?.concat());
    }
    Ok(fragments.join("."))
}

fn derive_fragment(
    mol: &Molecule,
    bond_into_root: Option<BondOrder>,
    root: usize,
) -> Result<Vec<String>, SelfiesError> {
    let mut derived = Vec::new();
    let mut current = root;
    let mut bond_in = bond_into_root;

    loop {
        derived.push(atom_symbol(bond_in, &mol.atoms[current])?);

        let out = mol.out_bonds(current);
        let mut next = None;
        for (i, &b) in out.iter().enumerate() {
            let bond = &mol.bonds[b];
            let partner = bond.other(current);
            if bond.ring {
                // Emitted once, from the later atom of the pair.
                if current < partner {
                    continue;
                }
                let digits = index_symbols(current - partner - 1)?;
                derived.push(format!("[{}Ring{}]", bond_char(bond.order)?, digits.len()));
                derived.extend(digits);
            } else if i == out.len() - 1 {
                next = Some((bond.order, partner));
            } else {
                let branch = derive_fragment(mol, Some(bond.order), partner)?;
                let digits = index_symbols(branch.len() - 1)?;
                derived.push(format!(
                    "[{}Branch{}]",
                    bond_char(bond.order)?,
                    digits.len()
                ));
                derived.extend(digits);
                derived.extend(branch);
            }
        }

        match next {
            Some((order, atom)) => {
                bond_in = Some(order);
                current = atom;
            }
            None => break,
        }
    }
    Ok(derived)
}

fn atom_symbol(bond_in: Option<BondOrder>, atom: &Atom) -> Result<String, SelfiesError> {
    let bond = match bond_in {
        Some(order) => bond_char(order)?,
        None => "",
    };
    Ok(format!("[{}{}]", bond, atom_text(atom)))
}

fn atom_text(atom: &Atom) -> String {
    let Some(h_count) = atom.h_count else {
        return atom.element.clone();
    };
    let mut text = String::new();
    if let Some(isotope) = atom.isotope {
        text.push_str(&isotope.to_string());
    }
    text.push_str(&atom.element);
    if h_count > 0 {
        text.push_str(&format!("H{h_count}"));
    }
    if atom.charge != 0 {
        text.push_str(&format!("{:+}", atom.charge));
    }
    text
}

fn bond_char(order: BondOrder) -> Result<&'static str, SelfiesError> {
    match order {
        BondOrder::Single => Ok(""),
        BondOrder::Double => Ok("="),
        BondOrder::Triple => Ok("#"),
        other => Err(SelfiesError::UnsupportedBond(other)),
    }
}

fn index_symbols(index: usize) -> Result<Vec<String>, SelfiesError> {
    let base = INDEX_ALPHABET.len();
    let mut digits = Vec::new();
    let mut rest = index;
    loop {
        digits.push(INDEX_ALPHABET[rest % base].to_string());
        rest /= base;
        if rest == 0 {
            break;
        }
    }
    if digits.len() > MAX_INDEX_DIGITS {
        return Err(SelfiesError::IndexOverflow(index));
    }
    digits.reverse();
    Ok(digits)
}
