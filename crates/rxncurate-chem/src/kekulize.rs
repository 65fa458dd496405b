//! Kekulization: assign alternating single/double bonds to aromatic systems.
//!
//! Every aromatic atom whose valence leaves room for one more bond must end up
//! with exactly one double bond to an aromatic neighbour. That is a perfect
//! matching over the "needs a double bond" atoms, found by backtracking on the
//! most constrained atom first.

use crate::element::charged_valence;
use crate::mol::{BondOrder, Molecule};

const SEARCH_BUDGET: usize = 200_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KekulizeError {
    #[error("element '{0}' has no aromatic valence rule")]
    UnsupportedAromatic(String),

    #[error("no alternating bond assignment for the aromatic system at atom {0}")]
    NoMatching(usize),

    #[error("kekulization search exceeded {0} steps")]
    SearchBudget(usize),
}

/// Replace aromatic bonds with explicit single/double bonds in place.
pub fn kekulize(mol: &mut Molecule) -> Result<(), KekulizeError> {
    let n = mol.atoms.len();
    if !mol.atoms.iter().any(|a| a.aromatic)
        && !mol.bonds.iter().any(|b| b.order == BondOrder::Aromatic)
    {
        return Ok(());
    }

    let mut open = vec![false; n];
    for (idx, atom) in mol.atoms.iter().enumerate() {
        if !atom.aromatic {
            continue;
        }
        let target = charged_valence(&atom.element, atom.charge)
            .ok_or_else(|| KekulizeError::UnsupportedAromatic(atom.element.clone()))?;
        let used = mol
            .bond_order_sum(idx)
            .saturating_add(atom.h_count.unwrap_or(0));
        open[idx] = target > used;
    }
    let first_needy = open.iter().position(|&o| o);

    let mut search = Search {
        mol: &*mol,
        chosen: Vec::new(),
        steps: 0,
    };
    if !search.solve(&mut open)? {
        return Err(KekulizeError::NoMatching(first_needy.unwrap_or(0)));
    }
    let chosen = search.chosen;

    for (idx, bond) in mol.bonds.iter_mut().enumerate() {
        if bond.order == BondOrder::Aromatic {
            bond.order = if chosen.contains(&idx) {
                BondOrder::Double
            } else {
                BondOrder::Single
            };
        }
    }
    for atom in &mut mol.atoms {
        atom.aromatic = false;
    }
    Ok(())
}

struct Search<'a> {
    mol: &'a Molecule,
    chosen: Vec<usize>,
    steps: usize,
}

impl<'a> Search<'a> {
    /// Aromatic bonds from `atom` to a still-unmatched needy neighbour.
    fn options(&self, atom: usize, open: &[bool]) -> Vec<(usize, usize)> {
        self.mol
            .incident(atom)
            .iter()
            .filter(|&&b| self.mol.bonds[b].order == BondOrder::Aromatic)
            .map(|&b| (b, self.mol.bonds[b].other(atom)))
            .filter(|&(_, other)| open[other])
            .collect()
    }

    fn solve(&mut self, open: &mut [bool]) -> Result<bool, KekulizeError> {
        self.steps += 1;
        if self.steps > SEARCH_BUDGET {
            return Err(KekulizeError::SearchBudget(SEARCH_BUDGET));
        }

        let mut best: Option<(usize, Vec<(usize, usize)>)> = None;
        for atom in (0..open.len()).filter(|&a| open[a]) {
            let options = self.options(atom, open);
            if options.is_empty() {
                return Ok(false);
            }
            let better = best
                .as_ref()
                .map_or(true, |(_, current)| options.len() < current.len());
            if better {
                let forced = options.len() == 1;
                best = Some((atom, options));
                if forced {
                    break;
                }
            }
        }
        let Some((atom, options)) = best else {
            return Ok(true);
        };

        for (bond, partner) in options {
            open[atom] = false;
            open[partner] = false;
            self.chosen.push(bond);
            if self.solve(open)? {
                return Ok(true);
            }
            self.chosen.pop();
            open[atom] = true;
            open[partner] = true;
        }
        Ok(false)
    }
}
