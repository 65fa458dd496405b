//! Molecular graph shared by every reader and writer in this crate.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Bond order contribution to valence (aromatic bonds count once).
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Element symbol with conventional capitalization, also for aromatic atoms.
    pub element: String,
    pub aromatic: bool,
    pub isotope: Option<u16>,
    /// `None` means "implied by the valence model" (unbracketed SMILES atoms).
    pub h_count: Option<u8>,
    pub charge: i8,
}

impl Atom {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            aromatic: false,
            isotope: None,
            h_count: None,
            charge: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
    /// Written as a ring closure rather than a chain bond.
    pub ring: bool,
}

impl Bond {
    pub fn other(&self, atom: usize) -> usize {
        if self.a == atom {
            self.b
        } else {
            self.a
        }
    }
}

/// Atoms, bonds and, for molecules read from SMILES, the order in which each
/// atom's outgoing bonds were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
    out: Vec<Vec<usize>>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.out.push(Vec::new());
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder, ring: bool) -> usize {
        self.bonds.push(Bond { a, b, order, ring });
        let idx = self.bonds.len() - 1;
        self.adjacency[a].push(idx);
        self.adjacency[b].push(idx);
        idx
    }

    /// Bond indices incident to `atom`, in insertion order.
    pub fn incident(&self, atom: usize) -> &[usize] {
        &self.adjacency[atom]
    }

    /// Outgoing bonds of `atom` in written order (empty for molfile input).
    pub fn out_bonds(&self, atom: usize) -> &[usize] {
        &self.out[atom]
    }

    pub(crate) fn set_out_bonds(&mut self, atom: usize, bonds: Vec<usize>) {
        self.out[atom] = bonds;
    }

    pub fn bond_order_sum(&self, atom: usize) -> u8 {
        self.adjacency[atom]
            .iter()
            .map(|&b| self.bonds[b].order.valence())
            .fold(0u8, |acc, v| acc.saturating_add(v))
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
