//! SMILES reader and writer
//!
//! The reader keeps the order in which each atom's outgoing bonds appear in
//! the string (ring-closure digits, branches, chain continuation), because the
//! SELFIES derivation walks the graph in exactly that order. Stereo marks
//! (`@`, `/`, `\`) are accepted and dropped.

use crate::element::{
    aromatic_implicit_hydrogens, can_be_aromatic, hydrogens_for, implicit_hydrogens, is_element,
    is_organic_subset,
};
use crate::mol::{Atom, BondOrder, Molecule};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{map, map_res, opt, recognize},
    multi::many1_count,
    sequence::{pair, preceded},
    IResult,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmilesError {
    #[error("empty SMILES")]
    Empty,

    #[error("SMILES must be ASCII")]
    NonAscii,

    #[error("unexpected '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("malformed bracket atom '[{text}]' at position {position}")]
    BadBracketAtom { text: String, position: usize },

    #[error("unknown element '{0}'")]
    UnknownElement(String),

    #[error("bond symbol without a following atom at position {position}")]
    DanglingBond { position: usize },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParens { position: usize },

    #[error("ring closure without a preceding atom at position {position}")]
    RingWithoutAtom { position: usize },

    #[error("ring {0} closes on the atom that opened it")]
    SelfRing(u16),

    #[error("conflicting bond orders on ring {0}")]
    RingBondConflict(u16),

    #[error("ring {0} is never closed")]
    UnclosedRing(u16),

    #[error("more than 99 simultaneously open rings")]
    TooManyRings,

    #[error("element '{0}' cannot be written as aromatic")]
    AromaticElement(String),
}

// ============================================================================
// Reader
// ============================================================================

/// Parse a SMILES string into a molecular graph.
pub fn parse_smiles(input: &str) -> Result<Molecule, SmilesError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(SmilesError::Empty);
    }
    if !text.is_ascii() {
        return Err(SmilesError::NonAscii);
    }
    let mut parser = Parser::new(text);
    parser.run()?;
    parser.finish()
}

struct RingOpen {
    atom: usize,
    slot: usize,
    order: Option<BondOrder>,
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    mol: Molecule,
    /// Outgoing bond slots; `None` marks a ring opening not closed yet.
    slots: Vec<Vec<Option<usize>>>,
    prev: Option<usize>,
    branches: Vec<usize>,
    pending: Option<BondOrder>,
    rings: HashMap<u16, RingOpen>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            mol: Molecule::new(),
            slots: Vec::new(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            rings: HashMap::new(),
        }
    }

    fn run(&mut self) -> Result<(), SmilesError> {
        let text = self.text;
        let bytes = text.as_bytes();
        while self.pos < bytes.len() {
            let position = self.pos;
            let c = bytes[position];
            match c {
                b'(' => {
                    let prev = self.prev.ok_or(SmilesError::UnexpectedChar {
                        ch: '(',
                        position,
                    })?;
                    if self.pending.is_some() {
                        return Err(SmilesError::DanglingBond { position });
                    }
                    self.branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    if self.pending.is_some() {
                        return Err(SmilesError::DanglingBond { position });
                    }
                    let open = self
                        .branches
                        .pop()
                        .ok_or(SmilesError::UnbalancedParens { position })?;
                    self.prev = Some(open);
                    self.pos += 1;
                }
                b'.' => {
                    if self.pending.is_some() {
                        return Err(SmilesError::DanglingBond { position });
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.pending.is_some() {
                        return Err(SmilesError::UnexpectedChar {
                            ch: c as char,
                            position,
                        });
                    }
                    self.pending = Some(match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    self.pos += 1;
                }
                b'0'..=b'9' => {
                    self.pos += 1;
                    self.ring_bond((c - b'0') as u16, position)?;
                }
                b'%' => {
                    let digits = text
                        .get(position + 1..position + 3)
                        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
                        .ok_or(SmilesError::UnexpectedChar { ch: '%', position })?;
                    let ring = digits
                        .parse::<u16>()
                        .map_err(|_| SmilesError::UnexpectedChar { ch: '%', position })?;
                    self.pos += 3;
                    self.ring_bond(ring, position)?;
                }
                b'[' => {
                    let close = text[position..]
                        .find(']')
                        .map(|offset| position + offset)
                        .ok_or(SmilesError::UnexpectedChar { ch: '[', position })?;
                    let content = &text[position + 1..close];
                    let atom = match bracket_atom(content) {
                        Ok(("", parsed)) => parsed,
                        _ => {
                            return Err(SmilesError::BadBracketAtom {
                                text: content.to_string(),
                                position,
                            })
                        }
                    };
                    if !is_element(&atom.element) {
                        return Err(SmilesError::UnknownElement(atom.element));
                    }
                    self.pos = close + 1;
                    self.place_atom(atom, position)?;
                }
                _ => {
                    let (atom, width) = organic_atom(&text[position..]).ok_or(
                        SmilesError::UnexpectedChar {
                            ch: c as char,
                            position,
                        },
                    )?;
                    self.pos += width;
                    self.place_atom(atom, position)?;
                }
            }
        }
        Ok(())
    }

    fn place_atom(&mut self, atom: Atom, position: usize) -> Result<(), SmilesError> {
        let aromatic = atom.aromatic;
        let idx = self.mol.add_atom(atom);
        self.slots.push(Vec::new());
        match self.prev {
            Some(prev) => {
                let order = self
                    .pending
                    .take()
                    .unwrap_or_else(|| implied_order(self.mol.atoms[prev].aromatic, aromatic));
                let bond = self.mol.add_bond(prev, idx, order, false);
                self.slots[prev].push(Some(bond));
            }
            None if self.pending.is_some() => {
                return Err(SmilesError::DanglingBond { position });
            }
            None => {}
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn ring_bond(&mut self, ring: u16, position: usize) -> Result<(), SmilesError> {
        let current = self
            .prev
            .ok_or(SmilesError::RingWithoutAtom { position })?;
        let pending = self.pending.take();
        match self.rings.remove(&ring) {
            Some(open) => {
                if open.atom == current {
                    return Err(SmilesError::SelfRing(ring));
                }
                let order = match (open.order, pending) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(SmilesError::RingBondConflict(ring))
                    }
                    (Some(order), _) | (None, Some(order)) => order,
                    (None, None) => implied_order(
                        self.mol.atoms[open.atom].aromatic,
                        self.mol.atoms[current].aromatic,
                    ),
                };
                let bond = self.mol.add_bond(open.atom, current, order, true);
                self.slots[open.atom][open.slot] = Some(bond);
                self.slots[current].push(Some(bond));
            }
            None => {
                let slot = self.slots[current].len();
                self.slots[current].push(None);
                self.rings.insert(
                    ring,
                    RingOpen {
                        atom: current,
                        slot,
                        order: pending,
                    },
                );
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Molecule, SmilesError> {
        let end = self.text.len();
        if self.pending.is_some() {
            return Err(SmilesError::DanglingBond { position: end });
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnbalancedParens { position: end });
        }
        if let Some(&ring) = self.rings.keys().min() {
            return Err(SmilesError::UnclosedRing(ring));
        }
        for (atom, slots) in std::mem::take(&mut self.slots).into_iter().enumerate() {
            self.mol
                .set_out_bonds(atom, slots.into_iter().flatten().collect());
        }
        Ok(self.mol)
    }
}

fn implied_order(left_aromatic: bool, right_aromatic: bool) -> BondOrder {
    if left_aromatic && right_aromatic {
        BondOrder::Aromatic
    } else {
        BondOrder::Single
    }
}

fn organic_atom(rest: &str) -> Option<(Atom, usize)> {
    for two in ["Cl", "Br"] {
        if rest.starts_with(two) {
            return Some((Atom::new(two), 2));
        }
    }
    let c = rest.chars().next()?;
    match c {
        'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => Some((Atom::new(c.to_string()), 1)),
        'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
            let mut atom = Atom::new(c.to_ascii_uppercase().to_string());
            atom.aromatic = true;
            Some((atom, 1))
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Bracket atoms: [isotope? symbol chirality? hcount? charge? class?]
// ----------------------------------------------------------------------------

fn bracket_atom(input: &str) -> IResult<&str, Atom> {
    let (input, isotope) = opt(map_res(digit1, |d: &str| d.parse::<u16>()))(input)?;
    let (input, (element, aromatic)) = bracket_symbol(input)?;
    let (input, _) = opt(chirality)(input)?;
    let (input, h_count) = opt(preceded(
        char('H'),
        opt(map_res(digit1, |d: &str| d.parse::<u8>())),
    ))(input)?;
    let (input, charge) = opt(charge)(input)?;
    let (input, _) = opt(preceded(char(':'), digit1))(input)?;

    Ok((
        input,
        Atom {
            element,
            aromatic,
            isotope,
            h_count: Some(h_count.map(|n| n.unwrap_or(1)).unwrap_or(0)),
            charge: charge.unwrap_or(0),
        },
    ))
}

fn bracket_symbol(input: &str) -> IResult<&str, (String, bool)> {
    alt((
        map(alt((tag("se"), tag("as"), tag("te"))), |s: &str| {
            let mut symbol = s[..1].to_ascii_uppercase();
            symbol.push_str(&s[1..]);
            (symbol, true)
        }),
        map(one_of("bcnops"), |c: char| {
            (c.to_ascii_uppercase().to_string(), true)
        }),
        map(
            recognize(pair(
                satisfy(|c| c.is_ascii_uppercase()),
                opt(satisfy(|c| c.is_ascii_lowercase())),
            )),
            |s: &str| (s.to_string(), false),
        ),
    ))(input)
}

fn chirality(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        char('@'),
        opt(alt((
            tag("@"),
            recognize(pair(
                alt((tag("TH"), tag("AL"), tag("SP"), tag("TB"), tag("OH"))),
                digit1,
            )),
        ))),
    ))(input)
}

fn charge(input: &str) -> IResult<&str, i8> {
    alt((
        map(
            pair(one_of("+-"), map_res(digit1, |d: &str| d.parse::<i8>())),
            |(sign, n)| if sign == '-' { -n } else { n },
        ),
        map(many1_count(char('+')), |n| n as i8),
        map(many1_count(char('-')), |n| -(n as i8)),
    ))(input)
}

// ============================================================================
// Writer
// ============================================================================

/// Write a molecular graph as SMILES (depth-first, lowest atom index first).
pub fn write_smiles(mol: &Molecule) -> Result<String, SmilesError> {
    let mut tree = SpanningTree::new(mol);
    let mut roots = Vec::new();
    for atom in 0..mol.atoms.len() {
        if !tree.visited[atom] {
            roots.push(atom);
            tree.explore(mol, atom, None);
        }
    }

    let mut writer = Writer {
        mol,
        tree: &tree,
        out: String::new(),
        free: vec![true; 100],
        assigned: HashMap::new(),
    };
    for (i, &root) in roots.iter().enumerate() {
        if i > 0 {
            writer.out.push('.');
        }
        writer.emit(root, None)?;
    }
    Ok(writer.out)
}

struct SpanningTree {
    visited: Vec<bool>,
    seen_bond: Vec<bool>,
    children: Vec<Vec<(usize, usize)>>,
    ring_open: Vec<Vec<usize>>,
    ring_close: Vec<Vec<usize>>,
}

impl SpanningTree {
    fn new(mol: &Molecule) -> Self {
        let n = mol.atoms.len();
        Self {
            visited: vec![false; n],
            seen_bond: vec![false; mol.bonds.len()],
            children: vec![Vec::new(); n],
            ring_open: vec![Vec::new(); n],
            ring_close: vec![Vec::new(); n],
        }
    }

    fn explore(&mut self, mol: &Molecule, atom: usize, parent_bond: Option<usize>) {
        self.visited[atom] = true;
        for &bond in mol.incident(atom) {
            if Some(bond) == parent_bond || self.seen_bond[bond] {
                continue;
            }
            self.seen_bond[bond] = true;
            let next = mol.bonds[bond].other(atom);
            if self.visited[next] {
                // `next` is an ancestor: it is written first and opens the ring.
                self.ring_open[next].push(bond);
                self.ring_close[atom].push(bond);
            } else {
                self.children[atom].push((bond, next));
                self.explore(mol, next, Some(bond));
            }
        }
    }
}

struct Writer<'a> {
    mol: &'a Molecule,
    tree: &'a SpanningTree,
    out: String,
    free: Vec<bool>,
    assigned: HashMap<usize, usize>,
}

impl<'a> Writer<'a> {
    fn emit(&mut self, atom: usize, bond_in: Option<usize>) -> Result<(), SmilesError> {
        let mol = self.mol;
        let tree = self.tree;
        if let Some(bond) = bond_in {
            self.out.push_str(bond_symbol(mol, bond));
        }
        self.out.push_str(&atom_text(mol, atom)?);

        for &bond in &tree.ring_close[atom] {
            if let Some(digit) = self.assigned.remove(&bond) {
                push_ring_digit(&mut self.out, digit);
                self.free[digit] = true;
            }
        }
        for &bond in &tree.ring_open[atom] {
            let digit = (1..self.free.len())
                .find(|&d| self.free[d])
                .ok_or(SmilesError::TooManyRings)?;
            self.free[digit] = false;
            self.assigned.insert(bond, digit);
            self.out.push_str(bond_symbol(mol, bond));
            push_ring_digit(&mut self.out, digit);
        }

        if let Some((&(last_bond, last), rest)) = tree.children[atom].split_last() {
            for &(bond, child) in rest {
                self.out.push('(');
                self.emit(child, Some(bond))?;
                self.out.push(')');
            }
            self.emit(last, Some(last_bond))?;
        }
        Ok(())
    }
}

fn push_ring_digit(out: &mut String, digit: usize) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push('%');
        out.push_str(&digit.to_string());
    }
}

fn bond_symbol(mol: &Molecule, bond: usize) -> &'static str {
    let bond = &mol.bonds[bond];
    let both_aromatic = mol.atoms[bond.a].aromatic && mol.atoms[bond.b].aromatic;
    match bond.order {
        BondOrder::Single if both_aromatic => "-",
        BondOrder::Single => "",
        BondOrder::Double => "=",
        BondOrder::Triple => "#",
        BondOrder::Quadruple => "$",
        BondOrder::Aromatic if both_aromatic => "",
        BondOrder::Aromatic => ":",
    }
}

fn atom_text(mol: &Molecule, idx: usize) -> Result<String, SmilesError> {
    let atom = &mol.atoms[idx];
    if atom.aromatic && !can_be_aromatic(&atom.element) {
        return Err(SmilesError::AromaticElement(atom.element.clone()));
    }
    let symbol = if atom.aromatic {
        atom.element.to_ascii_lowercase()
    } else {
        atom.element.clone()
    };
    if writes_unbracketed(mol, idx) {
        return Ok(symbol);
    }

    let h = atom.h_count.unwrap_or_else(|| {
        hydrogens_for(&atom.element, atom.charge, mol.bond_order_sum(idx))
    });
    let mut text = String::from("[");
    if let Some(isotope) = atom.isotope {
        text.push_str(&isotope.to_string());
    }
    text.push_str(&symbol);
    match h {
        0 => {}
        1 => text.push('H'),
        n => text.push_str(&format!("H{n}")),
    }
    match atom.charge {
        0 => {}
        1 => text.push('+'),
        -1 => text.push('-'),
        c if c > 0 => text.push_str(&format!("+{c}")),
        c => text.push_str(&format!("-{}", -(c as i16))),
    }
    text.push(']');
    Ok(text)
}

fn writes_unbracketed(mol: &Molecule, idx: usize) -> bool {
    let atom = &mol.atoms[idx];
    if !is_organic_subset(&atom.element) || atom.charge != 0 || atom.isotope.is_some() {
        return false;
    }
    match atom.h_count {
        None => true,
        Some(h) => h == unbracketed_hydrogens(mol, idx),
    }
}

/// Hydrogens a reader infers for the unbracketed form of this atom.
fn unbracketed_hydrogens(mol: &Molecule, idx: usize) -> u8 {
    let atom = &mol.atoms[idx];
    let sum = mol.bond_order_sum(idx);
    if atom.aromatic {
        aromatic_implicit_hydrogens(&atom.element, sum)
    } else {
        implicit_hydrogens(&atom.element, sum)
    }
}
