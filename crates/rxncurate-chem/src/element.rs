//! Element tables and valence rules shared by the readers and writers.

/// Every symbol a bracket atom may carry.
const PERIODIC_TABLE: &[&str] = &[
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

pub fn is_element(symbol: &str) -> bool {
    PERIODIC_TABLE.contains(&symbol)
}

/// Atoms that SMILES allows outside brackets.
pub fn is_organic_subset(symbol: &str) -> bool {
    matches!(
        symbol,
        "B" | "C" | "N" | "O" | "P" | "S" | "F" | "Cl" | "Br" | "I"
    )
}

/// Elements that may be written in lowercase aromatic form.
pub fn can_be_aromatic(symbol: &str) -> bool {
    matches!(
        symbol,
        "B" | "C" | "N" | "O" | "P" | "S" | "Se" | "As" | "Te"
    )
}

/// Normal valences of the organic subset, lowest first.
pub fn default_valences(symbol: &str) -> &'static [u8] {
    match symbol {
        "B" => &[3],
        "C" => &[4],
        "N" => &[3, 5],
        "O" => &[2],
        "P" => &[3, 5],
        "S" => &[2, 4, 6],
        "F" | "Cl" | "Br" | "I" => &[1],
        "Se" | "Te" => &[2, 4, 6],
        "As" => &[3, 5],
        _ => &[],
    }
}

/// Hydrogens implied for an unbracketed atom with the given bond order sum.
pub fn implicit_hydrogens(symbol: &str, bond_sum: u8) -> u8 {
    default_valences(symbol)
        .iter()
        .find(|&&v| v >= bond_sum)
        .map(|&v| v - bond_sum)
        .unwrap_or(0)
}

/// Hydrogens implied for an unbracketed aromatic atom: one aromatic bond
/// turns double after kekulization whenever the valence leaves room for it.
pub fn aromatic_implicit_hydrogens(symbol: &str, bond_sum: u8) -> u8 {
    match default_valences(symbol).first() {
        Some(&v) if v > bond_sum => v - bond_sum - 1,
        _ => 0,
    }
}

/// Lowest valence of a charged atom (or `None` for elements without a rule).
///
/// Group 15/16 atoms gain a bond per positive charge (`[NH4+]`, `[OH3+]`),
/// carbon and the halogens lose one per unit of either sign, boron gains one
/// per negative charge (`[BH4-]`).
pub fn charged_valence(symbol: &str, charge: i8) -> Option<u8> {
    let base = *default_valences(symbol).first()? as i16;
    let charge = charge as i16;
    let target = match symbol {
        "N" | "P" | "As" | "O" | "S" | "Se" | "Te" => base + charge,
        "B" => base - charge,
        _ => base - charge.abs(),
    };
    u8::try_from(target.max(0)).ok()
}

/// Hydrogens for a (possibly charged) atom under the same valence model.
pub fn hydrogens_for(symbol: &str, charge: i8, bond_sum: u8) -> u8 {
    if charge == 0 {
        return implicit_hydrogens(symbol, bond_sum);
    }
    match charged_valence(symbol, charge) {
        Some(v) if v >= bond_sum => v - bond_sum,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_hydrogens_pick_lowest_fitting_valence() {
        assert_eq!(implicit_hydrogens("C", 1), 3);
        assert_eq!(implicit_hydrogens("N", 4), 1);
        assert_eq!(implicit_hydrogens("S", 3), 1);
        assert_eq!(implicit_hydrogens("Cl", 2), 0);
        assert_eq!(implicit_hydrogens("Na", 0), 0);
    }

    #[test]
    fn aromatic_hydrogens_leave_room_for_one_double_bond() {
        assert_eq!(aromatic_implicit_hydrogens("C", 2), 1);
        assert_eq!(aromatic_implicit_hydrogens("C", 3), 0);
        assert_eq!(aromatic_implicit_hydrogens("N", 2), 0);
        assert_eq!(aromatic_implicit_hydrogens("O", 2), 0);
    }

    #[test]
    fn charged_atoms_shift_valence() {
        assert_eq!(hydrogens_for("N", 1, 0), 4);
        assert_eq!(hydrogens_for("O", -1, 1), 0);
        assert_eq!(hydrogens_for("B", -1, 0), 4);
        assert_eq!(hydrogens_for("C", -1, 2), 1);
    }

    #[test]
    fn element_lookup() {
        assert!(is_element("Pd"));
        assert!(!is_element("Xx"));
        assert!(is_organic_subset("Br"));
        assert!(!is_organic_subset("Na"));
    }
}
