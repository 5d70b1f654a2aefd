//! Canonical graph identity via iterative neighborhood refinement.
//!
//! Atom labels start from local invariants (element, charge, aromaticity,
//! implicit hydrogen count, parity, degree) and are refined with the sorted
//! multiset of neighbor labels until the partition stabilizes. The signature
//! string is built from the sorted label multisets of atoms and bonds, so it
//! is independent of atom ordering and of any conformer data.

use crate::chem::molecule::{BondOrder, Molecule, Parity};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn order_code(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

fn parity_code(parity: Option<Parity>) -> u8 {
    match parity {
        None => 0,
        Some(Parity::Clockwise) => 1,
        Some(Parity::Counterclockwise) => 2,
    }
}

fn hash_one(value: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Stable per-atom labels after refinement.
pub(crate) fn refined_labels(mol: &Molecule) -> Vec<u64> {
    let n = mol.atoms.len();
    let mut labels: Vec<u64> = (0..n)
        .map(|index| {
            let atom = &mol.atoms[index];
            hash_one(&(
                atom.element.as_str(),
                atom.formal_charge,
                atom.aromatic,
                atom.implicit_hydrogens,
                parity_code(atom.parity),
                mol.neighbors(index).len(),
            ))
        })
        .collect();

    let mut distinct = count_distinct(&labels);
    for _ in 0..n {
        let next: Vec<u64> = (0..n)
            .map(|index| {
                let mut env: Vec<(u8, u64)> = mol
                    .neighbors(index)
                    .into_iter()
                    .map(|(other, order)| (order_code(order), labels[other]))
                    .collect();
                env.sort_unstable();
                hash_one(&(labels[index], env))
            })
            .collect();
        let next_distinct = count_distinct(&next);
        labels = next;
        if next_distinct == distinct {
            break;
        }
        distinct = next_distinct;
    }
    labels
}

fn count_distinct(labels: &[u64]) -> usize {
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Dense canonical ranks (equivalent atoms share a rank).
pub(crate) fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let labels = refined_labels(mol);
    let mut sorted = labels.clone();
    sorted.sort_unstable();
    sorted.dedup();
    labels
        .iter()
        .map(|label| sorted.binary_search(label).unwrap_or(0))
        .collect()
}

/// Order-independent signature string for the molecular graph.
pub(crate) fn signature_string(mol: &Molecule) -> String {
    let labels = refined_labels(mol);
    let mut atom_part: Vec<u64> = labels.clone();
    atom_part.sort_unstable();

    let mut bond_part: Vec<(u64, u64, u8)> = mol
        .bonds
        .iter()
        .map(|bond| {
            let (lo, hi) = if labels[bond.a] <= labels[bond.b] {
                (labels[bond.a], labels[bond.b])
            } else {
                (labels[bond.b], labels[bond.a])
            };
            (lo, hi, order_code(bond.order))
        })
        .collect();
    bond_part.sort_unstable();

    let atoms: Vec<String> = atom_part.iter().map(|l| format!("{l:016x}")).collect();
    let bonds: Vec<String> = bond_part
        .iter()
        .map(|(lo, hi, order)| format!("{lo:016x}:{hi:016x}:{order}"))
        .collect();
    format!("{}|{}|{}", mol.atoms.len(), atoms.join(","), bonds.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::kit::StdToolkit;
    use crate::chem::toolkit::Toolkit;

    fn sig(notation: &str) -> String {
        let mol = StdToolkit::new().parse_smiles(notation).unwrap();
        signature_string(&mol)
    }

    #[test]
    fn signature_is_independent_of_atom_ordering() {
        // Same graph entered from either end of the chain.
        assert_eq!(sig("CCO"), sig("OCC"));
        assert_eq!(sig("CC(=O)OC1=CC=CC=C1C(=O)O"), sig("OC(=O)C1=CC=CC=C1OC(C)=O"));
    }

    #[test]
    fn signature_separates_constitutional_isomers() {
        assert_ne!(sig("CCO"), sig("COC"));
        assert_ne!(sig("CC(=O)OC1=CC=CC=C1C(=O)O"), sig("CC(C)(C)NCC(O)C1=CC(O)=C(O)C=C1"));
    }

    #[test]
    fn signature_sees_charges_and_parity() {
        assert_ne!(sig("CC(=O)O"), sig("CC(=O)[O-]"));
        assert_ne!(sig("N[C@@H](C)C(=O)O"), sig("NC(C)C(=O)O"));
    }

    #[test]
    fn signature_ignores_conformers() {
        let toolkit = StdToolkit::new();
        let mut mol = toolkit.parse_smiles("CCO").unwrap();
        let bare = signature_string(&mol);
        mol.add_conformer(vec![nalgebra::Point3::new(1.0, 2.0, 3.0); 3]);
        assert_eq!(signature_string(&mol), bare);
    }

    #[test]
    fn equivalent_atoms_share_canonical_ranks() {
        let mol = StdToolkit::new().parse_smiles("c1ccccc1").unwrap();
        let ranks = canonical_ranks(&mol);
        assert!(ranks.iter().all(|&r| r == ranks[0]));
    }
}
