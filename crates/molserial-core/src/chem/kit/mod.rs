//! Bundled reference toolkit.
//!
//! A self-contained implementation of the [`Toolkit`] capability set over the
//! crate's own molecule model. It covers the V2000 structure-block grammar,
//! an organic-subset SMILES dialect, and a Morgan-style canonical signature.
//! It is deliberately small: production pipelines are expected to plug a
//! full cheminformatics toolkit into the same trait.

mod sdf;
mod signature;
mod smiles;

use super::molecule::{BondOrder, Molecule};
use super::toolkit::{Signature, Toolkit, ToolkitError};

/// Reference [`Toolkit`] implementation used by the tests and the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdToolkit;

impl StdToolkit {
    pub fn new() -> Self {
        Self
    }
}

impl Toolkit for StdToolkit {
    fn parse_sdf_block(&self, block: &str) -> Result<Molecule, ToolkitError> {
        sdf::parse_block(block)
    }

    fn write_sdf_block(&self, mol: &Molecule) -> Result<String, ToolkitError> {
        sdf::write_block(mol)
    }

    fn parse_smiles(&self, notation: &str) -> Result<Molecule, ToolkitError> {
        smiles::parse(notation)
    }

    fn write_smiles(&self, mol: &Molecule) -> Result<String, ToolkitError> {
        smiles::write(mol)
    }

    fn signature(&self, mol: &Molecule) -> Result<Signature, ToolkitError> {
        Ok(Signature::new(signature::signature_string(mol)))
    }

    fn remove_hydrogens(&self, mol: &Molecule) -> Result<Molecule, ToolkitError> {
        let mut removable = Vec::new();
        for (index, atom) in mol.atoms.iter().enumerate() {
            if !atom.is_hydrogen() || atom.formal_charge != 0 || atom.parity.is_some() {
                continue;
            }
            // Only hydrogens with a single plain bond to a heavy atom fold
            // into an implicit count.
            let neighbors = mol.neighbors(index);
            match neighbors.as_slice() {
                [(other, BondOrder::Single)] if !mol.atoms[*other].is_hydrogen() => {
                    removable.push(index);
                }
                _ => {}
            }
        }
        if removable.is_empty() {
            return Ok(mol.clone());
        }
        let mut out = remove_atoms(mol, &removable);
        for &index in &removable {
            let (heavy, _) = mol.neighbors(index)[0];
            let shifted = heavy - removable.iter().filter(|&&r| r < heavy).count();
            out.atoms[shifted].implicit_hydrogens += 1;
        }
        Ok(out)
    }

    fn strip_salts(&self, mol: &Molecule) -> Result<Molecule, ToolkitError> {
        let fragments = connected_fragments(mol);
        if fragments.len() < 2 {
            return Ok(mol.clone());
        }
        let keep = fragments
            .iter()
            .enumerate()
            .max_by_key(|(index, atoms)| {
                let heavy = atoms
                    .iter()
                    .filter(|&&a| !mol.atoms[a].is_hydrogen())
                    .count();
                // Ties break toward the earliest fragment in file order.
                (heavy, atoms.len(), std::cmp::Reverse(*index))
            })
            .map(|(index, _)| index)
            .ok_or_else(|| ToolkitError::Inconsistency("molecule has no atoms".into()))?;
        let discard: Vec<usize> = fragments
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != keep)
            .flat_map(|(_, atoms)| atoms.iter().copied())
            .collect();
        Ok(remove_atoms(mol, &discard))
    }

    fn strip_stereo(&self, mol: &Molecule) -> Result<Molecule, ToolkitError> {
        let mut out = mol.clone();
        for atom in &mut out.atoms {
            atom.parity = None;
        }
        Ok(out)
    }
}

/// Effective default valence for the common organic elements, shifted by the
/// formal charge. Elements outside the table get no implicit hydrogens.
pub(crate) fn target_valence(element: &str, charge: i8) -> Option<i32> {
    let charge = charge as i32;
    let target = match element {
        "C" => 4 - charge.abs(),
        "N" | "P" => 3 + charge,
        "O" | "S" => 2 + charge,
        "B" => 3 - charge,
        "F" | "Cl" | "Br" | "I" => {
            if charge == 0 {
                1
            } else {
                0
            }
        }
        "H" => 1 - charge.abs(),
        _ => return None,
    };
    Some(target.max(0))
}

/// Valence already consumed by explicit bonds around `index`. Aromatic bonds
/// count one-and-a-half, rounded up over the set.
pub(crate) fn occupied_valence(mol: &Molecule, index: usize) -> i32 {
    let mut plain = 0i32;
    let mut aromatic = 0i32;
    for (_, order) in mol.neighbors(index) {
        match order {
            BondOrder::Single => plain += 1,
            BondOrder::Double => plain += 2,
            BondOrder::Triple => plain += 3,
            BondOrder::Aromatic => aromatic += 1,
        }
    }
    plain + (aromatic * 3 + 1) / 2
}

/// Implicit hydrogen count the valence model assigns to a bare atom.
pub(crate) fn implicit_hydrogens_for(mol: &Molecule, index: usize) -> u8 {
    let atom = &mol.atoms[index];
    match target_valence(&atom.element, atom.formal_charge) {
        Some(target) => (target - occupied_valence(mol, index)).max(0) as u8,
        None => 0,
    }
}

/// Returns a copy of `mol` with the given atoms deleted, bonds re-indexed,
/// and the matching coordinate rows dropped from every conformer.
pub(crate) fn remove_atoms(mol: &Molecule, indices: &[usize]) -> Molecule {
    let doomed: std::collections::HashSet<usize> = indices.iter().copied().collect();
    let mut remap = vec![usize::MAX; mol.atoms.len()];
    let mut next = 0;
    for index in 0..mol.atoms.len() {
        if !doomed.contains(&index) {
            remap[index] = next;
            next += 1;
        }
    }
    let mut out = Molecule {
        name: mol.name.clone(),
        properties: mol.properties.clone(),
        ..Molecule::new()
    };
    for (index, atom) in mol.atoms.iter().enumerate() {
        if !doomed.contains(&index) {
            out.atoms.push(atom.clone());
        }
    }
    for bond in &mol.bonds {
        if !doomed.contains(&bond.a) && !doomed.contains(&bond.b) {
            out.bonds.push(super::molecule::Bond::new(
                remap[bond.a],
                remap[bond.b],
                bond.order,
            ));
        }
    }
    for conformer in &mol.conformers {
        let positions = conformer
            .positions
            .iter()
            .enumerate()
            .filter(|(index, _)| !doomed.contains(index))
            .map(|(_, p)| *p)
            .collect();
        out.conformers
            .push(super::molecule::Conformer::new(conformer.id, positions));
    }
    out
}

/// Connected components of the molecular graph, as lists of atom indices.
pub(crate) fn connected_fragments(mol: &Molecule) -> Vec<Vec<usize>> {
    let mut seen = vec![false; mol.atoms.len()];
    let mut fragments = Vec::new();
    for start in 0..mol.atoms.len() {
        if seen[start] {
            continue;
        }
        let mut fragment = Vec::new();
        let mut stack = vec![start];
        seen[start] = true;
        while let Some(index) = stack.pop() {
            fragment.push(index);
            for (other, _) in mol.neighbors(index) {
                if !seen[other] {
                    seen[other] = true;
                    stack.push(other);
                }
            }
        }
        fragment.sort_unstable();
        fragments.push(fragment);
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::molecule::{Atom, Bond};
    use nalgebra::Point3;

    fn toolkit() -> StdToolkit {
        StdToolkit::new()
    }

    #[test]
    fn target_valence_handles_charges() {
        assert_eq!(target_valence("C", 0), Some(4));
        assert_eq!(target_valence("N", 1), Some(4));
        assert_eq!(target_valence("O", -1), Some(1));
        assert_eq!(target_valence("Na", 1), None);
        assert_eq!(target_valence("Cl", -1), Some(0));
    }

    #[test]
    fn occupied_valence_rounds_aromatic_bonds_up() {
        let benzene = toolkit().parse_smiles("c1ccccc1").unwrap();
        assert_eq!(occupied_valence(&benzene, 0), 3);
        let naphthalene = toolkit().parse_smiles("c1ccc2ccccc2c1").unwrap();
        // Fusion atoms carry three aromatic bonds.
        let fused = (0..naphthalene.atom_count())
            .find(|&i| naphthalene.neighbors(i).len() == 3)
            .unwrap();
        assert_eq!(occupied_valence(&naphthalene, fused), 5);
    }

    #[test]
    fn aromatic_carbon_gets_one_implicit_hydrogen() {
        let mol = toolkit().parse_smiles("c1ccccc1").unwrap();
        for index in 0..mol.atom_count() {
            assert_eq!(mol.atoms[index].implicit_hydrogens, 1, "atom {index}");
        }
    }

    #[test]
    fn remove_hydrogens_folds_into_implicit_counts() {
        // Methanol with both hydroxyl and methyl hydrogens explicit.
        let mut mol = Molecule::new();
        mol.atoms.push(Atom::new("C"));
        mol.atoms.push(Atom::new("O"));
        mol.bonds.push(Bond::new(0, 1, BondOrder::Single));
        for heavy in [0usize, 0, 0, 1] {
            let h = mol.atoms.len();
            mol.atoms.push(Atom::new("H"));
            mol.bonds.push(Bond::new(heavy, h, BondOrder::Single));
        }
        mol.add_conformer(vec![Point3::origin(); 6]);

        let stripped = toolkit().remove_hydrogens(&mol).unwrap();
        assert_eq!(stripped.atom_count(), 2);
        assert_eq!(stripped.atoms[0].implicit_hydrogens, 3);
        assert_eq!(stripped.atoms[1].implicit_hydrogens, 1);
        assert_eq!(stripped.conformers[0].positions.len(), 2);
    }

    #[test]
    fn remove_hydrogens_is_a_no_op_without_explicit_hydrogens() {
        let mol = toolkit().parse_smiles("CCO").unwrap();
        let stripped = toolkit().remove_hydrogens(&mol).unwrap();
        assert_eq!(stripped, mol);
    }

    #[test]
    fn strip_salts_keeps_largest_fragment() {
        let mol = toolkit().parse_smiles("CC(=O)OC1=CC=CC=C1C(=O)[O-].[Na+]").unwrap();
        let stripped = toolkit().strip_salts(&mol).unwrap();
        assert!(stripped.atom_count() < mol.atom_count());
        assert!(stripped.atoms.iter().all(|a| a.element != "Na"));
    }

    #[test]
    fn strip_salts_without_fragments_returns_molecule_unchanged() {
        let mol = toolkit().parse_smiles("CCO").unwrap();
        assert_eq!(toolkit().strip_salts(&mol).unwrap(), mol);
    }

    #[test]
    fn strip_stereo_clears_parities() {
        let mol = toolkit()
            .parse_smiles("CC(C)(C)NC[C@@H](C1=CC(=C(C=C1)O)CO)O")
            .unwrap();
        assert!(mol.atoms.iter().any(|a| a.parity.is_some()));
        let stripped = toolkit().strip_stereo(&mol).unwrap();
        assert!(stripped.atoms.iter().all(|a| a.parity.is_none()));
    }

    #[test]
    fn connected_fragments_splits_on_dots() {
        let mol = toolkit().parse_smiles("CCO.O.[Na+]").unwrap();
        let fragments = connected_fragments(&mol);
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].len(), 3);
    }
}
