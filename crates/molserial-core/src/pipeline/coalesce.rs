use crate::chem::molecule::Molecule;
use crate::chem::toolkit::{Signature, Toolkit};
use crate::error::{Result, SerialError};

/// Tests whether two molecules are the same chemical species.
///
/// This is exactly the equivalence the coalescer applies between adjacent
/// records: canonical signatures computed on the coordinate-independent
/// graph, so conformers and auxiliary properties are ignored but explicit
/// hydrogens are not.
pub fn are_same_molecule<T: Toolkit>(toolkit: &T, a: &Molecule, b: &Molecule) -> Result<bool> {
    Ok(toolkit.signature(a)? == toolkit.signature(b)?)
}

/// Merges consecutive, structurally-equivalent molecules into one molecule
/// carrying all of their conformers in input order.
///
/// Grouping is strictly adjacency-based: the same species appearing again
/// later in the stream starts a fresh group. A single pending group is
/// buffered; memory grows only with the longest equivalent run.
pub struct ConformerCoalescer<'a, T, I> {
    toolkit: &'a T,
    input: I,
    pending: Option<(Molecule, Signature)>,
    queued_error: Option<SerialError>,
}

impl<'a, T, I> ConformerCoalescer<'a, T, I>
where
    T: Toolkit,
    I: Iterator<Item = Result<Molecule>>,
{
    pub fn new(toolkit: &'a T, input: I) -> Self {
        Self {
            toolkit,
            input,
            pending: None,
            queued_error: None,
        }
    }

    fn start_group(&mut self, mut mol: Molecule, signature: Signature) {
        mol.renumber_conformers();
        self.pending = Some((mol, signature));
    }

    /// An error terminates the current group: the finished group is emitted
    /// first and the error is delivered on the following pull, keeping
    /// stream order. Records after the error never join the old group.
    fn yield_error(&mut self, error: SerialError) -> Result<Molecule> {
        match self.pending.take() {
            Some((group, _)) => {
                self.queued_error = Some(error);
                Ok(group)
            }
            None => Err(error),
        }
    }
}

impl<T, I> Iterator for ConformerCoalescer<'_, T, I>
where
    T: Toolkit,
    I: Iterator<Item = Result<Molecule>>,
{
    type Item = Result<Molecule>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.queued_error.take() {
            return Some(Err(error));
        }
        loop {
            let mol = match self.input.next() {
                None => return self.pending.take().map(|(mol, _)| Ok(mol)),
                Some(Err(e)) => return Some(self.yield_error(e)),
                Some(Ok(mol)) => mol,
            };
            let signature = match self.toolkit.signature(&mol) {
                Ok(signature) => signature,
                Err(e) => return Some(self.yield_error(e.into())),
            };
            match self.pending.take() {
                None => self.start_group(mol, signature),
                Some((mut group, group_signature)) => {
                    if group_signature == signature {
                        // Same species: keep the group's graph, adopt only
                        // the newcomer's conformers.
                        for conformer in mol.conformers {
                            group.add_conformer(conformer.positions);
                        }
                        self.pending = Some((group, group_signature));
                    } else {
                        self.start_group(mol, signature);
                        return Some(Ok(group));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::kit::StdToolkit;
    use nalgebra::Point3;

    fn with_conformer(notation: &str, shift: f64) -> Molecule {
        let toolkit = StdToolkit::new();
        let mut mol = toolkit.parse_smiles(notation).unwrap();
        let positions = (0..mol.atom_count())
            .map(|i| Point3::new(i as f64 + shift, 0.0, 0.0))
            .collect();
        mol.add_conformer(positions);
        mol
    }

    fn coalesce(input: Vec<Result<Molecule>>) -> Vec<Result<Molecule>> {
        let toolkit = StdToolkit::new();
        ConformerCoalescer::new(&toolkit, input.into_iter()).collect()
    }

    #[test]
    fn equivalent_run_merges_into_one_multiconformer_molecule() {
        let input = (0..3)
            .map(|i| Ok(with_conformer("CC(=O)OC1=CC=CC=C1C(=O)O", i as f64)))
            .collect();
        let out = coalesce(input);
        assert_eq!(out.len(), 1);
        let merged = out.into_iter().next().unwrap().unwrap();
        assert_eq!(merged.conformers.len(), 3);
        let ids: Vec<usize> = merged.conformers.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        // Conformers keep input order.
        assert_eq!(merged.conformers[2].positions[0], Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn distinct_neighbors_do_not_merge() {
        let input = vec![
            Ok(with_conformer("CCO", 0.0)),
            Ok(with_conformer("CC(=O)OC1=CC=CC=C1C(=O)O", 0.0)),
        ];
        let out = coalesce(input);
        assert_eq!(out.len(), 2);
        for mol in out {
            assert_eq!(mol.unwrap().conformers.len(), 1);
        }
    }

    #[test]
    fn grouping_is_adjacency_based_not_global() {
        let input = vec![
            Ok(with_conformer("CCO", 0.0)),
            Ok(with_conformer("CCC", 0.0)),
            Ok(with_conformer("CCO", 1.0)),
        ];
        let out = coalesce(input);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn topology_only_equivalents_merge_without_conformers() {
        let toolkit = StdToolkit::new();
        let input = vec![
            Ok(toolkit.parse_smiles("CCO").unwrap()),
            Ok(toolkit.parse_smiles("OCC").unwrap()),
        ];
        let out = coalesce(input);
        assert_eq!(out.len(), 1);
        assert!(out[0].as_ref().unwrap().conformers.is_empty());
    }

    #[test]
    fn upstream_errors_pass_through_in_stream_order() {
        let toolkit = StdToolkit::new();
        let bad = toolkit.parse_smiles("not&smiles").unwrap_err();
        let input = vec![Ok(with_conformer("CCO", 0.0)), Err(bad.into())];
        let out = coalesce(input);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }

    #[test]
    fn upstream_error_terminates_the_pending_group() {
        // Equivalent records separated by an error must not merge.
        let toolkit = StdToolkit::new();
        let bad = toolkit.parse_smiles("not&smiles").unwrap_err();
        let input = vec![
            Ok(with_conformer("CCO", 0.0)),
            Err(bad.into()),
            Ok(with_conformer("CCO", 1.0)),
        ];
        let out = coalesce(input);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().conformers.len(), 1);
        assert!(out[1].is_err());
        assert_eq!(out[2].as_ref().unwrap().conformers.len(), 1);
    }

    #[test]
    fn are_same_molecule_matches_coalescer_equivalence() {
        let toolkit = StdToolkit::new();
        let a = with_conformer("CC(=O)OC1=CC=CC=C1C(=O)O", 0.0);
        let b = with_conformer("CC(=O)OC1=CC=CC=C1C(=O)O", 5.0);
        let c = with_conformer("CCO", 0.0);
        assert!(are_same_molecule(&toolkit, &a, &b).unwrap());
        assert!(!are_same_molecule(&toolkit, &a, &c).unwrap());
    }
}
