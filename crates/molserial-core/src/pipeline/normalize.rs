use crate::chem::molecule::Molecule;
use crate::chem::toolkit::Toolkit;
use crate::error::{Result, SerialError};

/// Read-time normalization policy.
///
/// Both stages default to on: decoded molecules come out desalted and with
/// explicit hydrogens folded away unless the caller opts out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub remove_hydrogens: bool,
    pub remove_salts: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            remove_hydrogens: true,
            remove_salts: true,
        }
    }
}

/// Applies the hydrogen and salt policies to decoded molecules.
///
/// Normalization never adds or removes conformers; the toolkit calls are
/// atomic over graph plus conformers. Salt stripping runs first so that the
/// coalescer's equivalence test always sees the desalted graph.
pub struct Normalizer<'a, T> {
    toolkit: &'a T,
    options: NormalizeOptions,
}

impl<'a, T: Toolkit> Normalizer<'a, T> {
    pub fn new(toolkit: &'a T, options: NormalizeOptions) -> Self {
        Self { toolkit, options }
    }

    /// Returns the normalized copy of `mol`. A toolkit failure aborts the
    /// record rather than letting it pass through unnormalized.
    pub fn clean(&self, mol: &Molecule) -> Result<Molecule> {
        let mut out = mol.clone();
        if self.options.remove_salts {
            out = self
                .toolkit
                .strip_salts(&out)
                .map_err(|source| SerialError::Normalization { source })?;
        }
        if self.options.remove_hydrogens {
            out = self
                .toolkit
                .remove_hydrogens(&out)
                .map_err(|source| SerialError::Normalization { source })?;
        }
        Ok(out)
    }
}
