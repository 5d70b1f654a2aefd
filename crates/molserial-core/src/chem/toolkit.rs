use super::molecule::Molecule;
use thiserror::Error;

/// Errors raised by a chemistry toolkit implementation.
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("inconsistent molecule: {0}")]
    Inconsistency(String),
}

/// Canonical, coordinate-independent identity of a molecular graph.
///
/// Used only for equivalence testing; never persisted. Two molecules are the
/// same species exactly when their signatures are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Capability set the pipeline requires from a chemistry toolkit.
///
/// The pipeline orchestrates these calls and never interprets chemical
/// structure itself. Implementations must keep graph edits atomic over
/// graph plus conformers: removing an atom drops its coordinate row from
/// every conformer in the same call.
pub trait Toolkit {
    /// Parses one V2000-style structure block (without the `$$$$` delimiter)
    /// into a molecule carrying exactly one conformer.
    fn parse_sdf_block(&self, block: &str) -> Result<Molecule, ToolkitError>;

    /// Serializes a molecule as one structure block, using its first
    /// conformer's coordinates or zeros if it has none. The returned text
    /// ends after the data items; the record delimiter is the codec's job.
    fn write_sdf_block(&self, mol: &Molecule) -> Result<String, ToolkitError>;

    /// Parses one line of linear notation into a molecule with zero
    /// conformers.
    fn parse_smiles(&self, notation: &str) -> Result<Molecule, ToolkitError>;

    /// Writes deterministic linear notation for a molecule's graph.
    fn write_smiles(&self, mol: &Molecule) -> Result<String, ToolkitError>;

    /// Computes the canonical signature of the molecular graph, ignoring
    /// conformers and auxiliary properties but not explicit hydrogens.
    fn signature(&self, mol: &Molecule) -> Result<Signature, ToolkitError>;

    /// Removes explicit hydrogen atoms, folding them into the implicit
    /// hydrogen count of their neighbors.
    fn remove_hydrogens(&self, mol: &Molecule) -> Result<Molecule, ToolkitError>;

    /// Discards disconnected fragments other than the largest one
    /// (e.g. counter-ions).
    fn strip_salts(&self, mol: &Molecule) -> Result<Molecule, ToolkitError>;

    /// Clears all stereochemistry descriptors.
    fn strip_stereo(&self, mol: &Molecule) -> Result<Molecule, ToolkitError>;
}
