use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bond multiplicity between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

/// Tetrahedral parity marker carried through from the source record.
///
/// `Clockwise` corresponds to MDL parity 1 and SMILES `@@`;
/// `Counterclockwise` to MDL parity 2 and SMILES `@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    Clockwise,
    Counterclockwise,
}

/// One atom of a molecular graph.
///
/// Hydrogens removed from the explicit graph are folded into
/// `implicit_hydrogens` so that the graph keeps the same canonical identity
/// whether or not the source record spelled them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Element symbol (e.g. "C", "Cl", "Na").
    pub element: String,
    pub formal_charge: i8,
    pub implicit_hydrogens: u8,
    pub aromatic: bool,
    pub parity: Option<Parity>,
}

impl Atom {
    pub fn new(element: &str) -> Self {
        Self {
            element: element.to_string(),
            formal_charge: 0,
            implicit_hydrogens: 0,
            aromatic: false,
            parity: None,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }
}

/// An edge of the molecular graph, referring to atoms by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn new(a: usize, b: usize, order: BondOrder) -> Self {
        Self { a, b, order }
    }
}

/// One 3D coordinate assignment for a molecule's fixed atom ordering.
///
/// Positions are aligned positionally with the owning molecule's atom list;
/// the `id` is unique within that molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    pub id: usize,
    pub positions: Vec<Point3<f64>>,
}

impl Conformer {
    pub fn new(id: usize, positions: Vec<Point3<f64>>) -> Self {
        Self { id, positions }
    }
}

/// A chemical graph plus zero or more conformers, an optional name, and
/// auxiliary string properties.
///
/// A molecule with zero conformers represents a topology-only structure, as
/// produced from linear notation without embedded coordinates. All conformers
/// attached to one molecule share the same atom ordering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    pub name: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub conformers: Vec<Conformer>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.is_hydrogen()).count()
    }

    /// Indices and bond orders of the atoms bonded to `index`.
    pub fn neighbors(&self, index: usize) -> Vec<(usize, BondOrder)> {
        let mut out = Vec::new();
        for bond in &self.bonds {
            if bond.a == index {
                out.push((bond.b, bond.order));
            } else if bond.b == index {
                out.push((bond.a, bond.order));
            }
        }
        out
    }

    /// Appends a conformer with the next free dense identifier and returns
    /// that identifier.
    pub fn add_conformer(&mut self, positions: Vec<Point3<f64>>) -> usize {
        let id = self.conformers.len();
        self.conformers.push(Conformer::new(id, positions));
        id
    }

    /// Renumbers conformer identifiers to a dense zero-based sequence in
    /// their current order.
    pub fn renumber_conformers(&mut self) {
        for (id, conformer) in self.conformers.iter_mut().enumerate() {
            conformer.id = id;
        }
    }
}
