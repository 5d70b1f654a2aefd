//! Organic-subset SMILES parsing and deterministic writing.
//!
//! The dialect covers bare organic-subset atoms (aromatic lowercase
//! included), bracket atoms with charge, hydrogen count, and tetrahedral
//! markers, explicit `- = # :` bonds, branches, ring closures (`%nn`
//! included), and dot-separated fragments. Directional bonds are flattened
//! to single bonds and isotope labels are ignored.
//!
//! Output is produced by a canonical-rank DFS with ring-closure digits
//! reused from a small heap, so the same graph always serializes to the
//! same string.

use super::{connected_fragments, implicit_hydrogens_for, signature};
use crate::chem::molecule::{Atom, Bond, BondOrder, Molecule, Parity};
use crate::chem::toolkit::ToolkitError;
use std::collections::{HashMap, HashSet};

fn syntax(pos: usize, message: impl Into<String>) -> ToolkitError {
    ToolkitError::Parse {
        line: 1,
        message: format!("{} (column {})", message.into(), pos + 1),
    }
}

const ORGANIC_SUBSET: [&str; 10] = ["B", "C", "N", "O", "P", "S", "F", "Cl", "Br", "I"];

pub(super) fn parse(notation: &str) -> Result<Molecule, ToolkitError> {
    Parser::new(notation).run()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    mol: Molecule,
    from_bracket: Vec<bool>,
    prev: Option<usize>,
    pending: Option<BondOrder>,
    branches: Vec<usize>,
    rings: HashMap<u32, (usize, Option<BondOrder>)>,
}

impl<'a> Parser<'a> {
    fn new(notation: &'a str) -> Self {
        Self {
            bytes: notation.trim().as_bytes(),
            pos: 0,
            mol: Molecule::new(),
            from_bracket: Vec::new(),
            prev: None,
            pending: None,
            branches: Vec::new(),
            rings: HashMap::new(),
        }
    }

    fn run(mut self) -> Result<Molecule, ToolkitError> {
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            match byte {
                b'(' => {
                    let prev = self
                        .prev
                        .ok_or_else(|| syntax(self.pos, "branch before any atom"))?;
                    self.branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    let anchor = self
                        .branches
                        .pop()
                        .ok_or_else(|| syntax(self.pos, "unbalanced closing parenthesis"))?;
                    self.prev = Some(anchor);
                    self.pos += 1;
                }
                b'-' | b'/' | b'\\' => {
                    self.pending = Some(BondOrder::Single);
                    self.pos += 1;
                }
                b'=' => {
                    self.pending = Some(BondOrder::Double);
                    self.pos += 1;
                }
                b'#' => {
                    self.pending = Some(BondOrder::Triple);
                    self.pos += 1;
                }
                b':' => {
                    self.pending = Some(BondOrder::Aromatic);
                    self.pos += 1;
                }
                b'.' => {
                    if self.pending.is_some() {
                        return Err(syntax(self.pos, "bond symbol before fragment separator"));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' => {
                    let digit = (byte - b'0') as u32;
                    self.pos += 1;
                    self.ring_closure(digit)?;
                }
                b'%' => {
                    if self.pos + 2 >= self.bytes.len()
                        || !self.bytes[self.pos + 1].is_ascii_digit()
                        || !self.bytes[self.pos + 2].is_ascii_digit()
                    {
                        return Err(syntax(self.pos, "'%' must be followed by two digits"));
                    }
                    let digit = ((self.bytes[self.pos + 1] - b'0') as u32) * 10
                        + (self.bytes[self.pos + 2] - b'0') as u32;
                    self.pos += 3;
                    self.ring_closure(digit)?;
                }
                b'[' => {
                    self.pos += 1;
                    let (atom, hydrogens) = self.bracket_atom()?;
                    let index = self.attach(atom, true);
                    self.mol.atoms[index].implicit_hydrogens = hydrogens;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom, false);
                }
            }
        }
        if !self.branches.is_empty() {
            return Err(syntax(self.pos, "unbalanced opening parenthesis"));
        }
        if let Some(digit) = self.rings.keys().next() {
            return Err(syntax(self.pos, format!("unclosed ring bond {digit}")));
        }
        if self.pending.is_some() {
            return Err(syntax(self.pos, "dangling bond symbol"));
        }

        for index in 0..self.mol.atoms.len() {
            if !self.from_bracket[index] {
                self.mol.atoms[index].implicit_hydrogens =
                    implicit_hydrogens_for(&self.mol, index);
            }
        }
        Ok(self.mol)
    }

    fn attach(&mut self, atom: Atom, from_bracket: bool) -> usize {
        let index = self.mol.atoms.len();
        self.mol.atoms.push(atom);
        self.from_bracket.push(from_bracket);
        if let Some(prev) = self.prev {
            let order = self.pending.take().unwrap_or_else(|| {
                if self.mol.atoms[prev].aromatic && self.mol.atoms[index].aromatic {
                    BondOrder::Aromatic
                } else {
                    BondOrder::Single
                }
            });
            self.mol.bonds.push(Bond::new(prev, index, order));
        }
        self.pending = None;
        self.prev = Some(index);
        index
    }

    fn ring_closure(&mut self, digit: u32) -> Result<(), ToolkitError> {
        let current = self
            .prev
            .ok_or_else(|| syntax(self.pos, "ring bond before any atom"))?;
        match self.rings.remove(&digit) {
            Some((other, opened_order)) => {
                if other == current {
                    return Err(syntax(self.pos, "ring bond closes on its own atom"));
                }
                let order = match (opened_order, self.pending.take()) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(syntax(self.pos, "conflicting ring bond orders"));
                    }
                    (Some(order), _) | (None, Some(order)) => order,
                    (None, None) => {
                        if self.mol.atoms[other].aromatic && self.mol.atoms[current].aromatic {
                            BondOrder::Aromatic
                        } else {
                            BondOrder::Single
                        }
                    }
                };
                self.mol.bonds.push(Bond::new(other, current, order));
            }
            None => {
                self.rings.insert(digit, (current, self.pending.take()));
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, ToolkitError> {
        let rest = &self.bytes[self.pos..];
        // Two-letter symbols first so 'Cl' never reads as carbon.
        for symbol in ["Cl", "Br"] {
            if rest.starts_with(symbol.as_bytes()) {
                self.pos += 2;
                return Ok(Atom::new(symbol));
            }
        }
        let byte = rest[0];
        match byte {
            b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I' => {
                self.pos += 1;
                Ok(Atom::new(std::str::from_utf8(&[byte]).unwrap()))
            }
            b'b' | b'c' | b'n' | b'o' | b'p' | b's' => {
                self.pos += 1;
                let symbol = (byte as char).to_ascii_uppercase().to_string();
                let mut atom = Atom::new(&symbol);
                atom.aromatic = true;
                Ok(atom)
            }
            other => Err(syntax(self.pos, format!("unexpected character '{}'", other as char))),
        }
    }

    /// Parses the inside of a bracket atom, consuming the closing `]`.
    /// Returns the atom and its explicit hydrogen count.
    fn bracket_atom(&mut self) -> Result<(Atom, u8), ToolkitError> {
        // Isotope labels are accepted and ignored.
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let rest = &self.bytes[self.pos..];
        if rest.is_empty() {
            return Err(syntax(self.pos, "unterminated bracket atom"));
        }

        let mut atom;
        if rest[0].is_ascii_uppercase() {
            let mut len = 1;
            if rest.len() > 1 && rest[1].is_ascii_lowercase() {
                len = 2;
            }
            let symbol = std::str::from_utf8(&rest[..len]).unwrap();
            atom = Atom::new(symbol);
            self.pos += len;
        } else if matches!(rest[0], b'b' | b'c' | b'n' | b'o' | b'p' | b's') {
            let symbol = (rest[0] as char).to_ascii_uppercase().to_string();
            atom = Atom::new(&symbol);
            atom.aromatic = true;
            self.pos += 1;
        } else {
            return Err(syntax(self.pos, "invalid element symbol in bracket atom"));
        }

        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'@' {
            self.pos += 1;
            if self.pos < self.bytes.len() && self.bytes[self.pos] == b'@' {
                atom.parity = Some(Parity::Clockwise);
                self.pos += 1;
            } else {
                atom.parity = Some(Parity::Counterclockwise);
            }
        }

        let mut hydrogens = 0u8;
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'H' {
            self.pos += 1;
            hydrogens = 1;
            if self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                hydrogens = self.bytes[self.pos] - b'0';
                self.pos += 1;
            }
        }

        if self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b'+' | b'-') {
            let positive = self.bytes[self.pos] == b'+';
            let sign_byte = self.bytes[self.pos];
            self.pos += 1;
            let mut magnitude: i8 = 1;
            if self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                magnitude = (self.bytes[self.pos] - b'0') as i8;
                self.pos += 1;
            } else {
                while self.pos < self.bytes.len() && self.bytes[self.pos] == sign_byte {
                    magnitude += 1;
                    self.pos += 1;
                }
            }
            atom.formal_charge = if positive { magnitude } else { -magnitude };
        }

        if self.pos >= self.bytes.len() || self.bytes[self.pos] != b']' {
            return Err(syntax(self.pos, "unterminated bracket atom"));
        }
        self.pos += 1;
        Ok((atom, hydrogens))
    }
}

pub(super) fn write(mol: &Molecule) -> Result<String, ToolkitError> {
    for bond in &mol.bonds {
        if bond.a >= mol.atoms.len() || bond.b >= mol.atoms.len() {
            return Err(ToolkitError::Inconsistency(format!(
                "bond {}-{} references missing atom",
                bond.a, bond.b
            )));
        }
    }
    let ranks = signature::canonical_ranks(mol);
    let mut writer = Writer {
        mol,
        ranks: &ranks,
        visited: vec![false; mol.atoms.len()],
        ring_bonds: HashSet::new(),
        open_digits: HashMap::new(),
        digits: DigitHeap::new(),
        out: String::new(),
    };

    let mut first = true;
    for fragment in connected_fragments(mol) {
        let root = fragment
            .iter()
            .copied()
            .min_by_key(|&index| (ranks[index], index))
            .expect("fragments are never empty");
        if !first {
            writer.out.push('.');
        }
        first = false;
        let mut seen = vec![false; mol.atoms.len()];
        writer.find_rings(root, None, &mut seen);
        writer.emit(root, None);
    }
    Ok(writer.out)
}

/// Allocator for ring-closure digits; freed digits are reused smallest-first.
struct DigitHeap {
    in_use: Vec<u32>,
}

impl DigitHeap {
    fn new() -> Self {
        Self { in_use: Vec::new() }
    }

    fn acquire(&mut self) -> u32 {
        let mut digit = 1;
        while self.in_use.contains(&digit) {
            digit += 1;
        }
        self.in_use.push(digit);
        digit
    }

    fn release(&mut self, digit: u32) {
        self.in_use.retain(|&d| d != digit);
    }
}

struct Writer<'a> {
    mol: &'a Molecule,
    ranks: &'a [usize],
    visited: Vec<bool>,
    ring_bonds: HashSet<(usize, usize)>,
    open_digits: HashMap<(usize, usize), u32>,
    digits: DigitHeap,
    out: String,
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl Writer<'_> {
    fn sorted_neighbors(&self, index: usize) -> Vec<(usize, BondOrder)> {
        let mut neighbors = self.mol.neighbors(index);
        neighbors.sort_by_key(|&(other, _)| (self.ranks[other], other));
        neighbors
    }

    /// Spanning-tree pre-pass: every non-tree edge becomes a ring closure.
    fn find_rings(&mut self, index: usize, parent: Option<usize>, seen: &mut Vec<bool>) {
        seen[index] = true;
        for (other, _) in self.sorted_neighbors(index) {
            if Some(other) == parent {
                continue;
            }
            if seen[other] {
                self.ring_bonds.insert(edge_key(index, other));
            } else {
                self.find_rings(other, Some(index), seen);
            }
        }
    }

    fn emit(&mut self, index: usize, parent: Option<usize>) {
        self.visited[index] = true;
        let token = self.atom_token(index);
        self.out.push_str(&token);

        for (other, order) in self.sorted_neighbors(index) {
            let key = edge_key(index, other);
            if !self.ring_bonds.contains(&key) {
                continue;
            }
            match self.open_digits.remove(&key) {
                Some(digit) => {
                    self.push_bond_symbol(index, other, order);
                    self.push_digit(digit);
                    self.digits.release(digit);
                }
                None => {
                    let digit = self.digits.acquire();
                    self.open_digits.insert(key, digit);
                    self.push_bond_symbol(index, other, order);
                    self.push_digit(digit);
                }
            }
        }

        let children: Vec<(usize, BondOrder)> = self
            .sorted_neighbors(index)
            .into_iter()
            .filter(|&(other, _)| {
                Some(other) != parent
                    && !self.ring_bonds.contains(&edge_key(index, other))
                    && !self.visited[other]
            })
            .collect();
        let count = children.len();
        for (position, (other, order)) in children.into_iter().enumerate() {
            let last = position + 1 == count;
            if !last {
                self.out.push('(');
            }
            self.push_bond_symbol(index, other, order);
            self.emit(other, Some(index));
            if !last {
                self.out.push(')');
            }
        }
    }

    fn push_bond_symbol(&mut self, a: usize, b: usize, order: BondOrder) {
        let both_aromatic = self.mol.atoms[a].aromatic && self.mol.atoms[b].aromatic;
        match order {
            BondOrder::Single => {
                if both_aromatic {
                    self.out.push('-');
                }
            }
            BondOrder::Double => self.out.push('='),
            BondOrder::Triple => self.out.push('#'),
            BondOrder::Aromatic => {
                if !both_aromatic {
                    self.out.push(':');
                }
            }
        }
    }

    fn push_digit(&mut self, digit: u32) {
        if digit < 10 {
            self.out.push((b'0' + digit as u8) as char);
        } else {
            self.out.push_str(&format!("%{digit:02}"));
        }
    }

    fn atom_token(&self, index: usize) -> String {
        let atom = &self.mol.atoms[index];
        let organic = ORGANIC_SUBSET.contains(&atom.element.as_str());
        let bare_ok = organic
            && atom.formal_charge == 0
            && atom.parity.is_none()
            && atom.implicit_hydrogens == implicit_hydrogens_for(self.mol, index);
        let symbol = if atom.aromatic {
            atom.element.to_ascii_lowercase()
        } else {
            atom.element.clone()
        };
        if bare_ok {
            return symbol;
        }

        let mut token = String::from("[");
        token.push_str(&symbol);
        match atom.parity {
            Some(Parity::Clockwise) => token.push_str("@@"),
            Some(Parity::Counterclockwise) => token.push('@'),
            None => {}
        }
        match atom.implicit_hydrogens {
            0 => {}
            1 => token.push('H'),
            n => token.push_str(&format!("H{n}")),
        }
        match atom.formal_charge {
            0 => {}
            1 => token.push('+'),
            -1 => token.push('-'),
            n if n > 0 => token.push_str(&format!("+{n}")),
            n => token.push_str(&format!("-{}", -n)),
        }
        token.push(']');
        token
    }
}
