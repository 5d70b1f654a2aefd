//! V2000 structure-block parsing and serialization.

use super::implicit_hydrogens_for;
use crate::chem::molecule::{Atom, Bond, BondOrder, Molecule, Parity};
use crate::chem::toolkit::ToolkitError;
use nalgebra::Point3;

fn parse_err(line: usize, message: impl Into<String>) -> ToolkitError {
    ToolkitError::Parse {
        line,
        message: message.into(),
    }
}

fn order_from_ctab(value: u32, line: usize) -> Result<BondOrder, ToolkitError> {
    match value {
        1 => Ok(BondOrder::Single),
        2 => Ok(BondOrder::Double),
        3 => Ok(BondOrder::Triple),
        4 => Ok(BondOrder::Aromatic),
        other => Err(parse_err(line, format!("unsupported bond order {other}"))),
    }
}

fn order_to_ctab(order: BondOrder) -> u32 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

fn parity_to_ctab(parity: Option<Parity>) -> u32 {
    match parity {
        None => 0,
        Some(Parity::Clockwise) => 1,
        Some(Parity::Counterclockwise) => 2,
    }
}

/// Parses one structure block (header, counts line, atom and bond blocks,
/// `M  CHG` lines, data items). The block must not contain the `$$$$`
/// record delimiter; splitting records is the codec's job.
pub(super) fn parse_block(block: &str) -> Result<Molecule, ToolkitError> {
    let lines: Vec<&str> = block.lines().collect();
    if lines.len() < 4 {
        return Err(parse_err(
            1,
            "structure block must contain a header and a counts line",
        ));
    }

    let counts_line = lines[3];
    if counts_line.contains("V3000") {
        return Err(ToolkitError::Unsupported(
            "V3000 connection tables".to_string(),
        ));
    }
    let tokens: Vec<&str> = counts_line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(parse_err(4, "counts line must list atom and bond counts"));
    }
    let atom_count: usize = tokens[0]
        .parse()
        .map_err(|_| parse_err(4, "invalid atom count"))?;
    let bond_count: usize = tokens[1]
        .parse()
        .map_err(|_| parse_err(4, "invalid bond count"))?;

    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    if lines.len() < bond_start + bond_count {
        return Err(parse_err(
            lines.len(),
            "block ended before atoms and bonds were fully specified",
        ));
    }

    let mut mol = Molecule::new();
    let name = lines[0].trim();
    if !name.is_empty() {
        mol.name = Some(name.to_string());
    }

    let mut positions = Vec::with_capacity(atom_count);
    for (offset, raw) in lines[atom_start..bond_start].iter().enumerate() {
        let line_no = atom_start + offset + 1;
        // The fixed-column fields below are byte-sliced; V2000 atom lines
        // are ASCII by definition.
        if !raw.is_ascii() {
            return Err(parse_err(line_no, "atom line contains non-ASCII bytes"));
        }
        let padded = format!("{raw:<34}");
        let x: f64 = padded[0..10]
            .trim()
            .parse()
            .map_err(|_| parse_err(line_no, "invalid x coordinate"))?;
        let y: f64 = padded[10..20]
            .trim()
            .parse()
            .map_err(|_| parse_err(line_no, "invalid y coordinate"))?;
        let z: f64 = padded[20..30]
            .trim()
            .parse()
            .map_err(|_| parse_err(line_no, "invalid z coordinate"))?;
        let element = padded[31..34].trim();
        if element.is_empty() {
            return Err(parse_err(line_no, "missing element symbol"));
        }
        let mut atom = Atom::new(element);
        // Fields after the symbol are mass difference, charge (legacy,
        // superseded by M  CHG), and stereo parity.
        let trailing: Vec<&str> = raw.get(34..).unwrap_or("").split_whitespace().collect();
        if let Some(parity) = trailing.get(2).and_then(|t| t.parse::<u32>().ok()) {
            atom.parity = match parity {
                1 => Some(Parity::Clockwise),
                2 => Some(Parity::Counterclockwise),
                _ => None,
            };
        }
        positions.push(Point3::new(x, y, z));
        mol.atoms.push(atom);
    }

    for (offset, raw) in lines[bond_start..bond_start + bond_count].iter().enumerate() {
        let line_no = bond_start + offset + 1;
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(parse_err(line_no, "invalid bond line"));
        }
        let a: usize = tokens[0]
            .parse()
            .map_err(|_| parse_err(line_no, "invalid first atom index"))?;
        let b: usize = tokens[1]
            .parse()
            .map_err(|_| parse_err(line_no, "invalid second atom index"))?;
        let order_value: u32 = tokens[2]
            .parse()
            .map_err(|_| parse_err(line_no, "invalid bond order"))?;
        if a == 0 || b == 0 || a > atom_count || b > atom_count {
            return Err(parse_err(
                line_no,
                "bond references atom outside declared range",
            ));
        }
        let order = order_from_ctab(order_value, line_no)?;
        if order == BondOrder::Aromatic {
            mol.atoms[a - 1].aromatic = true;
            mol.atoms[b - 1].aromatic = true;
        }
        mol.bonds.push(Bond::new(a - 1, b - 1, order));
    }

    parse_trailer(&mut mol, &lines[bond_start + bond_count..], bond_start + bond_count)?;

    // Block-format records always carry exactly one conformer, even when the
    // coordinates are all zero.
    mol.add_conformer(positions);

    for index in 0..mol.atoms.len() {
        mol.atoms[index].implicit_hydrogens = implicit_hydrogens_for(&mol, index);
    }
    Ok(mol)
}

/// Properties block: `M  CHG` charge assignments, `M  END`, and SDF data
/// items (`>  <key>` followed by value lines up to a blank line).
fn parse_trailer(mol: &mut Molecule, lines: &[&str], base: usize) -> Result<(), ToolkitError> {
    let mut cursor = 0;
    while cursor < lines.len() {
        let line = lines[cursor];
        let line_no = base + cursor + 1;
        if line.starts_with("M  CHG") {
            let tokens: Vec<&str> = line[6..].split_whitespace().collect();
            for pair in tokens.iter().skip(1).collect::<Vec<_>>().chunks(2) {
                let [index, charge] = pair else {
                    return Err(parse_err(line_no, "uneven charge assignment list"));
                };
                let index: usize = index
                    .parse()
                    .map_err(|_| parse_err(line_no, "invalid atom index in charge list"))?;
                let charge: i8 = charge
                    .parse()
                    .map_err(|_| parse_err(line_no, "invalid charge value"))?;
                if index == 0 || index > mol.atoms.len() {
                    return Err(parse_err(line_no, "charge references unknown atom"));
                }
                mol.atoms[index - 1].formal_charge = charge;
            }
        } else if let Some(rest) = line.strip_prefix('>') {
            let key = rest
                .find('<')
                .and_then(|open| rest[open + 1..].find('>').map(|close| &rest[open + 1..open + 1 + close]))
                .ok_or_else(|| parse_err(line_no, "data item header without <key>"))?
                .to_string();
            let mut value_lines = Vec::new();
            cursor += 1;
            while cursor < lines.len() && !lines[cursor].trim().is_empty() {
                value_lines.push(lines[cursor]);
                cursor += 1;
            }
            mol.properties.insert(key, value_lines.join("\n"));
        }
        cursor += 1;
    }
    Ok(())
}

/// Serializes a molecule as one structure block ending after its data items.
pub(super) fn write_block(mol: &Molecule) -> Result<String, ToolkitError> {
    use std::fmt::Write;

    // The counts line has three-column fields.
    if mol.atoms.len() > 999 || mol.bonds.len() > 999 {
        return Err(ToolkitError::Unsupported(format!(
            "{} atoms / {} bonds exceed the V2000 limit of 999",
            mol.atoms.len(),
            mol.bonds.len()
        )));
    }

    let mut out = String::new();
    writeln!(out, "{}", mol.name.as_deref().unwrap_or("")).ok();
    writeln!(out, "  molserial").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        mol.atoms.len(),
        mol.bonds.len()
    )
    .ok();

    let zero = Point3::origin();
    let conformer = mol.conformers.first();
    for (index, atom) in mol.atoms.iter().enumerate() {
        let position = conformer
            .and_then(|c| c.positions.get(index))
            .unwrap_or(&zero);
        writeln!(
            out,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0{:>3}  0  0  0  0  0  0  0  0  0",
            position.x,
            position.y,
            position.z,
            atom.element,
            parity_to_ctab(atom.parity)
        )
        .ok();
    }

    for bond in &mol.bonds {
        writeln!(
            out,
            "{:>3}{:>3}{:>3}  0  0  0  0",
            bond.a + 1,
            bond.b + 1,
            order_to_ctab(bond.order)
        )
        .ok();
    }

    let charged: Vec<(usize, i8)> = mol
        .atoms
        .iter()
        .enumerate()
        .filter(|(_, atom)| atom.formal_charge != 0)
        .map(|(index, atom)| (index + 1, atom.formal_charge))
        .collect();
    for chunk in charged.chunks(8) {
        write!(out, "M  CHG{:>3}", chunk.len()).ok();
        for (index, charge) in chunk {
            write!(out, " {index:>3} {charge:>3}").ok();
        }
        writeln!(out).ok();
    }

    writeln!(out, "M  END").ok();
    for (key, value) in &mol.properties {
        writeln!(out, ">  <{key}>").ok();
        writeln!(out, "{value}").ok();
        writeln!(out).ok();
    }
    Ok(out)
}
