//! Per-format record codecs.
//!
//! A [`Decoder`] is a cursor over one open byte stream, chosen once at open
//! time; it splits the stream into raw records and delegates the chemical
//! parsing to the toolkit. The [`Encoder`] is its write-side counterpart.
//! The archived-list variant is the one deliberate asymmetry: the whole
//! sequence is materialized when the stream is opened and, on the write
//! side, buffered until `finish`.

use super::format::MolFormat;
use super::transport::ByteSink;
use crate::chem::molecule::Molecule;
use crate::chem::toolkit::Toolkit;
use crate::error::{Result, SerialError};
use std::io::{BufRead, Write};

const SDF_DELIMITER: &str = "$$$$";

/// Streaming decode cursor for one byte stream.
pub enum Decoder {
    Sdf(BlockDecoder),
    Smiles(LineDecoder),
    Archive(ArchiveDecoder),
}

impl Decoder {
    /// Binds a decoder for `format` to an open byte stream. The archive
    /// variant reads the entire stream eagerly here.
    pub fn open(format: MolFormat, stream: Box<dyn BufRead>) -> Result<Self> {
        Ok(match format {
            MolFormat::Sdf => Decoder::Sdf(BlockDecoder::new(stream)),
            MolFormat::Smiles => Decoder::Smiles(LineDecoder::new(stream)),
            MolFormat::Archive => Decoder::Archive(ArchiveDecoder::open(stream)?),
        })
    }

    /// Decodes the next record, or `None` at end of stream.
    pub fn next_mol<T: Toolkit>(&mut self, toolkit: &T) -> Option<Result<Molecule>> {
        match self {
            Decoder::Sdf(decoder) => decoder.next_mol(toolkit),
            Decoder::Smiles(decoder) => decoder.next_mol(toolkit),
            Decoder::Archive(decoder) => decoder.next_mol(),
        }
    }
}

/// Splits the stream on literal `$$$$` delimiter lines; each block between
/// delimiters is one raw record.
pub struct BlockDecoder {
    stream: Box<dyn BufRead>,
    index: usize,
}

impl BlockDecoder {
    fn new(stream: Box<dyn BufRead>) -> Self {
        Self { stream, index: 0 }
    }

    fn next_mol<T: Toolkit>(&mut self, toolkit: &T) -> Option<Result<Molecule>> {
        let mut block = String::new();
        loop {
            let mut line = String::new();
            match self.stream.read_line(&mut line) {
                Err(e) => return Some(Err(SerialError::Transport(e))),
                Ok(0) => {
                    if block.trim().is_empty() {
                        return None;
                    }
                    break;
                }
                Ok(_) => {
                    if line.trim_end() == SDF_DELIMITER {
                        // Stray delimiters before any content are skipped.
                        if block.trim().is_empty() {
                            block.clear();
                            continue;
                        }
                        break;
                    }
                    block.push_str(&line);
                }
            }
        }
        self.index += 1;
        let index = self.index;
        Some(
            toolkit
                .parse_sdf_block(&block)
                .map_err(|source| SerialError::MalformedRecord { index, source }),
        )
    }
}

/// One molecule per non-empty line: `<notation>` or `<notation>\t<name>`.
pub struct LineDecoder {
    stream: Box<dyn BufRead>,
    index: usize,
}

impl LineDecoder {
    fn new(stream: Box<dyn BufRead>) -> Self {
        Self { stream, index: 0 }
    }

    fn next_mol<T: Toolkit>(&mut self, toolkit: &T) -> Option<Result<Molecule>> {
        loop {
            let mut line = String::new();
            match self.stream.read_line(&mut line) {
                Err(e) => return Some(Err(SerialError::Transport(e))),
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']);
                    if trimmed.trim().is_empty() {
                        continue;
                    }
                    self.index += 1;
                    let index = self.index;
                    let (notation, name) = match trimmed.split_once('\t') {
                        Some((notation, name)) => (notation, Some(name.trim())),
                        None => (trimmed, None),
                    };
                    return Some(
                        toolkit
                            .parse_smiles(notation)
                            .map(|mut mol| {
                                if let Some(name) = name.filter(|n| !n.is_empty()) {
                                    mol.name = Some(name.to_string());
                                }
                                mol
                            })
                            .map_err(|source| SerialError::MalformedRecord { index, source }),
                    );
                }
            }
        }
    }
}

/// Whole-stream archive of molecules, materialized at open time.
pub struct ArchiveDecoder {
    mols: std::vec::IntoIter<Molecule>,
}

impl ArchiveDecoder {
    fn open(stream: Box<dyn BufRead>) -> Result<Self> {
        let mols: Vec<Molecule> =
            bincode::deserialize_from(stream).map_err(|e| SerialError::Archive(e.to_string()))?;
        Ok(Self {
            mols: mols.into_iter(),
        })
    }

    fn next_mol(&mut self) -> Option<Result<Molecule>> {
        self.mols.next().map(Ok)
    }
}

/// Write-side codec state for one open sink.
pub enum Encoder {
    Sdf,
    Smiles,
    /// Writes are buffered; the archive is emitted once by [`Encoder::finish`].
    Archive { pending: Vec<Molecule> },
}

impl Encoder {
    pub fn new(format: MolFormat) -> Self {
        match format {
            MolFormat::Sdf => Encoder::Sdf,
            MolFormat::Smiles => Encoder::Smiles,
            MolFormat::Archive => Encoder::Archive {
                pending: Vec::new(),
            },
        }
    }

    /// Encodes one molecule into the sink (or the archive buffer).
    pub fn encode<T: Toolkit>(
        &mut self,
        toolkit: &T,
        mol: &Molecule,
        sink: &mut ByteSink,
    ) -> Result<()> {
        match self {
            Encoder::Sdf => {
                let block = toolkit.write_sdf_block(mol)?;
                sink.write_all(block.as_bytes())?;
                if !block.ends_with('\n') {
                    sink.write_all(b"\n")?;
                }
                sink.write_all(SDF_DELIMITER.as_bytes())?;
                sink.write_all(b"\n")?;
            }
            Encoder::Smiles => {
                let notation = toolkit.write_smiles(mol)?;
                sink.write_all(notation.as_bytes())?;
                if let Some(name) = &mol.name {
                    sink.write_all(b"\t")?;
                    sink.write_all(name.as_bytes())?;
                }
                sink.write_all(b"\n")?;
            }
            Encoder::Archive { pending } => pending.push(mol.clone()),
        }
        Ok(())
    }

    /// Whether buffered archive records are still awaiting [`Encoder::finish`].
    pub fn has_pending(&self) -> bool {
        matches!(self, Encoder::Archive { pending } if !pending.is_empty())
    }

    /// Completes encoding; for the archive variant this performs the single
    /// archive write.
    pub fn finish(&mut self, sink: &mut ByteSink) -> Result<()> {
        if let Encoder::Archive { pending } = self {
            bincode::serialize_into(&mut *sink, pending)
                .map_err(|e| SerialError::Archive(e.to_string()))?;
            pending.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::kit::StdToolkit;
    use crate::io::format::Compression;
    use crate::io::transport::sink_for_stream;
    use std::io::Cursor;

    fn toolkit() -> StdToolkit {
        StdToolkit::new()
    }

    fn decode_all(decoder: &mut Decoder) -> Vec<Result<Molecule>> {
        let toolkit = toolkit();
        let mut out = Vec::new();
        while let Some(item) = decoder.next_mol(&toolkit) {
            out.push(item);
        }
        out
    }

    fn stream(content: &str) -> Box<dyn BufRead> {
        Box::new(Cursor::new(content.as_bytes().to_vec()))
    }

    /// A `'static` write target whose contents stay reachable after the
    /// sink that owns it is closed.
    #[derive(Clone, Default)]
    struct SharedBuf(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> Vec<u8> {
            self.0.borrow().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Encodes the given notations as coordinate-bearing structure blocks.
    fn sdf_content(notations: &[&str]) -> String {
        let toolkit = toolkit();
        let buffer = SharedBuf::default();
        let mut sink = sink_for_stream(Box::new(buffer.clone()), Compression::None);
        let mut encoder = Encoder::new(MolFormat::Sdf);
        for notation in notations {
            let mut mol = toolkit.parse_smiles(notation).unwrap();
            let zeros = vec![nalgebra::Point3::origin(); mol.atom_count()];
            mol.add_conformer(zeros);
            encoder.encode(&toolkit, &mol, &mut sink).unwrap();
        }
        sink.close().unwrap();
        String::from_utf8(buffer.contents()).unwrap()
    }

    #[test]
    fn block_decoder_splits_records_on_delimiter_lines() {
        let content = sdf_content(&["CCO", "CC(=O)OC1=CC=CC=C1C(=O)O"]);
        assert_eq!(content.matches(SDF_DELIMITER).count(), 2);

        let mut decoder = Decoder::open(MolFormat::Sdf, stream(&content)).unwrap();
        let mols = decode_all(&mut decoder);
        assert_eq!(mols.len(), 2);
        let first = mols[0].as_ref().unwrap();
        assert_eq!(first.atom_count(), 3);
        assert_eq!(first.conformers.len(), 1);
    }

    #[test]
    fn block_decoder_reports_one_based_record_index() {
        let mut content = String::new();
        content.push_str("ok\n  prog\n\n  1  0  0  0  0  0  0  0  0  0999 V2000\n");
        content.push_str("    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n");
        content.push_str("M  END\n$$$$\nbroken block\n$$$$\n");
        let mut decoder = Decoder::open(MolFormat::Sdf, stream(&content)).unwrap();
        let mols = decode_all(&mut decoder);
        assert_eq!(mols.len(), 2);
        assert!(mols[0].is_ok());
        match &mols[1] {
            Err(SerialError::MalformedRecord { index: 2, .. }) => {}
            other => panic!("expected malformed record 2, got {other:?}"),
        }
    }

    #[test]
    fn line_decoder_reads_notation_and_names() {
        let content = "CCO\tethanol\nCC(=O)OC1=CC=CC=C1C(=O)O\n\nC#N\thydrogen cyanide\n";
        let mut decoder = Decoder::open(MolFormat::Smiles, stream(content)).unwrap();
        let mols = decode_all(&mut decoder);
        assert_eq!(mols.len(), 3);
        assert_eq!(mols[0].as_ref().unwrap().name.as_deref(), Some("ethanol"));
        assert_eq!(mols[1].as_ref().unwrap().name, None);
        assert_eq!(
            mols[2].as_ref().unwrap().name.as_deref(),
            Some("hydrogen cyanide")
        );
        assert!(mols.iter().all(|m| m.as_ref().unwrap().conformers.is_empty()));
    }

    #[test]
    fn line_decoder_flags_bad_notation_with_its_index() {
        let content = "CCO\nnot&smiles\n";
        let mut decoder = Decoder::open(MolFormat::Smiles, stream(content)).unwrap();
        let mols = decode_all(&mut decoder);
        assert!(mols[0].is_ok());
        assert!(matches!(
            mols[1],
            Err(SerialError::MalformedRecord { index: 2, .. })
        ));
    }

    #[test]
    fn archive_codec_round_trips_molecule_sequences() {
        let toolkit = toolkit();
        let mols: Vec<Molecule> = ["CCO", "CC(=O)OC1=CC=CC=C1C(=O)O"]
            .iter()
            .map(|n| toolkit.parse_smiles(n).unwrap())
            .collect();

        let buffer = SharedBuf::default();
        let mut sink = sink_for_stream(Box::new(buffer.clone()), Compression::None);
        let mut encoder = Encoder::new(MolFormat::Archive);
        for mol in &mols {
            encoder.encode(&toolkit, mol, &mut sink).unwrap();
        }
        encoder.finish(&mut sink).unwrap();
        sink.close().unwrap();

        let mut decoder =
            Decoder::open(MolFormat::Archive, Box::new(Cursor::new(buffer.contents())))
                .unwrap();
        let decoded: Vec<Molecule> = decode_all(&mut decoder)
            .into_iter()
            .map(|m| m.unwrap())
            .collect();
        assert_eq!(decoded, mols);
    }

    #[test]
    fn archive_encoder_reports_pending_until_finished() {
        let toolkit = toolkit();
        let mut encoder = Encoder::new(MolFormat::Archive);
        assert!(!encoder.has_pending());

        let buffer = SharedBuf::default();
        let mut sink = sink_for_stream(Box::new(buffer.clone()), Compression::None);
        let mol = toolkit.parse_smiles("CCO").unwrap();
        encoder.encode(&toolkit, &mol, &mut sink).unwrap();
        assert!(encoder.has_pending());
        encoder.finish(&mut sink).unwrap();
        assert!(!encoder.has_pending());
    }

    #[test]
    fn archive_decoder_rejects_garbage_at_open() {
        let result = Decoder::open(MolFormat::Archive, stream("not an archive"));
        assert!(matches!(result, Err(SerialError::Archive(_))));
    }
}
