use crate::chem::molecule::Molecule;
use crate::chem::toolkit::Toolkit;
use crate::error::{Result, SerialError};
use crate::io::codec::Encoder;
use crate::io::format::{Compression, FormatSpec, MolFormat};
use crate::io::transport::{self, ByteSink};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Emit stereochemistry annotations. When `false`, output carries no
    /// stereo marks regardless of the input. Default `true`.
    pub stereo: bool,
    /// Explicit format; overrides filename inference. Required for raw
    /// streams.
    pub format: Option<MolFormat>,
    /// Explicit compression; overrides filename inference.
    pub compression: Option<Compression>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            stereo: true,
            format: None,
            compression: None,
        }
    }
}

/// Streaming molecule writer: resolves the format, opens the transport, and
/// encodes molecules one at a time. [`MolWriter::close`] must be called to
/// finalize compressed and archive output; dropping an open writer performs a
/// best-effort close.
pub struct MolWriter<T> {
    toolkit: T,
    options: WriterOptions,
    state: Option<(Encoder, ByteSink)>,
}

impl<T: Toolkit> MolWriter<T> {
    pub fn new(toolkit: T) -> Self {
        Self::with_options(toolkit, WriterOptions::default())
    }

    pub fn with_options(toolkit: T, options: WriterOptions) -> Self {
        Self {
            toolkit,
            options,
            state: None,
        }
    }

    /// Opens an output file, inferring format and compression from its suffix
    /// unless overridden. Any previously open target is closed first.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = match self.options.format {
            Some(format) => format,
            None => FormatSpec::from_path(path)?.format,
        };
        let compression = self
            .options
            .compression
            .unwrap_or_else(|| Compression::from_path(path));
        debug!(path = %path.display(), %format, ?compression, "opening output target");
        self.close()?;
        let sink = transport::sink_for_path(path, compression)?;
        self.state = Some((Encoder::new(format), sink));
        Ok(())
    }

    /// Opens an already-open byte sink. The format cannot be inferred and
    /// must have been set explicitly in the options.
    pub fn open_stream(&mut self, stream: Box<dyn Write>) -> Result<()> {
        let format = self.options.format.ok_or(SerialError::AmbiguousFormat)?;
        let compression = self.options.compression.unwrap_or_default();
        self.close()?;
        let sink = transport::sink_for_stream(stream, compression);
        self.state = Some((Encoder::new(format), sink));
        Ok(())
    }

    /// Writes one molecule to the open target.
    ///
    /// # Errors
    ///
    /// Returns [`SerialError::NotOpen`] if no target has been opened, or the
    /// encoder's error for molecules the output notation cannot express.
    pub fn write_mol(&mut self, mol: &Molecule) -> Result<()> {
        let (encoder, sink) = self.state.as_mut().ok_or(SerialError::NotOpen)?;
        if self.options.stereo {
            encoder.encode(&self.toolkit, mol, sink)
        } else {
            let flat = self.toolkit.strip_stereo(mol)?;
            encoder.encode(&self.toolkit, &flat, sink)
        }
    }

    /// Writes a sequence of molecules in order.
    pub fn write<'a>(&mut self, mols: impl IntoIterator<Item = &'a Molecule>) -> Result<()> {
        for mol in mols {
            self.write_mol(mol)?;
        }
        Ok(())
    }

    /// Finalizes the open target: flushes the encoder (writing the archive
    /// body if applicable) and closes the transport. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if let Some((mut encoder, mut sink)) = self.state.take() {
            encoder.finish(&mut sink)?;
            sink.close()?;
        }
        Ok(())
    }
}

impl<T> Drop for MolWriter<T> {
    fn drop(&mut self) {
        if let Some((encoder, mut sink)) = self.state.take() {
            if encoder.has_pending() {
                warn!("writer dropped before close; buffered archive molecules were discarded");
            }
            let _ = sink.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::kit::StdToolkit;
    use crate::io::transport::reader_for_path;
    use crate::pipeline::reader::{MolReader, ReaderOptions};
    use std::io::Read;

    fn toolkit() -> StdToolkit {
        StdToolkit::new()
    }

    fn writer_with(options: WriterOptions) -> MolWriter<StdToolkit> {
        MolWriter::with_options(toolkit(), options)
    }

    fn aspirin() -> Molecule {
        let mut mol = toolkit()
            .parse_smiles("CC(=O)OC1=CC=CC=C1C(=O)O")
            .unwrap();
        mol.name = Some("aspirin".to_string());
        mol
    }

    fn read_back(path: &std::path::Path) -> Vec<Molecule> {
        let mut reader = MolReader::new(toolkit());
        reader.open(path).unwrap();
        reader.mols().map(|m| m.unwrap()).collect()
    }

    #[test]
    fn writing_before_open_is_rejected() {
        let mut writer = MolWriter::new(toolkit());
        assert!(matches!(
            writer.write_mol(&aspirin()),
            Err(SerialError::NotOpen)
        ));
    }

    #[test]
    fn sdf_output_delimits_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sdf");
        let mut writer = MolWriter::new(toolkit());
        writer.open(&path).unwrap();
        writer.write([&aspirin(), &aspirin()]).unwrap();
        writer.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("$$$$\n").count(), 2);
        assert!(content.ends_with("$$$$\n"));
        let mols = read_back(&path);
        assert_eq!(mols.len(), 1); // adjacent duplicates coalesce on read
    }

    #[test]
    fn smiles_output_appends_tab_separated_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.smi");
        let mut writer = MolWriter::new(toolkit());
        writer.open(&path).unwrap();
        writer.write_mol(&aspirin()).unwrap();
        writer.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let line = content.lines().next().unwrap();
        let (notation, name) = line.split_once('\t').unwrap();
        assert_eq!(name, "aspirin");
        assert!(!notation.is_empty());
        let mols = read_back(&path);
        assert_eq!(mols[0].name.as_deref(), Some("aspirin"));
    }

    #[test]
    fn round_trip_preserves_structural_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mol = aspirin();
        for target in ["rt.sdf", "rt.smi", "rt.bin", "rt.sdf.gz"] {
            let path = dir.path().join(target);
            let mut writer = MolWriter::new(toolkit());
            writer.open(&path).unwrap();
            writer.write_mol(&mol).unwrap();
            writer.close().unwrap();

            let mols = read_back(&path);
            assert_eq!(mols.len(), 1, "{target}");
            let reader = MolReader::new(toolkit());
            assert!(
                reader.are_same_molecule(&mol, &mols[0]).unwrap(),
                "{target}"
            );
        }
    }

    #[test]
    fn stereo_suppression_matches_explicit_stripping() {
        let dir = tempfile::tempdir().unwrap();
        let chiral = toolkit().parse_smiles("C[C@H](N)C(=O)O").unwrap();

        let flat_path = dir.path().join("flat.smi");
        let mut writer = writer_with(WriterOptions {
            stereo: false,
            ..WriterOptions::default()
        });
        writer.open(&flat_path).unwrap();
        writer.write_mol(&chiral).unwrap();
        writer.close().unwrap();

        let mut content = String::new();
        reader_for_path(&flat_path, Compression::None)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(!content.contains('@'));

        let stripped = toolkit().strip_stereo(&chiral).unwrap();
        let written = read_back(&flat_path).remove(0);
        let reader = MolReader::new(toolkit());
        assert!(reader.are_same_molecule(&written, &stripped).unwrap());
        assert!(!reader.are_same_molecule(&written, &chiral).unwrap());
    }

    #[test]
    fn dropping_an_unclosed_archive_writer_discards_buffered_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.bin");
        {
            let mut writer = MolWriter::new(toolkit());
            writer.open(&path).unwrap();
            writer.write_mol(&aspirin()).unwrap();
        }
        // The archive body only exists after an explicit close.
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn archive_body_is_written_at_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut writer = MolWriter::new(toolkit());
        writer.open(&path).unwrap();
        writer.write_mol(&aspirin()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        writer.close().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert_eq!(read_back(&path).len(), 1);
    }

    #[test]
    fn explicit_format_overrides_the_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mols.dat.gz");
        let mut writer = writer_with(WriterOptions {
            format: Some(MolFormat::Smiles),
            ..WriterOptions::default()
        });
        writer.open(&path).unwrap();
        writer.write_mol(&aspirin()).unwrap();
        writer.close().unwrap();

        let mut reader = MolReader::with_options(
            toolkit(),
            ReaderOptions {
                format: Some(MolFormat::Smiles),
                ..ReaderOptions::default()
            },
        );
        reader.open(&path).unwrap();
        assert_eq!(reader.mols().count(), 1);
    }
}
