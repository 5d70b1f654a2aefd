use super::coalesce::{self, ConformerCoalescer};
use super::normalize::{NormalizeOptions, Normalizer};
use crate::chem::molecule::Molecule;
use crate::chem::toolkit::Toolkit;
use crate::error::{Result, SerialError};
use crate::io::codec::Decoder;
use crate::io::format::{Compression, FormatSpec, MolFormat};
use crate::io::transport;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, warn};

/// What to do when a record fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorPolicy {
    /// Propagate `MalformedRecord` to the caller.
    #[default]
    Fail,
    /// Discard the record and continue decoding.
    Skip,
}

/// Reader configuration; validated once at construction, defaults documented
/// per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Remove explicit hydrogens on ingest. Default `true`.
    pub remove_hydrogens: bool,
    /// Strip disconnected counter-ion fragments on ingest. Default `true`.
    pub remove_salts: bool,
    /// Explicit format; overrides filename inference. Required for raw
    /// streams.
    pub format: Option<MolFormat>,
    /// Explicit compression; overrides filename inference.
    pub compression: Option<Compression>,
    /// Malformed-record policy. Default [`ParseErrorPolicy::Fail`].
    pub on_parse_error: ParseErrorPolicy,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            remove_hydrogens: true,
            remove_salts: true,
            format: None,
            compression: None,
            on_parse_error: ParseErrorPolicy::default(),
        }
    }
}

impl ReaderOptions {
    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            remove_hydrogens: self.remove_hydrogens,
            remove_salts: self.remove_salts,
        }
    }
}

/// Streaming molecule reader: resolves the format, opens the transport and
/// codec, and exposes decode → normalize → coalesce as one lazy sequence.
pub struct MolReader<T> {
    toolkit: T,
    options: ReaderOptions,
    decoder: Option<Decoder>,
}

impl<T: Toolkit> MolReader<T> {
    pub fn new(toolkit: T) -> Self {
        Self::with_options(toolkit, ReaderOptions::default())
    }

    pub fn with_options(toolkit: T, options: ReaderOptions) -> Self {
        Self {
            toolkit,
            options,
            decoder: None,
        }
    }

    /// Opens a molecule file, inferring format and compression from its
    /// suffix unless overridden. Replaces any previously open stream.
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
        debug!(path = %path.display(), %format, ?compression, "opening molecule stream");
        let stream = transport::reader_for_path(path, compression)?;
        self.decoder = Some(Decoder::open(format, stream)?);
        Ok(())
    }

    /// Opens an already-open byte stream. The format cannot be inferred and
    /// must have been set explicitly in the options.
    pub fn open_stream(&mut self, stream: Box<dyn BufRead>) -> Result<()> {
        let format = self.options.format.ok_or(SerialError::AmbiguousFormat)?;
        let compression = self.options.compression.unwrap_or_default();
        let stream = transport::reader_for_stream(stream, compression);
        self.decoder = Some(Decoder::open(format, stream)?);
        Ok(())
    }

    /// The composed lazy sequence of molecules, in file order modulo
    /// coalescing of adjacent equivalents. Single-pass: once exhausted (or
    /// before any `open`), the sequence is empty until `open` is called
    /// again.
    pub fn mols(&mut self) -> Mols<'_, T> {
        let records = NormalizedRecords {
            toolkit: &self.toolkit,
            decoder: self.decoder.take(),
            normalize: self.options.normalize_options(),
            on_parse_error: self.options.on_parse_error,
        };
        Mols {
            inner: ConformerCoalescer::new(&self.toolkit, records),
        }
    }

    /// Applies the reader's normalization policy to one molecule directly.
    pub fn clean_mol(&self, mol: &Molecule) -> Result<Molecule> {
        Normalizer::new(&self.toolkit, self.options.normalize_options()).clean(mol)
    }

    /// The coalescer's structural-equivalence test, exposed for direct use.
    pub fn are_same_molecule(&self, a: &Molecule, b: &Molecule) -> Result<bool> {
        coalesce::are_same_molecule(&self.toolkit, a, b)
    }
}

/// Decode + normalize stage feeding the coalescer.
struct NormalizedRecords<'a, T> {
    toolkit: &'a T,
    decoder: Option<Decoder>,
    normalize: NormalizeOptions,
    on_parse_error: ParseErrorPolicy,
}

impl<T: Toolkit> Iterator for NormalizedRecords<'_, T> {
    type Item = Result<Molecule>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let decoder = self.decoder.as_mut()?;
            match decoder.next_mol(self.toolkit) {
                None => {
                    self.decoder = None;
                    return None;
                }
                Some(Err(SerialError::MalformedRecord { index, source }))
                    if self.on_parse_error == ParseErrorPolicy::Skip =>
                {
                    warn!(index, %source, "skipping malformed record");
                }
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(mol)) => {
                    return Some(Normalizer::new(self.toolkit, self.normalize).clean(&mol));
                }
            }
        }
    }
}

/// The sequence returned by [`MolReader::mols`].
pub struct Mols<'a, T: Toolkit> {
    inner: ConformerCoalescer<'a, T, NormalizedRecords<'a, T>>,
}

impl<T: Toolkit> Iterator for Mols<'_, T> {
    type Item = Result<Molecule>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
