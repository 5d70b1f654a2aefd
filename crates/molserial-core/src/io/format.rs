use crate::error::SerialError;
use phf::phf_map;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Structure record formats the pipeline can decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MolFormat {
    /// Block-delimited structure records separated by `$$$$` lines.
    Sdf,
    /// Line-oriented linear notation, one molecule per line.
    Smiles,
    /// One serialized sequence of molecules for the whole stream.
    Archive,
}

/// Stream compression applied outside the record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

/// Known format suffixes, matched after any compression suffix is removed.
static FORMAT_SUFFIXES: phf::Map<&'static str, MolFormat> = phf_map! {
    "sdf" => MolFormat::Sdf,
    "sd" => MolFormat::Sdf,
    "smi" => MolFormat::Smiles,
    "ism" => MolFormat::Smiles,
    "bin" => MolFormat::Archive,
};

/// Resolved structure format and compression for one stream; decided once at
/// open time and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub format: MolFormat,
    pub compression: Compression,
}

impl FormatSpec {
    pub fn new(format: MolFormat, compression: Compression) -> Self {
        Self {
            format,
            compression,
        }
    }

    /// Infers format and compression from a filename suffix. An unknown
    /// suffix is a resolution failure, never a silent default.
    pub fn from_path(path: &Path) -> Result<Self, SerialError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let (stem, compression) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, Compression::Gzip),
            None => (name.as_str(), Compression::None),
        };
        let format = stem
            .rsplit_once('.')
            .and_then(|(_, suffix)| FORMAT_SUFFIXES.get(suffix).copied())
            .ok_or_else(|| SerialError::UnknownFormat(path.display().to_string()))?;
        Ok(Self {
            format,
            compression,
        })
    }
}

impl Compression {
    /// Compression implied by the filename alone.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".gz") {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

impl fmt::Display for MolFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MolFormat::Sdf => "sdf",
            MolFormat::Smiles => "smi",
            MolFormat::Archive => "bin",
        };
        write!(f, "{name}")
    }
}

impl FromStr for MolFormat {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sdf" | "sd" => Ok(MolFormat::Sdf),
            "smi" | "smiles" | "ism" => Ok(MolFormat::Smiles),
            "bin" | "archive" => Ok(MolFormat::Archive),
            other => Err(SerialError::UnknownFormat(other.to_string())),
        }
    }
}
