//! # molserial
//!
//! A streaming reader/writer for small-molecule structure files that abstracts
//! over multiple record formats (block-delimited SDF, line-oriented SMILES,
//! and a serialized-object archive), transparently over gzip-compressed or
//! plain byte streams.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`chem`]: The Foundation.** Contains stateless data models
//!   ([`chem::molecule::Molecule`], [`chem::molecule::Conformer`]) and the
//!   [`chem::toolkit::Toolkit`] seam behind which all actual chemistry
//!   (record parsing, canonical signatures, graph edits) lives. A bundled
//!   reference implementation is provided in [`chem::kit`].
//!
//! - **[`io`]: The Byte Layer.** Resolves formats and compression from file
//!   suffixes, opens plain or gzip byte streams, and hosts the per-format
//!   record codecs that split streams into raw records and back.
//!
//! - **[`pipeline`]: The Public API.** Ties the layers together into the
//!   [`pipeline::reader::MolReader`] and [`pipeline::writer::MolWriter`]
//!   orchestrators, running decode → normalize → coalesce as one lazy,
//!   pull-based sequence of molecules.

pub mod chem;
pub mod error;
pub mod io;
pub mod pipeline;
