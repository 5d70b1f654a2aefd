//! The user-facing orchestration layer.
//!
//! [`reader::MolReader`] composes decode → normalize → coalesce into one
//! lazy, single-pass sequence of molecules; [`writer::MolWriter`] runs the
//! encode path with the stereochemistry-emission policy. Both own exactly
//! one stream and one codec cursor; neither supports concurrent access.

pub mod coalesce;
pub mod normalize;
pub mod reader;
pub mod writer;
