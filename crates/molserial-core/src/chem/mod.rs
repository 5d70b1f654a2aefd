//! Chemical data models and the toolkit seam.
//!
//! The pipeline never implements chemistry itself: everything that interprets
//! atoms, bonds, and canonical identity is reached through the
//! [`toolkit::Toolkit`] trait. The [`kit`] module carries a self-contained
//! reference implementation used by the tests and the CLI.

pub mod kit;
pub mod molecule;
pub mod toolkit;
