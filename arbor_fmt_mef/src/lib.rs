//! Open-PSA MEF front end for the arbor model formalism.
//!
//! Parses a set of MEF XML input files into a validated, analysis-ready
//! [`arbor_core::Model`] through the two-pass [`Initializer`].

mod initializer;
mod schema;
mod vocabulary;
pub mod xml;

pub use initializer::Initializer;

pub use arbor_core;
