//! helix: parallel de Bruijn graph construction and simplification for
//! short-read genome assembly.

pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod kmer;
pub mod pipeline;
pub mod stats;

pub use config::{AssemblyConfig, Stage};
pub use error::{Error, Result};
