//! K-mer encoding, counting indices and the adjacency views the condenser walks.

pub mod adjacency;
pub mod early_tips;
pub mod extension;
pub mod index;
pub mod kmer;
