//! Read input, graph output and persisted record formats.

pub mod binary;
pub mod fasta;
pub mod fastq;
pub mod gfa;
pub mod reads;
