//! Assembly graph, condensation, coverage, paired info and simplification.

pub mod assembly_graph;
pub mod condense;
pub mod coverage;
pub mod mapper;
pub mod paired_info;
pub mod simplify;
