use crate::graph::assembly_graph::AssemblyGraph;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub edge_pairs: usize,
    pub vertices: usize,
    /// Bases over one edge of every conjugate pair.
    pub total_length: usize,
    pub longest_edge: usize,
    pub n50: usize,
    /// Length-weighted mean k-mer coverage.
    pub mean_coverage: f64,
}

/// N50 of a set of lengths: the largest `l` such that lengths of at least
/// `l` cover half the total.
pub fn n50(lengths: &[usize]) -> usize {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let total: usize = sorted.iter().sum();
    let mut acc = 0;
    sorted
        .into_iter()
        .find(|&len| {
            acc += len;
            acc * 2 >= total
        })
        .unwrap_or(0)
}

impl GraphStats {
    pub fn from_graph(graph: &AssemblyGraph) -> Self {
        let lengths: Vec<usize> = graph.edge_pairs().map(|e| graph.sequence(e).len()).collect();
        let (kmers, raw) = graph
            .edge_pairs()
            .fold((0u64, 0u64), |(kmers, raw), e| {
                (kmers + graph.length(e) as u64, raw + graph.raw_coverage(e) as u64)
            });
        Self {
            edge_pairs: lengths.len(),
            vertices: graph.vertex_count(),
            total_length: lengths.iter().sum(),
            longest_edge: lengths.iter().copied().max().unwrap_or(0),
            n50: n50(&lengths),
            mean_coverage: if kmers > 0 { raw as f64 / kmers as f64 } else { 0.0 },
        }
    }
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Graph Statistics ===")?;
        writeln!(f, "Edges (conjugate pairs): {}", self.edge_pairs)?;
        writeln!(f, "Vertices: {}", self.vertices)?;
        writeln!(f, "Total length: {} bp", self.total_length)?;
        writeln!(f, "Longest edge: {} bp", self.longest_edge)?;
        writeln!(f, "N50: {} bp", self.n50)?;
        write!(f, "Mean coverage: {:.2}", self.mean_coverage)
    }
}
