//! Edge coverage from k-mer multiplicities.

use crate::error::Result;
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::io::reads::ReadStreams;
use crate::kmer::index::{DetachedIndex, KmerIndex};
use crate::kmer::kmer::KmerIter;
use ahash::AHashMap;
use tracing::info;

/// Sets every edge's raw coverage to the summed multiplicity of its k-mers.
///
/// The index must be attached to `graph`. Each canonical k-mer is counted
/// once per conjugate pair, so a self-conjugate edge is not counted twice.
pub fn fill_coverage_from_index(graph: &mut AssemblyGraph, index: &KmerIndex) {
    assert_eq!(
        graph.k(),
        index.k(),
        "k-mer length mismatch between graph (k={}) and index (k={})",
        graph.k(),
        index.k()
    );
    graph.reset_coverage();
    for (_, entry) in index.entries() {
        if let Some(e) = entry.edge {
            assert!(
                graph.contains_edge(e),
                "k-mer index references removed edge {}",
                e
            );
            graph.add_raw_coverage(e, entry.count);
        }
    }
}

/// Re-attaches an index to `graph`, rescans the reads and fills coverage.
/// `contigs` may be empty.
pub fn recount_coverage(
    graph: &mut AssemblyGraph,
    detached: DetachedIndex,
    streams: &mut ReadStreams,
    contigs: &mut ReadStreams,
) -> Result<KmerIndex> {
    let index = detached.attach(graph)?;
    index.reset_counts();
    index.count_from_streams(streams)?;
    if !contigs.is_empty() {
        index.count_from_streams(contigs)?;
    }
    fill_coverage_from_index(graph, &index);
    info!(
        "Recounted coverage over {} k-mers ({} occurrences)",
        index.len(),
        index.total_multiplicity()
    );
    Ok(index)
}

/// Coverage near the ends of edges: the summed multiplicity of the first
/// `range` k-mers of every edge. The flank at the end of an edge is the
/// start flank of its conjugate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlankingCoverage {
    range: usize,
    raw: AHashMap<EdgeId, u32>,
}

impl FlankingCoverage {
    pub fn new(range: usize) -> Self {
        Self {
            range,
            raw: AHashMap::new(),
        }
    }

    /// Computes the start flank of every edge. The index must be attached
    /// to `graph` and hold multiplicities.
    pub fn from_index(graph: &AssemblyGraph, index: &KmerIndex, range: usize) -> Self {
        let mut flanking = Self::new(range);
        for e in graph.edges() {
            let raw = KmerIter::new(graph.sequence(e), graph.k())
                .take(range)
                .filter_map(|(_, kmer)| index.get(&kmer))
                .fold(0u32, |sum, entry| sum.saturating_add(entry.count));
            flanking.raw.insert(e, raw);
        }
        flanking
    }

    pub fn range(&self) -> usize {
        self.range
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn raw_coverage(&self, e: EdgeId) -> u32 {
        self.raw.get(&e).copied().unwrap_or(0)
    }

    pub fn set_raw_coverage(&mut self, e: EdgeId, raw: u32) {
        self.raw.insert(e, raw);
    }

    /// Mean multiplicity over the first k-mers of `e`.
    pub fn start_coverage(&self, graph: &AssemblyGraph, e: EdgeId) -> f64 {
        let window = self.range.min(graph.length(e));
        if window == 0 {
            return 0.0;
        }
        self.raw_coverage(e) as f64 / window as f64
    }

    /// Mean multiplicity over the last k-mers of `e`.
    pub fn end_coverage(&self, graph: &AssemblyGraph, e: EdgeId) -> f64 {
        self.start_coverage(graph, graph.conjugate(e))
    }
}

/// Sum of raw coverage over one edge of every conjugate pair.
pub fn total_raw_coverage(graph: &AssemblyGraph) -> u64 {
    graph.edge_pairs().map(|e| graph.raw_coverage(e) as u64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::condense::{condense, CondenseParams};
    use crate::io::reads::VecReadStream;

    #[test]
    fn test_coverage_of_repeat_loop() {
        let index = KmerIndex::new(3);
        index.insert_read(b"ACGTACGTACG");
        let mut graph = condense(&index, &CondenseParams::default());
        index.assign_edges(&graph);
        fill_coverage_from_index(&mut graph, &index);
        let e = graph.edges().next().unwrap();
        assert_eq!(graph.raw_coverage(e), 9);
        assert_eq!(total_raw_coverage(&graph), index.total_multiplicity());
    }

    #[test]
    fn test_palindromic_edge_counts_each_kmer_once() {
        let index = KmerIndex::new(5);
        index.insert_read(b"GATTACAGCTGTAATC");
        index.insert_read(b"GATTACAGCTGTAATC");
        let mut graph = condense(&index, &CondenseParams::default());
        index.assign_edges(&graph);
        fill_coverage_from_index(&mut graph, &index);
        let e = graph.edges().next().unwrap();
        assert_eq!(graph.raw_coverage(e), 24);
    }

    #[test]
    fn test_recount_matches_direct_fill() {
        let reads = ["GCTAAAGACAATTACATAACATACACGTCAGCACGAAACT", "ATTACATAACATACACGTCC"];
        let index = KmerIndex::new(7);
        for r in reads {
            index.insert_read(r.as_bytes());
        }
        let mut graph = condense(&index, &CondenseParams::default());
        index.assign_edges(&graph);
        fill_coverage_from_index(&mut graph, &index);
        let direct: Vec<u32> = graph.edges().map(|e| graph.raw_coverage(e)).collect();

        let mut streams: ReadStreams = vec![Box::new(VecReadStream::from_sequences(&reads))];
        recount_coverage(&mut graph, DetachedIndex::new(7), &mut streams, &mut Vec::new()).unwrap();
        let recounted: Vec<u32> = graph.edges().map(|e| graph.raw_coverage(e)).collect();
        assert_eq!(direct, recounted);
        assert_eq!(total_raw_coverage(&graph), index.total_multiplicity());
    }

    #[test]
    fn test_recount_includes_contigs() {
        let reads = ["GCTAAAGACAATTACATAACAT"];
        let index = KmerIndex::new(7);
        index.insert_read(reads[0].as_bytes());
        let mut graph = condense(&index, &CondenseParams::default());
        let mut streams: ReadStreams = vec![Box::new(VecReadStream::from_sequences(&reads))];
        let mut contigs: ReadStreams = vec![Box::new(VecReadStream::from_sequences(&reads))];
        let index = recount_coverage(&mut graph, DetachedIndex::new(7), &mut streams, &mut contigs).unwrap();
        assert_eq!(index.total_multiplicity(), 32);
        assert_eq!(total_raw_coverage(&graph), 32);
    }

    #[test]
    fn test_flanking_coverage_at_both_ends() {
        let index = KmerIndex::new(5);
        // first k-mer three times, last k-mer once
        index.insert_read(b"TTGACAAG");
        index.insert_read(b"TTGAC");
        index.insert_read(b"TTGAC");
        let graph = condense(&index, &CondenseParams::default());
        index.assign_edges(&graph);
        let e = graph
            .edges()
            .find(|&e| graph.sequence(e) == b"TTGACAAG")
            .unwrap();

        let flanking = FlankingCoverage::from_index(&graph, &index, 2);
        assert_eq!(flanking.len(), 2);
        assert_eq!(flanking.raw_coverage(e), 4);
        assert_eq!(flanking.start_coverage(&graph, e), 2.0);
        assert_eq!(flanking.end_coverage(&graph, e), 1.0);

        // a range past the edge end averages over the whole edge
        let whole = FlankingCoverage::from_index(&graph, &index, 50);
        assert_eq!(whole.raw_coverage(e), 6);
        assert_eq!(whole.start_coverage(&graph, e), 1.5);
        assert_eq!(whole.raw_coverage(graph.conjugate(e)), 6);
    }
}
