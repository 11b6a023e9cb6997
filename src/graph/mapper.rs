use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::kmer::index::KmerIndex;
use crate::kmer::kmer::KmerIter;

/// A stretch of consecutive read k-mers lying on consecutive positions of one
/// edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappingRange {
    pub edge: EdgeId,
    /// Offset of the first k-mer in the read.
    pub read_start: usize,
    /// Offset of the first k-mer in the edge.
    pub edge_start: usize,
    pub kmers: usize,
}

/// Places reads on graph edges.
pub trait SequenceMapper: Sync {
    fn map_sequence(&self, seq: &[u8]) -> Vec<MappingRange>;
}

/// Exact k-mer lookup through an edge-attached index.
pub struct KmerMapper<'a> {
    graph: &'a AssemblyGraph,
    index: &'a KmerIndex,
}

impl<'a> KmerMapper<'a> {
    pub fn new(graph: &'a AssemblyGraph, index: &'a KmerIndex) -> Self {
        assert_eq!(graph.k(), index.k(), "mapper needs graph and index with the same k");
        Self { graph, index }
    }
}

impl<'a> SequenceMapper for KmerMapper<'a> {
    fn map_sequence(&self, seq: &[u8]) -> Vec<MappingRange> {
        let mut ranges: Vec<MappingRange> = Vec::new();
        for (pos, kmer) in KmerIter::new(seq, self.index.k()) {
            let entry = match self.index.get(&kmer) {
                Some(entry) => entry,
                None => continue,
            };
            let edge = match entry.edge {
                Some(e) if self.graph.contains_edge(e) => e,
                _ => continue,
            };
            let (edge, offset) = if kmer.is_canonical() {
                (edge, entry.offset as usize)
            } else {
                let len = self.graph.length(edge);
                (self.graph.conjugate(edge), len - 1 - entry.offset as usize)
            };

            if let Some(last) = ranges.last_mut() {
                if last.edge == edge
                    && last.read_start + last.kmers == pos
                    && last.edge_start + last.kmers == offset
                {
                    last.kmers += 1;
                    continue;
                }
            }
            ranges.push(MappingRange {
                edge,
                read_start: pos,
                edge_start: offset,
                kmers: 1,
            });
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::condense::{condense, CondenseParams};
    use crate::kmer::kmer::reverse_complement;

    const GENOME: &str = "GCTAAAGACAGTTAC";

    fn setup() -> (AssemblyGraph, KmerIndex) {
        let index = KmerIndex::new(5);
        index.insert_read(GENOME.as_bytes());
        let graph = condense(&index, &CondenseParams::default());
        index.assign_edges(&graph);
        (graph, index)
    }

    #[test]
    fn test_maps_forward_and_reverse_reads() {
        let (graph, index) = setup();
        let mapper = KmerMapper::new(&graph, &index);
        let forward = graph.edges().find(|&e| graph.sequence(e) == GENOME.as_bytes()).unwrap();

        let ranges = mapper.map_sequence(&GENOME.as_bytes()[3..12]);
        assert_eq!(
            ranges,
            vec![MappingRange { edge: forward, read_start: 0, edge_start: 3, kmers: 5 }]
        );

        let rc = reverse_complement(&GENOME.as_bytes()[3..12]);
        let ranges = mapper.map_sequence(&rc);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].edge, graph.conjugate(forward));
        assert_eq!(ranges[0].edge_start, 15 - 12);
        assert_eq!(ranges[0].kmers, 5);
    }

    #[test]
    fn test_mismatch_splits_range() {
        let (graph, index) = setup();
        let mapper = KmerMapper::new(&graph, &index);
        let mut read = GENOME.as_bytes().to_vec();
        read[7] = b'T';
        let ranges = mapper.map_sequence(&read);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].kmers, 3);
        assert_eq!(ranges[1].read_start, 8);
        assert_eq!(ranges[1].edge_start, 8);
        assert!(mapper.map_sequence(b"TTTTTTTT").is_empty());
    }
}
