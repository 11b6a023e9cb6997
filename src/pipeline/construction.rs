//! Construction stage: reads → k-mer index → condensed graph with coverage.

use crate::config::{ConstructionConfig, ConstructionMode};
use crate::error::Result;
use crate::graph::assembly_graph::AssemblyGraph;
use crate::graph::condense::condense;
use crate::graph::coverage::{fill_coverage_from_index, recount_coverage, FlankingCoverage};
use crate::io::reads::{for_each_read, ReadStreams};
use crate::kmer::early_tips::clip_tips_in_index;
use crate::kmer::extension::ExtensionIndex;
use crate::kmer::index::{DetachedIndex, KmerIndex};
use crate::kmer::kmer::validate_k;
use tracing::info;

/// Output of the construction stage.
pub struct ConstructedGraph {
    pub graph: AssemblyGraph,
    /// Attached to `graph`, holding the multiplicity of every graph k-mer.
    pub index: KmerIndex,
    /// Longest read seen.
    pub read_length: usize,
    pub flanking: FlankingCoverage,
}

pub fn construct_graph(
    config: &ConstructionConfig,
    k: usize,
    streams: &mut ReadStreams,
) -> Result<ConstructedGraph> {
    construct_graph_with_contigs(config, k, streams, &mut Vec::new())
}

/// Adds the reads of `contigs` to the index. Does nothing for no streams.
fn index_contigs<F>(contigs: &mut ReadStreams, insert: F) -> Result<()>
where
    F: Fn(&[u8]) + Sync,
{
    if contigs.is_empty() {
        return Ok(());
    }
    for_each_read(contigs, |contig| insert(contig.sequence.as_bytes()))?;
    info!("Indexed k-mers of {} additional contig stream(s)", contigs.len());
    Ok(())
}

/// Builds the graph from `streams` plus the sequences of `contigs`. Contigs
/// contribute k-mers and coverage but not to the read length.
pub fn construct_graph_with_contigs(
    config: &ConstructionConfig,
    k: usize,
    streams: &mut ReadStreams,
    contigs: &mut ReadStreams,
) -> Result<ConstructedGraph> {
    validate_k(k)?;
    let (graph, index, read_length) = match config.mode {
        ConstructionMode::Legacy => {
            info!("Phase 1/2: Counting k-mers (k={})", k);
            let (index, read_length) = KmerIndex::build(k, streams)?;
            index_contigs(contigs, |seq| index.insert_read(seq))?;
            info!("Phase 2/2: Condensing unbranching paths");
            let mut graph = condense(&index, &config.condense);
            index.assign_edges(&graph);
            fill_coverage_from_index(&mut graph, &index);
            (graph, index, read_length)
        }
        ConstructionMode::Extension => {
            info!("Phase 1/3: Collecting k-mer extensions (k={})", k);
            let (extensions, read_length) = ExtensionIndex::build(k, streams)?;
            index_contigs(contigs, |seq| extensions.insert_read(seq))?;
            let tips = &config.early_tip_clipping;
            if tips.enable {
                let bound = tips
                    .length_bound
                    .unwrap_or_else(|| read_length.saturating_sub(k));
                clip_tips_in_index(&extensions, bound);
            }
            info!("Phase 2/3: Condensing unbranching paths");
            let mut graph = condense(&extensions, &config.condense);
            drop(extensions);
            info!("Phase 3/3: Counting coverage");
            let index = recount_coverage(&mut graph, DetachedIndex::new(k), streams, contigs)?;
            (graph, index, read_length)
        }
    };
    let flanking = FlankingCoverage::from_index(&graph, &index, config.flanking_range);
    Ok(ConstructedGraph {
        graph,
        index,
        read_length,
        flanking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::coverage::total_raw_coverage;
    use crate::io::reads::VecReadStream;
    use crate::kmer::kmer::Kmer;

    const GENOME: &str = "GCTAAAGACAATTACATAACATACACGTCAGCACGAAACT";

    fn tip_reads() -> ReadStreams {
        let mut reads: Vec<&str> = (0..=20).step_by(4).map(|i| &GENOME[i..i + 20]).collect();
        reads.push("ATTACATAACATACACGTCC");
        vec![Box::new(VecReadStream::from_sequences(&reads))]
    }

    fn lengths(graph: &AssemblyGraph) -> Vec<usize> {
        let mut lengths: Vec<usize> = graph.edge_pairs().map(|e| graph.length(e)).collect();
        lengths.sort_unstable();
        lengths
    }

    #[test]
    fn test_legacy_mode_keeps_tip() {
        let config = ConstructionConfig {
            mode: ConstructionMode::Legacy,
            ..Default::default()
        };
        let built = construct_graph(&config, 7, &mut tip_reads()).unwrap();
        assert_eq!(built.read_length, 20);
        assert_eq!(lengths(&built.graph), vec![1, 11, 23]);
        assert_eq!(total_raw_coverage(&built.graph), built.index.total_multiplicity());
    }

    #[test]
    fn test_extension_mode_clips_tip_early() {
        let built = construct_graph(&ConstructionConfig::default(), 7, &mut tip_reads()).unwrap();
        assert_eq!(lengths(&built.graph), vec![34]);
        assert_eq!(total_raw_coverage(&built.graph), 97);
        built.graph.verify_invariants();
    }

    #[test]
    fn test_extension_without_clipping_matches_legacy() {
        let mut config = ConstructionConfig::default();
        config.early_tip_clipping.enable = false;
        let built = construct_graph(&config, 7, &mut tip_reads()).unwrap();
        assert_eq!(lengths(&built.graph), vec![1, 11, 23]);
    }

    #[test]
    fn test_rejects_even_k() {
        assert!(construct_graph(&ConstructionConfig::default(), 8, &mut tip_reads()).is_err());
    }

    #[test]
    fn test_contig_kmers_reach_the_graph() {
        let contig = "CCGTAATGCCTTTCCCTAACAGAGTTTTTC";
        let mut contigs: ReadStreams = vec![Box::new(VecReadStream::from_sequences(&[contig]))];
        for mode in [ConstructionMode::Legacy, ConstructionMode::Extension] {
            let config = ConstructionConfig {
                mode,
                ..Default::default()
            };
            let without = construct_graph(&config, 7, &mut tip_reads()).unwrap();
            let built = construct_graph_with_contigs(&config, 7, &mut tip_reads(), &mut contigs).unwrap();
            let first_kmer = Kmer::from_str(&contig[..7]).unwrap();
            assert!(without.index.get(&first_kmer).is_none());
            let entry = built.index.get(&first_kmer).unwrap();
            assert_eq!(entry.count, 1);
            assert!(entry.edge.is_some());
            assert!(built.graph.edges().any(|e| built.graph.sequence(e) == contig.as_bytes()));
            assert_eq!(built.read_length, 20);
            assert_eq!(built.flanking.len(), built.graph.edge_count());
        }
    }
}
