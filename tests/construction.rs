mod common;

use helix::config::{ConstructionConfig, ConstructionMode};
use helix::graph::assembly_graph::AssemblyGraph;
use helix::graph::condense::{condense, CondenseParams};
use helix::graph::coverage::{fill_coverage_from_index, total_raw_coverage};
use helix::io::reads::{ReadStreams, VecReadStream};
use helix::kmer::index::KmerIndex;
use helix::kmer::kmer::reverse_complement;
use helix::pipeline::construction::construct_graph;

fn assert_strand_duality(graph: &AssemblyGraph) {
    for e in graph.edges() {
        let c = graph.conjugate(e);
        assert_eq!(graph.conjugate(c), e);
        assert_eq!(graph.length(c), graph.length(e));
        assert_eq!(graph.sequence(c), reverse_complement(graph.sequence(e)).as_slice());
        assert_eq!(graph.raw_coverage(c), graph.raw_coverage(e));
    }
}

#[test]
fn test_repeat_read_condenses_to_one_loop() {
    let mut streams: ReadStreams = vec![Box::new(VecReadStream::from_sequences(&["ACGTACGTACG"]))];
    let (index, _) = KmerIndex::build(3, &mut streams).unwrap();
    assert_eq!(index.total_multiplicity(), 9);

    let mut graph = condense(&index, &CondenseParams::default());
    index.assign_edges(&graph);
    fill_coverage_from_index(&mut graph, &index);

    let edges: Vec<_> = graph.edges().collect();
    assert_eq!(edges.len(), 1);
    assert!(graph.is_self_conjugate(edges[0]));
    assert_eq!(graph.raw_coverage(edges[0]), 9);
}

#[test]
fn test_palindromic_read_gives_one_edge() {
    let mut streams: ReadStreams = vec![Box::new(VecReadStream::from_sequences(&["GATTACAGCTGTAATC"]))];
    let config = ConstructionConfig {
        mode: ConstructionMode::Legacy,
        ..Default::default()
    };
    let built = construct_graph(&config, 5, &mut streams).unwrap();
    assert_eq!(built.graph.edge_count(), 1);
    let e = built.graph.edges().next().unwrap();
    assert!(built.graph.is_self_conjugate(e));
    assert_eq!(built.graph.sequence(e), b"GATTACAGCTGTAATC");
}

#[test]
fn test_coverage_is_conserved() {
    let genome = common::genome(2000, 42);
    let mut reads = common::tiled_reads(&genome, 100, 7);
    // a second, shifted haplotype fragment creates branching
    reads.push(format!("{}A{}", &genome[500..550], &genome[551..600]));
    for mode in [ConstructionMode::Legacy, ConstructionMode::Extension] {
        let mut config = ConstructionConfig {
            mode,
            ..Default::default()
        };
        config.early_tip_clipping.enable = false;
        let built = construct_graph(&config, 21, &mut common::single_streams(&reads)).unwrap();
        assert_eq!(built.read_length, 100);
        assert_eq!(total_raw_coverage(&built.graph), built.index.total_multiplicity());
        assert_strand_duality(&built.graph);
        built.graph.verify_invariants();
    }
}

#[test]
fn test_clean_genome_is_one_edge() {
    let genome = common::genome(2000, 7);
    let reads = common::tiled_reads(&genome, 100, 10);
    let built = construct_graph(&ConstructionConfig::default(), 21, &mut common::single_streams(&reads)).unwrap();
    assert_eq!(built.graph.edge_count(), 2);
    let e = built.graph.edge_pairs().next().unwrap();
    assert_eq!(built.graph.length(e), 1980);
    let seq = built.graph.sequence(e);
    assert!(seq == genome.as_bytes() || seq == reverse_complement(genome.as_bytes()).as_slice());
}

#[test]
fn test_small_seed_batches_give_same_graph() {
    let genome = common::genome(2000, 42);
    let reads = common::tiled_reads(&genome, 100, 10);
    let sequences = |params: CondenseParams| {
        let config = ConstructionConfig {
            mode: ConstructionMode::Legacy,
            condense: params,
            ..Default::default()
        };
        let built = construct_graph(&config, 21, &mut common::single_streams(&reads)).unwrap();
        let mut seqs: Vec<Vec<u8>> = built.graph.edges().map(|e| built.graph.sequence(e).to_vec()).collect();
        seqs.sort();
        seqs
    };
    let small = CondenseParams {
        queue_min_size: 1,
        queue_max_size: 3,
        queue_growth_rate: 1.5,
        keep_perfect_loops: true,
    };
    assert_eq!(sequences(small), sequences(CondenseParams::default()));
}

#[test]
fn test_empty_stream_set_is_an_error() {
    let mut streams: ReadStreams = Vec::new();
    assert!(matches!(
        construct_graph(&ConstructionConfig::default(), 21, &mut streams),
        Err(helix::Error::NoReadStreams)
    ));
}
