//! Collapses non-branching k-mer chains into graph edges.

use crate::graph::assembly_graph::AssemblyGraph;
use crate::kmer::adjacency::Adjacency;
use crate::kmer::extension::mask_bases;
use crate::kmer::kmer::{decode_base, Kmer};
use ahash::AHashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Batching of the seed sweep and treatment of isolated cycles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondenseParams {
    pub queue_min_size: usize,
    pub queue_max_size: usize,
    pub queue_growth_rate: f64,
    /// Turn isolated cycles into loop edges instead of dropping them.
    pub keep_perfect_loops: bool,
}

impl Default for CondenseParams {
    fn default() -> Self {
        Self {
            queue_min_size: 100,
            queue_max_size: 10_000,
            queue_growth_rate: 1.2,
            keep_perfect_loops: true,
        }
    }
}

/// One non-branching run of k-mers, in walking order.
#[derive(Debug)]
struct Chain {
    kmers: Vec<Kmer>,
    is_cycle: bool,
}

fn single_base(mask: u8) -> u8 {
    mask_bases(mask).next().unwrap_or(0)
}

/// Walks from `seed` back to the start of its chain, then forward to the end.
fn discover_chain<A: Adjacency>(adj: &A, seed: Kmer) -> Chain {
    let mut start = seed;
    let mut is_cycle = false;
    loop {
        let v = start.prefix();
        if !adj.is_simple(&v) {
            break;
        }
        let prev = v.extend_left(single_base(adj.incoming(&v)));
        if prev == seed {
            is_cycle = true;
            break;
        }
        start = prev;
    }
    if is_cycle {
        start = seed;
    }

    let mut kmers = vec![start];
    let mut cur = start;
    loop {
        let w = cur.suffix();
        if !adj.is_simple(&w) {
            break;
        }
        let next = w.extend_right(single_base(adj.outgoing(&w)));
        if next == start {
            break;
        }
        kmers.push(next);
        cur = next;
    }

    if is_cycle {
        let members: AHashSet<Kmer> = kmers.iter().copied().collect();
        if members.contains(&start.reverse_complement()) {
            if let Some(pos) = kmers.iter().position(|x| x.prefix().is_palindrome()) {
                kmers.rotate_left(pos);
            }
        }
    }

    Chain { kmers, is_cycle }
}

fn chain_sequence(kmers: &[Kmer]) -> Vec<u8> {
    let mut seq = kmers[0].to_bytes();
    seq.extend(kmers[1..].iter().map(|x| decode_base(x.last())));
    seq
}

/// Builds the condensed graph of every k-mer reachable through `adj`.
///
/// Seeds are swept in sorted order in batches of growing size; the chains of
/// a batch are discovered in parallel and emitted sequentially, so the result
/// does not depend on the thread count.
pub fn condense<A: Adjacency>(adj: &A, params: &CondenseParams) -> AssemblyGraph {
    let k = adj.k();
    let seeds = adj.seeds();
    info!("Condensing {} k-mers into edges", seeds.len());

    let mut graph = AssemblyGraph::new(k);
    let mut used: AHashSet<Kmer> = AHashSet::with_capacity(seeds.len());
    let mut dropped_loops = 0usize;
    let mut batch_size = params.queue_min_size.max(1);
    let mut pos = 0;

    while pos < seeds.len() {
        let end = (pos + batch_size).min(seeds.len());
        let chains: Vec<Chain> = seeds[pos..end]
            .par_iter()
            .filter(|seed| !used.contains(*seed))
            .map(|&seed| discover_chain(adj, seed))
            .collect();

        for chain in chains {
            if used.contains(&chain.kmers[0].canonical()) {
                continue;
            }
            used.extend(chain.kmers.iter().map(|x| x.canonical()));
            if chain.is_cycle && !params.keep_perfect_loops {
                dropped_loops += 1;
                continue;
            }
            graph.add_edge(chain_sequence(&chain.kmers));
        }

        pos = end;
        let grown = (batch_size as f64 * params.queue_growth_rate).ceil() as usize;
        batch_size = grown.max(batch_size + 1).min(params.queue_max_size.max(1));
    }

    if dropped_loops > 0 {
        debug!("Dropped {} perfect loops", dropped_loops);
    }
    info!(
        "Condensed graph: {} edges, {} vertices",
        graph.edge_count(),
        graph.vertex_count()
    );
    graph
}
