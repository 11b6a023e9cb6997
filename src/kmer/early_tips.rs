//! Tip clipping on the extension index, before any graph is built.

use crate::kmer::adjacency::Adjacency;
use crate::kmer::extension::{mask_bases, ExtensionIndex};
use crate::kmer::kmer::Kmer;
use tracing::{debug, info};

/// A dead-start chain: enters the graph at a vertex with no predecessors and
/// runs through simple vertices until the first branch point.
fn tip_from(index: &ExtensionIndex, start: &Kmer, max_length: usize) -> Option<Vec<Kmer>> {
    if index.in_degree(start) != 0 || index.out_degree(start) != 1 {
        return None;
    }
    let mut chain = Vec::new();
    let mut vertex = *start;
    loop {
        let base = mask_bases(index.outgoing(&vertex)).next()?;
        let kmer = vertex.extend_right(base);
        chain.push(kmer);
        if chain.len() > max_length {
            return None;
        }
        vertex = kmer.suffix();
        if !index.is_simple(&vertex) {
            break;
        }
    }
    // the chain must join something else, otherwise it is an isolated path
    if index.in_degree(&vertex) >= 2 {
        Some(chain)
    } else {
        None
    }
}

/// Removes tips of at most `max_length` k-mers from the index, shortest
/// first, until none are left. Returns the number of tips removed.
pub fn clip_tips_in_index(index: &ExtensionIndex, max_length: usize) -> usize {
    let mut removed = 0;
    let mut round = 0;
    loop {
        round += 1;
        let mut candidates: Vec<(usize, Kmer)> = index
            .vertices()
            .into_iter()
            .filter_map(|v| tip_from(index, &v, max_length).map(|chain| (chain.len(), v)))
            .collect();
        candidates.sort_unstable();

        let mut removed_this_round = 0;
        for (_, start) in candidates {
            // earlier removals may have turned this chain into a plain path
            if let Some(chain) = tip_from(index, &start, max_length) {
                for kmer in &chain {
                    index.remove_kmer(kmer);
                }
                removed_this_round += 1;
            }
        }
        debug!("Early tip clipping round {}: {} tips", round, removed_this_round);
        if removed_this_round == 0 {
            break;
        }
        removed += removed_this_round;
    }
    info!("Early tip clipping removed {} tips (max length {})", removed, max_length);
    removed
}
