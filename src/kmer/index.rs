//! Concurrent canonical k-mer index.
//!
//! Construction streams every read once; per-k-mer updates go through the
//! `DashMap` shard locks so no lock ever spans more than one k-mer.

use crate::error::{Error, Result};
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::io::reads::{for_each_read, ReadStreams};
use crate::kmer::kmer::{validate_k, Kmer, KmerIter};
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info};

/// What the index knows about one canonical k-mer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KmerEntry {
    pub count: u32,
    /// Edge holding the canonical orientation, once the graph exists.
    pub edge: Option<EdgeId>,
    pub offset: u32,
}

pub struct KmerIndex {
    k: usize,
    map: DashMap<Kmer, KmerEntry, ahash::RandomState>,
}

impl KmerIndex {
    pub fn new(k: usize) -> Self {
        assert!(validate_k(k).is_ok(), "invalid k-mer length {}", k);
        Self {
            k,
            map: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Counts every k-mer of every read. Returns the index and the longest
    /// read length observed.
    pub fn build(k: usize, streams: &mut ReadStreams) -> Result<(Self, usize)> {
        validate_k(k)?;
        let index = Self::new(k);
        info!("Counting {}-mers from {} read stream(s)", k, streams.len());
        let read_length = for_each_read(streams, |read| index.insert_read(read.sequence.as_bytes()))?;
        info!(
            "Indexed {} distinct k-mers ({} occurrences), max read length {}",
            index.len(),
            index.total_multiplicity(),
            read_length
        );
        Ok((index, read_length))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn insert_read(&self, seq: &[u8]) {
        for (_, kmer) in KmerIter::new(seq, self.k) {
            let mut entry = self.map.entry(kmer.canonical()).or_default();
            entry.count = entry.count.saturating_add(1);
        }
    }

    /// Looks a k-mer up in either orientation.
    pub fn get(&self, kmer: &Kmer) -> Option<KmerEntry> {
        self.map.get(&kmer.canonical()).map(|e| *e)
    }

    pub fn contains(&self, kmer: &Kmer) -> bool {
        self.map.contains_key(&kmer.canonical())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn total_multiplicity(&self) -> u64 {
        self.map.iter().map(|e| e.count as u64).sum()
    }

    /// All canonical k-mers, sorted.
    pub fn kmers(&self) -> Vec<Kmer> {
        let mut kmers: Vec<Kmer> = self.map.iter().map(|e| *e.key()).collect();
        kmers.par_sort_unstable();
        kmers
    }

    pub fn entries(&self) -> Vec<(Kmer, KmerEntry)> {
        let mut entries: Vec<(Kmer, KmerEntry)> =
            self.map.iter().map(|e| (*e.key(), *e.value())).collect();
        entries.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn reset_counts(&self) {
        self.map.iter_mut().for_each(|mut e| e.count = 0);
    }

    /// Points every k-mer of the graph at the edge and offset holding its
    /// canonical orientation. K-mers missing from the index are added with a
    /// zero count.
    pub fn assign_edges(&self, graph: &AssemblyGraph) {
        assert_eq!(
            graph.k(),
            self.k,
            "cannot assign edges of a k={} graph to a k={} index",
            graph.k(),
            self.k
        );
        self.map.iter_mut().for_each(|mut e| e.edge = None);

        let edges: Vec<EdgeId> = graph.edges().collect();
        edges.par_iter().for_each(|&e| {
            for (offset, kmer) in KmerIter::new(graph.sequence(e), self.k) {
                if kmer.is_canonical() {
                    let mut entry = self.map.entry(kmer).or_default();
                    entry.edge = Some(e);
                    entry.offset = offset as u32;
                }
            }
        });
        debug!("Assigned {} k-mers to {} edges", self.len(), edges.len());
    }

    /// Adds one to every k-mer of the streams that is already indexed.
    pub fn count_from_streams(&self, streams: &mut ReadStreams) -> Result<usize> {
        for_each_read(streams, |read| {
            for (_, kmer) in KmerIter::new(read.sequence.as_bytes(), self.k) {
                if let Some(mut entry) = self.map.get_mut(&kmer.canonical()) {
                    entry.count = entry.count.saturating_add(1);
                }
            }
        })
    }

    /// Drops edge references so the graph can be rebuilt or reloaded.
    /// Multiplicities are kept.
    pub fn detach(self) -> DetachedIndex {
        let counts = self
            .map
            .into_iter()
            .filter(|(_, e)| e.count > 0)
            .map(|(kmer, e)| (kmer, e.count))
            .collect();
        DetachedIndex { k: self.k, counts }
    }
}

/// An index without edge references.
pub struct DetachedIndex {
    k: usize,
    counts: ahash::AHashMap<Kmer, u32>,
}

impl DetachedIndex {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            counts: ahash::AHashMap::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Rebuilds the index over the k-mers of `graph`, carrying over the
    /// multiplicities of k-mers that are still present.
    pub fn attach(self, graph: &AssemblyGraph) -> Result<KmerIndex> {
        if graph.k() != self.k {
            return Err(Error::KmerLengthMismatch {
                expected: graph.k(),
                found: self.k,
                context: Some("attaching k-mer index to graph".to_string()),
            });
        }
        let index = KmerIndex::new(self.k);
        index.assign_edges(graph);
        for (kmer, count) in self.counts {
            if let Some(mut entry) = index.map.get_mut(&kmer) {
                entry.count = count;
            }
        }
        Ok(index)
    }
}
