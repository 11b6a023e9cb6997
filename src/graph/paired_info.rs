//! Paired-read distance histograms between edges.
//!
//! A point `(e1, e2, d)` says that the start of `e2` lies `d` bases downstream
//! of the start of `e1`. Every point is stored together with its conjugate
//! `(conj(e2), conj(e1), d + len(e2) - len(e1))`.

use crate::error::Result;
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::graph::mapper::{MappingRange, SequenceMapper};
use crate::io::reads::{fold_pairs, PairedRead, PairedReadStreams};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairPoint {
    pub distance: f32,
    pub weight: f64,
    pub variance: f32,
}

impl PairPoint {
    pub fn new(distance: f32, weight: f64, variance: f32) -> Self {
        Self {
            distance,
            weight,
            variance,
        }
    }
}

/// Points sorted by distance; points at the same distance are merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Histogram {
    points: Vec<PairPoint>,
}

impl Histogram {
    pub fn insert(&mut self, point: PairPoint) {
        match self
            .points
            .binary_search_by(|p| p.distance.total_cmp(&point.distance))
        {
            Ok(i) => {
                let p = &mut self.points[i];
                p.weight += point.weight;
                p.variance = p.variance.max(point.variance);
            }
            Err(i) => self.points.insert(i, point),
        }
    }

    pub fn points(&self) -> &[PairPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PairedInfoIndex {
    map: AHashMap<(EdgeId, EdgeId), Histogram>,
}

impl PairedInfoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point for this ordered pair only.
    pub fn add_point(&mut self, e1: EdgeId, e2: EdgeId, point: PairPoint) {
        self.map.entry((e1, e2)).or_default().insert(point);
    }

    /// Adds a point and its conjugate-symmetric counterpart.
    pub fn add_symmetric(&mut self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId, point: PairPoint) {
        self.add_point(e1, e2, point);
        let c1 = graph.conjugate(e2);
        let c2 = graph.conjugate(e1);
        let distance = point.distance + graph.length(e2) as f32 - graph.length(e1) as f32;
        if (c1, c2) != (e1, e2) || distance != point.distance {
            self.add_point(c1, c2, PairPoint { distance, ..point });
        }
    }

    pub fn get(&self, e1: EdgeId, e2: EdgeId) -> Option<&Histogram> {
        self.map.get(&(e1, e2))
    }

    /// Number of edge pairs carrying points.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.map.values().map(|h| h.total_weight()).sum()
    }

    /// Entries sorted by edge pair.
    pub fn entries(&self) -> Vec<((EdgeId, EdgeId), &Histogram)> {
        let mut entries: Vec<_> = self.map.iter().map(|(k, v)| (*k, v)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    pub fn merge(&mut self, other: PairedInfoIndex) {
        for ((e1, e2), hist) in other.map {
            let target = self.map.entry((e1, e2)).or_default();
            for p in hist.points {
                target.insert(p);
            }
        }
    }

    /// Drops every entry that touches an edge no longer in the graph.
    pub fn retain_live(&mut self, graph: &AssemblyGraph) {
        self.map
            .retain(|(e1, e2), _| graph.contains_edge(*e1) && graph.contains_edge(*e2));
    }
}

/// Weight of one pair of mapping ranges.
pub fn read_count_weight(_: &MappingRange, _: &MappingRange) -> f64 {
    1.0
}

pub fn product_weight(r1: &MappingRange, r2: &MappingRange) -> f64 {
    (r1.kmers * r2.kmers) as f64
}

fn pair_distance(insert_size: usize, second_len: usize, r1: &MappingRange, r2: &MappingRange) -> f32 {
    let d = (insert_size as i64 - second_len as i64) + (r2.read_start as i64 - r2.edge_start as i64)
        - (r1.read_start as i64 - r1.edge_start as i64);
    d as f32
}

fn add_pair<M, W>(
    index: &mut PairedInfoIndex,
    graph: &AssemblyGraph,
    mapper: &M,
    pair: &PairedRead,
    weight: &W,
    variance: f32,
) where
    M: SequenceMapper,
    W: Fn(&MappingRange, &MappingRange) -> f64,
{
    let ranges1 = mapper.map_sequence(pair.first.sequence.as_bytes());
    if ranges1.is_empty() {
        return;
    }
    let ranges2 = mapper.map_sequence(pair.second.sequence.as_bytes());
    for r1 in &ranges1 {
        for r2 in &ranges2 {
            let d = pair_distance(pair.insert_size, pair.second.len(), r1, r2);
            index.add_symmetric(graph, r1.edge, r2.edge, PairPoint::new(d, weight(r1, r2), variance));
        }
    }
}

/// Fills a paired index from read pairs. Pairs with an unmapped mate are
/// skipped.
pub fn fill_paired_index<M, W>(
    graph: &AssemblyGraph,
    mapper: &M,
    streams: &mut PairedReadStreams,
    weight: W,
) -> Result<PairedInfoIndex>
where
    M: SequenceMapper,
    W: Fn(&MappingRange, &MappingRange) -> f64 + Sync + Send,
{
    let index = fold_pairs(
        streams,
        PairedInfoIndex::new,
        |mut acc, pair| {
            add_pair(&mut acc, graph, mapper, pair, &weight, 0.0);
            acc
        },
        |mut a, b| {
            a.merge(b);
            a
        },
    )?;
    info!(
        "Paired info: {} edge pairs, total weight {:.1}",
        index.len(),
        index.total_weight()
    );
    Ok(index)
}

/// Fills a paired index from every perfect insert of `genome` with the given
/// insert size and read length. The reverse strand is covered by the
/// conjugate points.
pub fn fill_etalon_paired_index<M: SequenceMapper>(
    graph: &AssemblyGraph,
    mapper: &M,
    genome: &[u8],
    insert_size: usize,
    read_length: usize,
    delta: f32,
) -> PairedInfoIndex {
    let mut index = PairedInfoIndex::new();
    if insert_size < read_length || genome.len() < insert_size {
        return index;
    }
    for p in 0..=genome.len() - insert_size {
        let first = &genome[p..p + read_length];
        let second = &genome[p + insert_size - read_length..p + insert_size];
        let pair = PairedRead {
            first: crate::io::reads::SingleRead::new("", String::from_utf8_lossy(first)),
            second: crate::io::reads::SingleRead::new("", String::from_utf8_lossy(second)),
            insert_size,
        };
        add_pair(&mut index, graph, mapper, &pair, &|_: &MappingRange, _: &MappingRange| 1.0, delta);
    }
    index
}
