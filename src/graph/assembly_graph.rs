//! Arena-backed assembly graph with strand-conjugate edges and vertices.
//!
//! Every edge `e` has a conjugate edge carrying its reverse complement, and
//! every vertex a conjugate vertex; the pair is created and removed together.
//! An edge whose sequence is its own reverse complement is its own conjugate,
//! likewise a palindromic vertex.

use crate::kmer::kmer::{reverse_complement, Kmer};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct EdgeData {
    sequence: Vec<u8>,
    start: VertexId,
    end: VertexId,
    conjugate: EdgeId,
    raw_coverage: u32,
}

#[derive(Clone, Debug)]
struct VertexData {
    kmer: Kmer,
    conjugate: VertexId,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

#[derive(Clone, Debug)]
pub struct AssemblyGraph {
    k: usize,
    edges: Vec<Option<EdgeData>>,
    vertices: Vec<Option<VertexData>>,
    vertex_lookup: AHashMap<Kmer, VertexId>,
}

impl AssemblyGraph {
    /// An empty graph whose edges are made of `k`-mers.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            edges: Vec::new(),
            vertices: Vec::new(),
            vertex_lookup: AHashMap::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn edge(&self, e: EdgeId) -> &EdgeData {
        self.edges
            .get(e.0)
            .and_then(|d| d.as_ref())
            .unwrap_or_else(|| panic!("edge {} does not exist", e))
    }

    fn edge_mut(&mut self, e: EdgeId) -> &mut EdgeData {
        self.edges
            .get_mut(e.0)
            .and_then(|d| d.as_mut())
            .unwrap_or_else(|| panic!("edge {} does not exist", e.0))
    }

    fn vertex(&self, v: VertexId) -> &VertexData {
        self.vertices
            .get(v.0)
            .and_then(|d| d.as_ref())
            .unwrap_or_else(|| panic!("vertex {} does not exist", v.0))
    }

    fn vertex_mut(&mut self, v: VertexId) -> &mut VertexData {
        self.vertices
            .get_mut(v.0)
            .and_then(|d| d.as_mut())
            .unwrap_or_else(|| panic!("vertex {} does not exist", v.0))
    }

    pub fn contains_edge(&self, e: EdgeId) -> bool {
        matches!(self.edges.get(e.0), Some(Some(_)))
    }

    /// Live edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(i, _)| EdgeId(i))
    }

    /// One edge of every conjugate pair: the one with the smaller id.
    pub fn edge_pairs(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges().filter(move |&e| e <= self.conjugate(e))
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(i, _)| VertexId(i))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|d| d.is_some()).count()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_lookup.len()
    }

    pub fn sequence(&self, e: EdgeId) -> &[u8] {
        &self.edge(e).sequence
    }

    /// Length in k-mers.
    pub fn length(&self, e: EdgeId) -> usize {
        self.edge(e).sequence.len() + 1 - self.k
    }

    pub fn start(&self, e: EdgeId) -> VertexId {
        self.edge(e).start
    }

    pub fn end(&self, e: EdgeId) -> VertexId {
        self.edge(e).end
    }

    pub fn conjugate(&self, e: EdgeId) -> EdgeId {
        self.edge(e).conjugate
    }

    pub fn is_self_conjugate(&self, e: EdgeId) -> bool {
        self.conjugate(e) == e
    }

    pub fn raw_coverage(&self, e: EdgeId) -> u32 {
        self.edge(e).raw_coverage
    }

    /// Mean k-mer multiplicity along the edge.
    pub fn coverage(&self, e: EdgeId) -> f64 {
        self.raw_coverage(e) as f64 / self.length(e) as f64
    }

    /// Sets the raw coverage of `e` and its conjugate.
    pub fn set_raw_coverage(&mut self, e: EdgeId, value: u32) {
        let conj = self.conjugate(e);
        self.edge_mut(e).raw_coverage = value;
        self.edge_mut(conj).raw_coverage = value;
    }

    /// Adds to the raw coverage of `e` and, if distinct, its conjugate.
    pub fn add_raw_coverage(&mut self, e: EdgeId, amount: u32) {
        let value = self.raw_coverage(e).saturating_add(amount);
        self.set_raw_coverage(e, value);
    }

    pub fn reset_coverage(&mut self) {
        for data in self.edges.iter_mut().flatten() {
            data.raw_coverage = 0;
        }
    }

    pub fn vertex_kmer(&self, v: VertexId) -> Kmer {
        self.vertex(v).kmer
    }

    pub fn find_vertex(&self, kmer: &Kmer) -> Option<VertexId> {
        self.vertex_lookup.get(kmer).copied()
    }

    pub fn conjugate_vertex(&self, v: VertexId) -> VertexId {
        self.vertex(v).conjugate
    }

    pub fn outgoing(&self, v: VertexId) -> &[EdgeId] {
        &self.vertex(v).outgoing
    }

    pub fn incoming(&self, v: VertexId) -> &[EdgeId] {
        &self.vertex(v).incoming
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.vertex(v).outgoing.len()
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.vertex(v).incoming.len()
    }

    fn get_or_add_vertex(&mut self, kmer: Kmer) -> VertexId {
        if let Some(&v) = self.vertex_lookup.get(&kmer) {
            return v;
        }
        let rc = kmer.reverse_complement();
        let v = VertexId(self.vertices.len());
        if rc == kmer {
            self.vertices.push(Some(VertexData {
                kmer,
                conjugate: v,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            }));
            self.vertex_lookup.insert(kmer, v);
        } else {
            let w = VertexId(v.0 + 1);
            for (id, km, conj) in [(v, kmer, w), (w, rc, v)] {
                self.vertices.push(Some(VertexData {
                    kmer: km,
                    conjugate: conj,
                    incoming: Vec::new(),
                    outgoing: Vec::new(),
                }));
                self.vertex_lookup.insert(km, id);
            }
        }
        v
    }

    fn vertex_kmer_of(&self, seq: &[u8]) -> Kmer {
        Kmer::from_bytes(seq).unwrap_or_else(|| {
            panic!(
                "edge sequence contains a non-ACGT base: {}",
                String::from_utf8_lossy(seq)
            )
        })
    }

    fn push_edge(&mut self, sequence: Vec<u8>, start: VertexId, end: VertexId) -> EdgeId {
        let e = EdgeId(self.edges.len());
        self.edges.push(Some(EdgeData {
            sequence,
            start,
            end,
            conjugate: e,
            raw_coverage: 0,
        }));
        self.vertex_mut(start).outgoing.push(e);
        self.vertex_mut(end).incoming.push(e);
        e
    }

    /// Adds an edge spelling `sequence` together with its conjugate and
    /// returns the id of the forward edge.
    pub fn add_edge(&mut self, sequence: Vec<u8>) -> EdgeId {
        let k = self.k;
        assert!(
            sequence.len() >= k,
            "edge sequence of length {} is shorter than k={}",
            sequence.len(),
            k
        );
        let start_kmer = self.vertex_kmer_of(&sequence[..k - 1]);
        let end_kmer = self.vertex_kmer_of(&sequence[sequence.len() + 1 - k..]);
        let start = self.get_or_add_vertex(start_kmer);
        let end = self.get_or_add_vertex(end_kmer);

        let rc = reverse_complement(&sequence);
        let self_conjugate = rc == sequence;
        let e = self.push_edge(sequence, start, end);
        if !self_conjugate {
            let conj_start = self.conjugate_vertex(end);
            let conj_end = self.conjugate_vertex(start);
            let c = self.push_edge(rc, conj_start, conj_end);
            self.edge_mut(e).conjugate = c;
            self.edge_mut(c).conjugate = e;
        }
        e
    }

    fn unlink_edge(&mut self, e: EdgeId) -> (VertexId, VertexId) {
        let (start, end) = (self.start(e), self.end(e));
        self.vertex_mut(start).outgoing.retain(|&x| x != e);
        self.vertex_mut(end).incoming.retain(|&x| x != e);
        self.edges[e.0] = None;
        (start, end)
    }

    fn is_isolated(&self, v: VertexId) -> bool {
        let data = self.vertex(v);
        data.incoming.is_empty() && data.outgoing.is_empty()
    }

    fn remove_vertex_if_isolated(&mut self, v: VertexId) {
        if self.vertices[v.0].is_none() {
            return;
        }
        let conj = self.conjugate_vertex(v);
        if self.is_isolated(v) && self.is_isolated(conj) {
            for id in [v, conj] {
                if let Some(data) = self.vertices[id.0].take() {
                    self.vertex_lookup.remove(&data.kmer);
                }
            }
        }
    }

    /// Removes `e` and its conjugate, then any vertex left without edges.
    pub fn delete_edge(&mut self, e: EdgeId) {
        let conj = self.conjugate(e);
        let mut touched = Vec::with_capacity(4);
        let (s, t) = self.unlink_edge(e);
        touched.extend([s, t]);
        if conj != e {
            let (s, t) = self.unlink_edge(conj);
            touched.extend([s, t]);
        }
        for v in touched {
            self.remove_vertex_if_isolated(v);
        }
    }

    /// A vertex that can be removed by merging its single in-edge with its
    /// single out-edge.
    pub fn can_compress(&self, v: VertexId) -> bool {
        let data = self.vertex(v);
        data.incoming.len() == 1 && data.outgoing.len() == 1 && data.incoming[0] != data.outgoing[0]
    }

    fn merged_sequence(&self, path: &[EdgeId]) -> Vec<u8> {
        let mut seq = self.sequence(path[0]).to_vec();
        for &e in &path[1..] {
            seq.extend_from_slice(&self.sequence(e)[self.k - 1..]);
        }
        seq
    }

    /// Maximal non-branching path through `e`, or `None` if `e` cannot be
    /// extended in either direction.
    fn unbranching_path(&self, e: EdgeId) -> Option<Vec<EdgeId>> {
        let mut first = e;
        let mut is_cycle = false;
        while self.can_compress(self.start(first)) {
            let prev = self.incoming(self.start(first))[0];
            if prev == e {
                is_cycle = true;
                break;
            }
            first = prev;
        }

        let mut path = vec![first];
        let mut cur = first;
        while self.can_compress(self.end(cur)) {
            let next = self.outgoing(self.end(cur))[0];
            if next == first {
                break;
            }
            path.push(next);
            cur = next;
        }

        if path.len() < 2 {
            return None;
        }

        if is_cycle {
            let members: AHashSet<EdgeId> = path.iter().copied().collect();
            if members.contains(&self.conjugate(e)) {
                // a strand-symmetric cycle must open at a palindromic vertex,
                // otherwise the merged loop would not be its own conjugate
                let pos = path
                    .iter()
                    .position(|&x| self.conjugate_vertex(self.start(x)) == self.start(x))?;
                path.rotate_left(pos);
            }
        }
        Some(path)
    }

    /// Merges every maximal non-branching path into a single edge. Returns
    /// the number of merged paths (conjugate pairs counted once).
    pub fn compress_all(&mut self) -> usize {
        let ids: Vec<EdgeId> = self.edges().collect();
        let mut merged = 0;
        for e in ids {
            if !self.contains_edge(e) {
                continue;
            }
            let path = match self.unbranching_path(e) {
                Some(p) => p,
                None => continue,
            };
            self.merge_path(&path);
            merged += 1;
        }
        merged
    }

    /// Replaces a path of edges by one edge spelling the merged sequence.
    pub fn merge_path(&mut self, path: &[EdgeId]) -> EdgeId {
        let sequence = self.merged_sequence(path);
        let representatives: AHashSet<EdgeId> = path
            .iter()
            .map(|&x| x.min(self.conjugate(x)))
            .collect();
        let coverage = representatives
            .iter()
            .fold(0u32, |acc, &x| acc.saturating_add(self.raw_coverage(x)));

        let new_edge = self.add_edge(sequence);
        for &x in path {
            if self.contains_edge(x) {
                self.delete_edge(x);
            }
        }
        self.set_raw_coverage(new_edge, coverage);
        new_edge
    }

    /// Panics if the conjugate structure or vertex bookkeeping is broken.
    pub fn verify_invariants(&self) {
        let k = self.k;
        for e in self.edges() {
            let c = self.conjugate(e);
            assert!(self.contains_edge(c), "edge {} has a dangling conjugate {}", e, c);
            assert_eq!(self.conjugate(c), e, "conjugate of conjugate of {} is not itself", e);
            assert_eq!(
                self.sequence(c),
                reverse_complement(self.sequence(e)).as_slice(),
                "edge {} and its conjugate {} are not reverse complements",
                e,
                c
            );
            assert_eq!(self.raw_coverage(e), self.raw_coverage(c), "coverage of {} and {} differ", e, c);
            assert_eq!(
                self.start(c),
                self.conjugate_vertex(self.end(e)),
                "conjugate of {} does not start at the conjugate of its end",
                e
            );
            let seq = self.sequence(e);
            assert_eq!(self.vertex_kmer(self.start(e)).to_bytes(), &seq[..k - 1]);
            assert_eq!(self.vertex_kmer(self.end(e)).to_bytes(), &seq[seq.len() + 1 - k..]);
            assert!(self.outgoing(self.start(e)).contains(&e));
            assert!(self.incoming(self.end(e)).contains(&e));
        }
        for v in self.vertices() {
            let w = self.conjugate_vertex(v);
            assert_eq!(self.conjugate_vertex(w), v, "vertex conjugation is not an involution");
            assert_eq!(self.vertex_kmer(w), self.vertex_kmer(v).reverse_complement());
            assert_eq!(self.in_degree(v), self.out_degree(w));
            assert_eq!(self.find_vertex(&self.vertex_kmer(v)), Some(v));
        }
    }
}
