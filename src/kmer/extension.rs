//! (k-1)-mer adjacency masks.
//!
//! Every canonical vertex carries one byte: the low nibble holds the bases
//! that may follow it, the high nibble the bases that may precede it, both
//! relative to the canonical orientation. The reverse complement of a vertex
//! reads the same byte with the nibbles swapped and complemented.

use crate::error::Result;
use crate::io::reads::{for_each_read, ReadStreams};
use crate::kmer::kmer::{complement, validate_k, Kmer, KmerIter};
use ahash::AHashSet;
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::info;

/// Maps bit `b` of a 4-bit mask to bit `3 - b`.
#[inline]
pub fn complement_mask(mask: u8) -> u8 {
    ((mask & 1) << 3) | ((mask & 2) << 1) | ((mask & 4) >> 1) | ((mask & 8) >> 3)
}

/// Iterates the 2-bit codes set in a 4-bit mask.
pub fn mask_bases(mask: u8) -> impl Iterator<Item = u8> {
    (0..4u8).filter(move |b| mask & (1 << b) != 0)
}

pub struct ExtensionIndex {
    k: usize,
    masks: DashMap<Kmer, u8, ahash::RandomState>,
}

impl ExtensionIndex {
    /// `k` is the edge k-mer length; keys are (k-1)-mers.
    pub fn new(k: usize) -> Self {
        assert!(validate_k(k).is_ok(), "invalid k-mer length {}", k);
        Self {
            k,
            masks: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    pub fn build(k: usize, streams: &mut ReadStreams) -> Result<(Self, usize)> {
        validate_k(k)?;
        let index = Self::new(k);
        info!("Collecting {}-mer extensions from {} read stream(s)", k, streams.len());
        let read_length = for_each_read(streams, |read| index.insert_read(read.sequence.as_bytes()))?;
        info!(
            "Extension index holds {} vertices, max read length {}",
            index.vertex_count(),
            read_length
        );
        Ok((index, read_length))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn vertex_count(&self) -> usize {
        self.masks.len()
    }

    pub fn insert_read(&self, seq: &[u8]) {
        for (_, kmer) in KmerIter::new(seq, self.k) {
            self.add_kmer(&kmer);
        }
    }

    fn set_bit(&self, vertex: &Kmer, bit: u8) {
        *self.masks.entry(*vertex).or_insert(0) |= 1 << bit;
    }

    fn clear_bit(&self, vertex: &Kmer, bit: u8) {
        if let Some(mut mask) = self.masks.get_mut(vertex) {
            *mask &= !(1 << bit);
        }
        self.masks.remove_if(vertex, |_, mask| *mask == 0);
    }

    /// Bit position of "`base` follows `vertex`" in the canonical record.
    fn out_bit(vertex: &Kmer, base: u8) -> (Kmer, u8) {
        if vertex.is_canonical() {
            (*vertex, base)
        } else {
            (vertex.reverse_complement(), 4 + complement(base))
        }
    }

    /// Bit position of "`base` precedes `vertex`" in the canonical record.
    fn in_bit(vertex: &Kmer, base: u8) -> (Kmer, u8) {
        if vertex.is_canonical() {
            (*vertex, 4 + base)
        } else {
            (vertex.reverse_complement(), complement(base))
        }
    }

    /// The four mask bits touched by a k-mer. Both strands are listed so that
    /// palindromic vertices record the link on each side.
    fn kmer_bits(kmer: &Kmer) -> [(Kmer, u8); 4] {
        let rc = kmer.reverse_complement();
        [
            Self::out_bit(&kmer.prefix(), kmer.last()),
            Self::in_bit(&kmer.suffix(), kmer.first()),
            Self::out_bit(&rc.prefix(), rc.last()),
            Self::in_bit(&rc.suffix(), rc.first()),
        ]
    }

    pub fn add_kmer(&self, kmer: &Kmer) {
        debug_assert_eq!(kmer.len(), self.k);
        for (v, bit) in Self::kmer_bits(kmer) {
            self.set_bit(&v, bit);
        }
    }

    pub fn remove_kmer(&self, kmer: &Kmer) {
        debug_assert_eq!(kmer.len(), self.k);
        for (v, bit) in Self::kmer_bits(kmer) {
            self.clear_bit(&v, bit);
        }
    }

    pub fn contains_kmer(&self, kmer: &Kmer) -> bool {
        self.outgoing(&kmer.prefix()) & (1 << kmer.last()) != 0
    }

    /// Bases `b` such that `vertex + b` is a k-mer.
    pub fn outgoing(&self, vertex: &Kmer) -> u8 {
        if vertex.is_canonical() {
            self.masks.get(vertex).map(|m| *m & 0xF).unwrap_or(0)
        } else {
            let rc = vertex.reverse_complement();
            self.masks
                .get(&rc)
                .map(|m| complement_mask(*m >> 4))
                .unwrap_or(0)
        }
    }

    /// Bases `b` such that `b + vertex` is a k-mer.
    pub fn incoming(&self, vertex: &Kmer) -> u8 {
        if vertex.is_canonical() {
            self.masks.get(vertex).map(|m| *m >> 4).unwrap_or(0)
        } else {
            let rc = vertex.reverse_complement();
            self.masks
                .get(&rc)
                .map(|m| complement_mask(*m & 0xF))
                .unwrap_or(0)
        }
    }

    /// Every vertex in both orientations (palindromes once), sorted.
    pub fn vertices(&self) -> Vec<Kmer> {
        let mut out: Vec<Kmer> = self
            .masks
            .iter()
            .flat_map(|e| {
                let v = *e.key();
                let rc = v.reverse_complement();
                if rc == v {
                    vec![v]
                } else {
                    vec![v, rc]
                }
            })
            .collect();
        out.par_sort_unstable();
        out
    }

    /// Canonical k-mers implied by the masks, sorted.
    pub fn kmers(&self) -> Vec<Kmer> {
        let set: AHashSet<Kmer> = self
            .masks
            .iter()
            .flat_map(|e| {
                let v = *e.key();
                let mask = *e.value();
                let right = mask_bases(mask & 0xF).map(move |b| v.extend_right(b).canonical());
                let left = mask_bases(mask >> 4).map(move |b| v.extend_left(b).canonical());
                right.chain(left).collect::<Vec<_>>()
            })
            .collect();
        let mut kmers: Vec<Kmer> = set.into_iter().collect();
        kmers.par_sort_unstable();
        kmers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::reads::VecReadStream;

    fn kmer(s: &str) -> Kmer {
        Kmer::from_str(s).unwrap()
    }

    #[test]
    fn test_complement_mask() {
        assert_eq!(complement_mask(0b0001), 0b1000);
        assert_eq!(complement_mask(0b0110), 0b0110);
        assert_eq!(complement_mask(0b1100), 0b0011);
    }

    #[test]
    fn test_masks_are_strand_symmetric() {
        let index = ExtensionIndex::new(5);
        index.add_kmer(&kmer("ACGTT"));
        // ACGT + T, and the reverse complement AACGT has A before ACGT
        assert_eq!(index.outgoing(&kmer("ACGT")), 1 << 3);
        assert_eq!(index.incoming(&kmer("CGTT")), 1 << 0);
        assert_eq!(index.outgoing(&kmer("AACG")), 1 << 3);
        assert_eq!(index.incoming(&kmer("ACGT")), 1 << 0);
        assert!(index.contains_kmer(&kmer("ACGTT")));
        assert!(index.contains_kmer(&kmer("AACGT")));
        assert_eq!(index.kmers(), vec![kmer("AACGT")]);
    }

    #[test]
    fn test_remove_kmer_clears_masks() {
        let index = ExtensionIndex::new(5);
        index.add_kmer(&kmer("GATTA"));
        index.add_kmer(&kmer("ATTAC"));
        index.remove_kmer(&kmer("GATTA"));
        assert!(!index.contains_kmer(&kmer("GATTA")));
        assert!(index.contains_kmer(&kmer("ATTAC")));
        assert_eq!(index.incoming(&kmer("ATTA")), 0);
        assert_eq!(index.vertex_count(), 2);
        index.remove_kmer(&kmer("ATTAC"));
        assert_eq!(index.vertex_count(), 0);
    }

    #[test]
    fn test_build_matches_counted_kmers() {
        let mut streams: crate::io::reads::ReadStreams =
            vec![Box::new(VecReadStream::from_sequences(&["GATTACAGCT", "AGCTGTAATC"]))];
        let (index, rl) = ExtensionIndex::build(5, &mut streams).unwrap();
        assert_eq!(rl, 10);
        assert_eq!(index.kmers().len(), 6);
    }
}
