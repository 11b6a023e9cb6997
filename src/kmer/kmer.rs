//! Packed nucleotide k-mers.
//!
//! A `Kmer` stores up to [`MAX_K`] bases, two bits per base, most significant
//! bits first: base `i` lives in `words[i / 32]` at bit offset
//! `62 - 2 * (i % 32)`. Bits past `len` are always zero, so the derived
//! ordering on equal-length k-mers is lexicographic over `A < C < G < T`.

use crate::error::{Error, Result};
use std::fmt;

/// Largest supported k-mer length.
pub const MAX_K: usize = 127;

const WORDS: usize = 4;

/// Encodes a nucleotide as 2 bits (`A=0, C=1, G=2, T=3`).
#[inline]
pub fn encode_base(b: u8) -> Option<u8> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
pub fn decode_base(code: u8) -> u8 {
    b"ACGT"[(code & 3) as usize]
}

#[inline]
pub fn complement(code: u8) -> u8 {
    3 - code
}

/// Reverse complement of a nucleotide string. Anything outside ACGT becomes `N`.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match encode_base(b) {
            Some(code) => decode_base(complement(code)),
            None => b'N',
        })
        .collect()
}

/// Checks that `k` can be used as the edge k-mer length of a graph.
///
/// `k` must be odd so that no k-mer is its own reverse complement.
pub fn validate_k(k: usize) -> Result<()> {
    if k < 3 || k > MAX_K {
        return Err(Error::InvalidK {
            k,
            reason: "must be between 3 and 127",
        });
    }
    if k % 2 == 0 {
        return Err(Error::InvalidK {
            k,
            reason: "must be odd",
        });
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kmer {
    words: [u64; WORDS],
    len: u8,
}

impl Kmer {
    /// A k-mer of `len` bases, all `A`.
    pub fn zeros(len: usize) -> Self {
        assert!(len <= MAX_K, "k-mer length {} exceeds {}", len, MAX_K);
        Self {
            words: [0; WORDS],
            len: len as u8,
        }
    }

    pub fn from_bytes(seq: &[u8]) -> Option<Self> {
        if seq.len() > MAX_K {
            return None;
        }
        let mut kmer = Self::zeros(seq.len());
        for (i, &b) in seq.iter().enumerate() {
            kmer.set(i, encode_base(b)?);
        }
        Some(kmer)
    }

    pub fn from_str(seq: &str) -> Option<Self> {
        Self::from_bytes(seq.as_bytes())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 2-bit code of base `i`.
    #[inline]
    pub fn get(&self, i: usize) -> u8 {
        debug_assert!(i < self.len());
        ((self.words[i / 32] >> (62 - 2 * (i % 32))) & 3) as u8
    }

    #[inline]
    pub fn set(&mut self, i: usize, code: u8) {
        debug_assert!(i < self.len());
        let shift = 62 - 2 * (i % 32);
        let word = &mut self.words[i / 32];
        *word = (*word & !(3u64 << shift)) | (((code & 3) as u64) << shift);
    }

    #[inline]
    pub fn first(&self) -> u8 {
        self.get(0)
    }

    #[inline]
    pub fn last(&self) -> u8 {
        self.get(self.len() - 1)
    }

    fn shift_left(&mut self) {
        for w in 0..WORDS {
            let carry = if w + 1 < WORDS { self.words[w + 1] >> 62 } else { 0 };
            self.words[w] = (self.words[w] << 2) | carry;
        }
    }

    fn shift_right(&mut self) {
        for w in (0..WORDS).rev() {
            let carry = if w > 0 { self.words[w - 1] << 62 } else { 0 };
            self.words[w] = (self.words[w] >> 2) | carry;
        }
    }

    fn clear_tail(&mut self) {
        let len = self.len();
        for w in 0..WORDS {
            let start = w * 32;
            if len <= start {
                self.words[w] = 0;
            } else if len < start + 32 {
                let used = 2 * (len - start);
                self.words[w] &= !(u64::MAX >> used);
            }
        }
    }

    /// Drops the first base and appends `code`, keeping the length.
    pub fn push_back(&mut self, code: u8) {
        self.shift_left();
        let last = self.len() - 1;
        self.set(last, code);
    }

    /// Drops the last base and prepends `code`, keeping the length.
    pub fn push_front(&mut self, code: u8) {
        self.shift_right();
        self.clear_tail();
        self.set(0, code);
    }

    /// The first `len - 1` bases.
    pub fn prefix(&self) -> Self {
        let mut out = *self;
        out.len -= 1;
        out.clear_tail();
        out
    }

    /// The last `len - 1` bases.
    pub fn suffix(&self) -> Self {
        let mut out = *self;
        out.shift_left();
        out.len -= 1;
        out.clear_tail();
        out
    }

    /// `self` followed by `code`, one base longer.
    pub fn extend_right(&self, code: u8) -> Self {
        let mut out = *self;
        out.len += 1;
        let last = out.len() - 1;
        out.set(last, code);
        out
    }

    /// `code` followed by `self`, one base longer.
    pub fn extend_left(&self, code: u8) -> Self {
        let mut out = *self;
        out.shift_right();
        out.len += 1;
        out.clear_tail();
        out.set(0, code);
        out
    }

    pub fn reverse_complement(&self) -> Self {
        let len = self.len();
        let mut out = Self::zeros(len);
        for i in 0..len {
            out.set(len - 1 - i, complement(self.get(i)));
        }
        out
    }

    /// The lexicographically smaller of the k-mer and its reverse complement.
    pub fn canonical(&self) -> Self {
        let rc = self.reverse_complement();
        if rc < *self {
            rc
        } else {
            *self
        }
    }

    #[inline]
    pub fn is_canonical(&self) -> bool {
        *self <= self.reverse_complement()
    }

    pub fn is_palindrome(&self) -> bool {
        *self == self.reverse_complement()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        (0..self.len()).map(|i| decode_base(self.get(i))).collect()
    }
}

impl fmt::Display for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            write!(f, "{}", decode_base(self.get(i)) as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kmer({})", self)
    }
}

/// Rolling iterator over the k-mers of a read, yielding `(offset, kmer)`.
///
/// Windows that contain a character outside ACGT are skipped; the window
/// restarts after the offending base.
pub struct KmerIter<'a> {
    seq: &'a [u8],
    k: usize,
    pos: usize,
    run: usize,
    current: Kmer,
}

impl<'a> KmerIter<'a> {
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        Self {
            seq,
            k,
            pos: 0,
            run: 0,
            current: Kmer::zeros(k),
        }
    }
}

impl<'a> Iterator for KmerIter<'a> {
    type Item = (usize, Kmer);

    fn next(&mut self) -> Option<Self::Item> {
        if self.k == 0 {
            return None;
        }
        while self.pos < self.seq.len() {
            let b = self.seq[self.pos];
            self.pos += 1;
            match encode_base(b) {
                Some(code) => {
                    self.current.push_back(code);
                    self.run += 1;
                    if self.run >= self.k {
                        return Some((self.pos - self.k, self.current));
                    }
                }
                None => self.run = 0,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_display() {
        let s = "GATTACAGCTGTAATC";
        let kmer = Kmer::from_str(s).unwrap();
        assert_eq!(kmer.len(), 16);
        assert_eq!(kmer.to_string(), s);
        assert!(Kmer::from_str("ACGN").is_none());
    }

    #[test]
    fn test_long_kmer_spans_words() {
        let s: String = "ACGTTGCA".repeat(15) + "ACGTTGC";
        assert_eq!(s.len(), 127);
        let kmer = Kmer::from_str(&s).unwrap();
        assert_eq!(kmer.to_string(), s);
        assert_eq!(kmer.prefix().to_string(), &s[..126]);
        assert_eq!(kmer.suffix().to_string(), &s[1..]);
        let rc = String::from_utf8(reverse_complement(s.as_bytes())).unwrap();
        assert_eq!(kmer.reverse_complement().to_string(), rc);
    }

    #[test]
    fn test_shifts_and_extensions() {
        let mut kmer = Kmer::from_str("ACGTA").unwrap();
        kmer.push_back(1);
        assert_eq!(kmer.to_string(), "CGTAC");
        kmer.push_front(3);
        assert_eq!(kmer.to_string(), "TCGTA");
        assert_eq!(kmer.extend_right(2).to_string(), "TCGTAG");
        assert_eq!(kmer.extend_left(0).to_string(), "ATCGTA");
        assert_eq!(kmer.prefix().extend_right(kmer.last()), kmer);
        assert_eq!(kmer.suffix().extend_left(kmer.first()), kmer);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Kmer::from_str("ACGTT").unwrap();
        let b = Kmer::from_str("ACGTTA").unwrap().prefix();
        assert_eq!(a, b);
        assert!(Kmer::from_str("AACGT").unwrap() < Kmer::from_str("ACAAA").unwrap());
        assert!(Kmer::from_str("CAAAA").unwrap() < Kmer::from_str("GAAAA").unwrap());
    }

    #[test]
    fn test_canonical() {
        let kmer = Kmer::from_str("TTACG").unwrap();
        assert_eq!(kmer.canonical().to_string(), "CGTAA");
        assert!(!kmer.is_canonical());
        assert!(kmer.canonical().is_canonical());
        assert!(Kmer::from_str("ACGT").unwrap().is_palindrome());
        assert!(!Kmer::from_str("ACG").unwrap().is_palindrome());
    }

    #[test]
    fn test_kmer_iter_skips_ambiguous_bases() {
        let seq = b"ACGTNACGTAC";
        let kmers: Vec<(usize, String)> = KmerIter::new(seq, 3)
            .map(|(pos, k)| (pos, k.to_string()))
            .collect();
        assert_eq!(
            kmers,
            vec![
                (0, "ACG".to_string()),
                (1, "CGT".to_string()),
                (5, "ACG".to_string()),
                (6, "CGT".to_string()),
                (7, "GTA".to_string()),
                (8, "TAC".to_string()),
            ]
        );
        assert_eq!(KmerIter::new(b"AC", 3).count(), 0);
    }

    #[test]
    fn test_validate_k() {
        assert!(validate_k(21).is_ok());
        assert!(validate_k(127).is_ok());
        assert!(validate_k(22).is_err());
        assert!(validate_k(1).is_err());
        assert!(validate_k(129).is_err());
    }
}
