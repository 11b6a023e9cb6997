use crate::kmer::extension::ExtensionIndex;
use crate::kmer::index::KmerIndex;
use crate::kmer::kmer::Kmer;

/// Read-only view of the implicit de Bruijn graph over (k-1)-mer vertices.
///
/// Masks are 4-bit: bit `b` set in `outgoing(v)` means `v + b` is a k-mer of
/// the graph, bit `b` in `incoming(v)` means `b + v` is.
pub trait Adjacency: Sync {
    /// Edge k-mer length.
    fn k(&self) -> usize;
    fn outgoing(&self, vertex: &Kmer) -> u8;
    fn incoming(&self, vertex: &Kmer) -> u8;
    /// Canonical k-mers to start chain walks from, sorted.
    fn seeds(&self) -> Vec<Kmer>;

    fn out_degree(&self, vertex: &Kmer) -> u32 {
        self.outgoing(vertex).count_ones()
    }

    fn in_degree(&self, vertex: &Kmer) -> u32 {
        self.incoming(vertex).count_ones()
    }

    /// One way in and one way out.
    fn is_simple(&self, vertex: &Kmer) -> bool {
        self.in_degree(vertex) == 1 && self.out_degree(vertex) == 1
    }
}

impl Adjacency for KmerIndex {
    fn k(&self) -> usize {
        KmerIndex::k(self)
    }

    fn outgoing(&self, vertex: &Kmer) -> u8 {
        (0..4u8)
            .filter(|&b| self.contains(&vertex.extend_right(b)))
            .fold(0, |mask, b| mask | (1 << b))
    }

    fn incoming(&self, vertex: &Kmer) -> u8 {
        (0..4u8)
            .filter(|&b| self.contains(&vertex.extend_left(b)))
            .fold(0, |mask, b| mask | (1 << b))
    }

    fn seeds(&self) -> Vec<Kmer> {
        self.kmers()
    }
}

impl Adjacency for ExtensionIndex {
    fn k(&self) -> usize {
        ExtensionIndex::k(self)
    }

    fn outgoing(&self, vertex: &Kmer) -> u8 {
        ExtensionIndex::outgoing(self, vertex)
    }

    fn incoming(&self, vertex: &Kmer) -> u8 {
        ExtensionIndex::incoming(self, vertex)
    }

    fn seeds(&self) -> Vec<Kmer> {
        self.kmers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmer(s: &str) -> Kmer {
        Kmer::from_str(s).unwrap()
    }

    #[test]
    fn test_index_and_extension_agree() {
        let reads: [&[u8]; 3] = [b"GCTAAAGACAATTAC", b"AAGACAATTCCAGG", b"TTGTCTTTAG"];
        let counted = KmerIndex::new(7);
        let ext = ExtensionIndex::new(7);
        for read in reads {
            counted.insert_read(read);
            ext.insert_read(read);
        }
        assert_eq!(Adjacency::seeds(&counted), Adjacency::seeds(&ext));
        for v in ext.vertices() {
            assert_eq!(Adjacency::outgoing(&counted, &v), Adjacency::outgoing(&ext, &v), "{}", v);
            assert_eq!(Adjacency::incoming(&counted, &v), Adjacency::incoming(&ext, &v), "{}", v);
        }
    }

    #[test]
    fn test_branching_vertex() {
        let index = KmerIndex::new(5);
        index.insert_read(b"GGACTA");
        index.insert_read(b"GACTC");
        let v = kmer("GACT");
        assert_eq!(Adjacency::outgoing(&index, &v), (1 << 0) | (1 << 1));
        assert_eq!(Adjacency::incoming(&index, &v), 1 << 2);
        assert!(!index.is_simple(&v));
        assert_eq!(index.in_degree(&kmer("GGAC")), 0);
        assert_eq!(index.out_degree(&kmer("ACTA")), 0);
        assert_eq!(index.in_degree(&kmer("ACTA")), 1);
    }
}
