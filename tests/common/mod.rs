#![allow(dead_code)]

use helix::io::reads::{PairedRead, ReadStreams, SingleRead, VecPairedStream, VecReadStream};
use helix::io::reads::PairedReadStreams;

/// Deterministic pseudo-random genome (xorshift64).
pub fn genome(len: usize, seed: u64) -> String {
    let mut x = seed;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            b"ACGT"[((x >> 32) & 3) as usize] as char
        })
        .collect()
}

/// Reads of `read_len` bases starting every `step` bases.
pub fn tiled_reads(genome: &str, read_len: usize, step: usize) -> Vec<String> {
    (0..=genome.len() - read_len)
        .step_by(step)
        .map(|p| genome[p..p + read_len].to_string())
        .collect()
}

pub fn single_streams(reads: &[String]) -> ReadStreams {
    vec![Box::new(VecReadStream::from_sequences(reads))]
}

/// Perfect pairs, both mates on the forward strand.
pub fn pairs(genome: &str, insert_size: usize, read_len: usize, step: usize) -> Vec<PairedRead> {
    (0..=genome.len() - insert_size)
        .step_by(step)
        .map(|p| PairedRead {
            first: SingleRead::new(format!("pair_{}/1", p), &genome[p..p + read_len]),
            second: SingleRead::new(
                format!("pair_{}/2", p),
                &genome[p + insert_size - read_len..p + insert_size],
            ),
            insert_size,
        })
        .collect()
}

pub fn paired_streams(pairs: Vec<PairedRead>) -> PairedReadStreams {
    vec![Box::new(VecPairedStream::new(pairs))]
}
