//! Read stream abstraction shared by every pass over the input.
//!
//! Each pass resets the streams it is handed, so a single `ReadStreams`
//! collection can be scanned several times (index construction, coverage
//! recount, paired info).

use crate::error::{Error, Result};
use crate::kmer::kmer::reverse_complement;
use rayon::prelude::*;

/// Reads pulled from a stream before the batch is processed in parallel.
pub const BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleRead {
    pub name: String,
    pub sequence: String,
}

impl SingleRead {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn reverse_complement(&self) -> Self {
        let rc = reverse_complement(self.sequence.as_bytes());
        Self {
            name: self.name.clone(),
            sequence: String::from_utf8_lossy(&rc).into_owned(),
        }
    }
}

/// Two mates oriented on the same strand, `first` upstream of `second`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedRead {
    pub first: SingleRead,
    pub second: SingleRead,
    pub insert_size: usize,
}

pub trait ReadStream: Send {
    fn has_more(&mut self) -> bool;
    fn next_read(&mut self) -> Result<Option<SingleRead>>;
    /// Rewinds to the first read.
    fn reset(&mut self) -> Result<()>;
    fn close(&mut self);
}

pub trait PairedReadStream: Send {
    fn has_more(&mut self) -> bool;
    fn next_pair(&mut self) -> Result<Option<PairedRead>>;
    fn reset(&mut self) -> Result<()>;
    fn close(&mut self);
}

pub type ReadStreams = Vec<Box<dyn ReadStream>>;
pub type PairedReadStreams = Vec<Box<dyn PairedReadStream>>;

/// In-memory single read stream.
pub struct VecReadStream {
    reads: Vec<SingleRead>,
    pos: usize,
}

impl VecReadStream {
    pub fn new(reads: Vec<SingleRead>) -> Self {
        Self { reads, pos: 0 }
    }

    /// Builds a stream from bare sequences, naming them `read_<i>`.
    pub fn from_sequences<S: AsRef<str>>(seqs: &[S]) -> Self {
        let reads = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| SingleRead::new(format!("read_{}", i), s.as_ref()))
            .collect();
        Self::new(reads)
    }
}

impl ReadStream for VecReadStream {
    fn has_more(&mut self) -> bool {
        self.pos < self.reads.len()
    }

    fn next_read(&mut self) -> Result<Option<SingleRead>> {
        let read = self.reads.get(self.pos).cloned();
        if read.is_some() {
            self.pos += 1;
        }
        Ok(read)
    }

    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.pos = self.reads.len();
    }
}

/// In-memory paired read stream.
pub struct VecPairedStream {
    pairs: Vec<PairedRead>,
    pos: usize,
}

impl VecPairedStream {
    pub fn new(pairs: Vec<PairedRead>) -> Self {
        Self { pairs, pos: 0 }
    }
}

impl PairedReadStream for VecPairedStream {
    fn has_more(&mut self) -> bool {
        self.pos < self.pairs.len()
    }

    fn next_pair(&mut self) -> Result<Option<PairedRead>> {
        let pair = self.pairs.get(self.pos).cloned();
        if pair.is_some() {
            self.pos += 1;
        }
        Ok(pair)
    }

    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.pos = self.pairs.len();
    }
}

/// Exposes both mates of every pair as single reads, so paired libraries
/// contribute to k-mer counting and coverage.
pub struct PairedAsSingle {
    inner: Box<dyn PairedReadStream>,
    pending: Option<SingleRead>,
}

impl PairedAsSingle {
    pub fn new(inner: Box<dyn PairedReadStream>) -> Self {
        Self {
            inner,
            pending: None,
        }
    }
}

impl ReadStream for PairedAsSingle {
    fn has_more(&mut self) -> bool {
        self.pending.is_some() || self.inner.has_more()
    }

    fn next_read(&mut self) -> Result<Option<SingleRead>> {
        if let Some(read) = self.pending.take() {
            return Ok(Some(read));
        }
        match self.inner.next_pair()? {
            Some(pair) => {
                self.pending = Some(pair.second);
                Ok(Some(pair.first))
            }
            None => Ok(None),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.pending = None;
        self.inner.reset()
    }

    fn close(&mut self) {
        self.pending = None;
        self.inner.close();
    }
}

fn next_batch<T>(
    batch: &mut Vec<T>,
    mut pull: impl FnMut() -> Result<Option<T>>,
) -> Result<()> {
    batch.clear();
    while batch.len() < BATCH_SIZE {
        match pull()? {
            Some(item) => batch.push(item),
            None => break,
        }
    }
    Ok(())
}

/// Visits every read of every stream exactly once, one rayon task per
/// stream and batch-parallel inside a stream. Returns the longest read seen.
pub fn for_each_read<F>(streams: &mut ReadStreams, f: F) -> Result<usize>
where
    F: Fn(&SingleRead) + Sync,
{
    if streams.is_empty() {
        return Err(Error::NoReadStreams);
    }

    let lengths = streams
        .par_iter_mut()
        .map(|stream| -> Result<usize> {
            stream.reset()?;
            let mut max_len = 0;
            let mut batch = Vec::with_capacity(BATCH_SIZE);
            loop {
                next_batch(&mut batch, || stream.next_read())?;
                if batch.is_empty() {
                    break;
                }
                max_len = batch.iter().map(|r| r.len()).fold(max_len, usize::max);
                batch.par_iter().for_each(|read| f(read));
            }
            Ok(max_len)
        })
        .collect::<Result<Vec<usize>>>()?;

    Ok(lengths.into_iter().max().unwrap_or(0))
}

/// Folds every pair of every stream into per-worker accumulators and merges
/// them with `reduce`.
pub fn fold_pairs<T, I, F, R>(
    streams: &mut PairedReadStreams,
    identity: I,
    fold: F,
    reduce: R,
) -> Result<T>
where
    T: Send,
    I: Fn() -> T + Sync + Send,
    F: Fn(T, &PairedRead) -> T + Sync + Send,
    R: Fn(T, T) -> T + Sync + Send,
{
    if streams.is_empty() {
        return Err(Error::NoReadStreams);
    }

    let partials = streams
        .par_iter_mut()
        .map(|stream| -> Result<T> {
            stream.reset()?;
            let mut acc = identity();
            let mut batch = Vec::with_capacity(BATCH_SIZE);
            loop {
                next_batch(&mut batch, || stream.next_pair())?;
                if batch.is_empty() {
                    break;
                }
                let part = batch
                    .par_iter()
                    .fold(&identity, |acc, pair| fold(acc, pair))
                    .reduce(&identity, |a, b| reduce(a, b));
                acc = reduce(acc, part);
            }
            Ok(acc)
        })
        .collect::<Result<Vec<T>>>()?;

    Ok(partials.into_iter().fold(identity(), |a, b| reduce(a, b)))
}
