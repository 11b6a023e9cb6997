// src/io/fastq.rs
use crate::error::{Error, Result};
use crate::io::reads::{PairedRead, PairedReadStream, ReadStream, SingleRead};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

type LineReader = Lines<Box<dyn BufRead + Send>>;

/// Opens a FASTQ file, decompressing transparently when the name ends in `.gz`.
pub fn open_fastq(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Four-line FASTQ record parser over a line iterator.
struct FastqStreamParser {
    path: PathBuf,
    lines: LineReader,
    record: usize,
}

impl FastqStreamParser {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            lines: open_fastq(path)?.lines(),
            record: 0,
        })
    }

    fn malformed(&self, msg: &str) -> Error {
        Error::Parse {
            context: format!("{:?}", self.path),
            msg: Some(format!("record {}: {}", self.record + 1, msg)),
        }
    }

    fn next_line(&mut self, what: &str) -> Result<String> {
        match self.lines.next() {
            Some(line) => Ok(line?),
            None => Err(self.malformed(&format!("missing {} line", what))),
        }
    }

    fn next_record(&mut self) -> Result<Option<SingleRead>> {
        let header = loop {
            match self.lines.next() {
                None => return Ok(None),
                Some(line) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
            }
        };
        let name = match header.strip_prefix('@') {
            Some(name) => name.split_whitespace().next().unwrap_or("").to_string(),
            None => return Err(self.malformed("header does not start with '@'")),
        };
        let sequence = self.next_line("sequence")?;
        let plus = self.next_line("separator")?;
        if !plus.starts_with('+') {
            return Err(self.malformed("separator does not start with '+'"));
        }
        let quality = self.next_line("quality")?;
        if quality.trim_end().len() != sequence.trim_end().len() {
            return Err(self.malformed("quality and sequence lengths differ"));
        }
        self.record += 1;
        Ok(Some(SingleRead::new(
            name,
            sequence.trim_end().to_ascii_uppercase(),
        )))
    }
}

/// Single-end reads from one FASTQ file. `reset` reopens the file.
pub struct FastqReadStream {
    parser: Option<FastqStreamParser>,
    path: PathBuf,
    /// Result of a record read ahead by `has_more`, errors included.
    peeked: Option<Result<Option<SingleRead>>>,
}

impl FastqReadStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Ok(Self {
            parser: Some(FastqStreamParser::open(&path)?),
            path,
            peeked: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pull(&mut self) -> Result<Option<SingleRead>> {
        match self.parser.as_mut() {
            Some(parser) => parser.next_record(),
            None => Ok(None),
        }
    }
}

impl ReadStream for FastqReadStream {
    fn has_more(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = Some(self.pull());
        }
        // a parse error counts as more input so that next_read reports it
        !matches!(self.peeked, Some(Ok(None)))
    }

    fn next_read(&mut self) -> Result<Option<SingleRead>> {
        match self.peeked.take() {
            Some(read) => read,
            None => self.pull(),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.peeked = None;
        self.parser = Some(FastqStreamParser::open(&self.path)?);
        Ok(())
    }

    fn close(&mut self) {
        self.peeked = None;
        self.parser = None;
    }
}

/// Paired-end reads from two FASTQ files in lockstep.
///
/// Mates come off the sequencer facing each other, so the second mate is
/// reverse-complemented to put both on the strand of the first.
pub struct FastqPairedStream {
    left: FastqReadStream,
    right: FastqReadStream,
    insert_size: usize,
}

impl FastqPairedStream {
    pub fn open(left: impl AsRef<Path>, right: impl AsRef<Path>, insert_size: usize) -> Result<Self> {
        Ok(Self {
            left: FastqReadStream::open(left)?,
            right: FastqReadStream::open(right)?,
            insert_size,
        })
    }
}

impl PairedReadStream for FastqPairedStream {
    fn has_more(&mut self) -> bool {
        self.left.has_more() && self.right.has_more()
    }

    fn next_pair(&mut self) -> Result<Option<PairedRead>> {
        match (self.left.next_read()?, self.right.next_read()?) {
            (Some(first), Some(second)) => Ok(Some(PairedRead {
                first,
                second: second.reverse_complement(),
                insert_size: self.insert_size,
            })),
            (None, None) => Ok(None),
            (Some(_), None) | (None, Some(_)) => Err(Error::Parse {
                context: format!("{:?} and {:?}", self.left.path(), self.right.path()),
                msg: Some("mate files hold different numbers of reads".to_string()),
            }),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.left.reset()?;
        self.right.reset()
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
    }
}
