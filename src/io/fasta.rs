// src/io/fasta.rs
use crate::error::{Error, Result};
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::io::reads::{ReadStream, SingleRead};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

const LINE_WIDTH: usize = 60;

pub enum FastaWriter {
    Plain(BufWriter<File>),
    Compressed(BufWriter<GzEncoder<File>>),
}

impl FastaWriter {
    /// Creates `path`, gzip-compressed when the name ends in `.gz`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        if path.to_string_lossy().ends_with(".gz") {
            let encoder = GzEncoder::new(file, Compression::default());
            Ok(FastaWriter::Compressed(BufWriter::new(encoder)))
        } else {
            Ok(FastaWriter::Plain(BufWriter::new(file)))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            FastaWriter::Plain(writer) => writer,
            FastaWriter::Compressed(writer) => writer,
        }
    }

    pub fn write_record(&mut self, header: &str, sequence: &[u8]) -> Result<()> {
        let writer = self.writer();
        writeln!(writer, ">{}", header)?;
        for line in sequence.chunks(LINE_WIDTH) {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flushes buffered output and, for gzip output, writes the trailer.
    pub fn finish(self) -> Result<()> {
        match self {
            FastaWriter::Plain(mut writer) => writer.flush()?,
            FastaWriter::Compressed(writer) => {
                let encoder = writer.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
            }
        }
        Ok(())
    }
}

pub fn edge_name(graph: &AssemblyGraph, e: EdgeId) -> String {
    format!(
        "EDGE_{}_length_{}_cov_{:.1}",
        e.0,
        graph.sequence(e).len(),
        graph.coverage(e)
    )
}

/// Writes one record per conjugate pair. Returns the number of records.
pub fn write_graph_edges(graph: &AssemblyGraph, path: &Path) -> Result<usize> {
    let mut writer = FastaWriter::create(path)?;
    let mut written = 0;
    for e in graph.edge_pairs() {
        writer.write_record(&edge_name(graph, e), graph.sequence(e))?;
        written += 1;
    }
    writer.finish()?;
    Ok(written)
}

/// Opens a FASTA file, decompressing transparently when the name ends in `.gz`.
pub fn open_fasta(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Multi-line FASTA records as single reads. `reset` reopens the file.
pub struct FastaReadStream {
    path: PathBuf,
    lines: Option<Lines<Box<dyn BufRead + Send>>>,
    /// Header line already consumed while reading the previous record.
    next_header: Option<String>,
    peeked: Option<Result<Option<SingleRead>>>,
}

impl FastaReadStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Ok(Self {
            lines: Some(open_fasta(&path)?.lines()),
            path,
            next_header: None,
            peeked: None,
        })
    }

    fn pull(&mut self) -> Result<Option<SingleRead>> {
        let lines = match self.lines.as_mut() {
            Some(lines) => lines,
            None => return Ok(None),
        };
        let header = match self.next_header.take() {
            Some(header) => header,
            None => loop {
                let line = match lines.next() {
                    Some(line) => line?,
                    None => return Ok(None),
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line.strip_prefix('>') {
                    Some(header) => break header.to_string(),
                    None => {
                        return Err(Error::Parse {
                            context: format!("{:?}", self.path),
                            msg: Some("sequence data before the first '>' header".to_string()),
                        })
                    }
                }
            },
        };
        let mut sequence = String::new();
        for line in lines.by_ref() {
            let line = line?;
            if let Some(next) = line.strip_prefix('>') {
                self.next_header = Some(next.to_string());
                break;
            }
            sequence.push_str(line.trim());
        }
        let name = header.split_whitespace().next().unwrap_or("");
        Ok(Some(SingleRead::new(name, sequence.to_ascii_uppercase())))
    }
}

impl ReadStream for FastaReadStream {
    fn has_more(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = Some(self.pull());
        }
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
        self.next_header = None;
        self.lines = Some(open_fasta(&self.path)?.lines());
        Ok(())
    }

    fn close(&mut self) {
        self.peeked = None;
        self.next_header = None;
        self.lines = None;
    }
}
