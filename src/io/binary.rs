//! Little-endian record streams for coverage (`.cvr`), flanking coverage
//! (`.flcvr`) and paired info (`.prd`).
//!
//! All formats are plain concatenations of records terminated by the end of
//! the stream. Edge ids in the files are persisted ids, translated back to
//! live ids through an [`EdgeIdMapper`] on load.

use crate::error::{Error, Result};
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::graph::coverage::FlankingCoverage;
use crate::graph::paired_info::{PairPoint, PairedInfoIndex};
use ahash::AHashMap;
use std::io::{self, Read, Write};

/// Persisted edge id → live edge id.
#[derive(Debug, Default, Clone)]
pub struct EdgeIdMapper {
    map: AHashMap<u64, EdgeId>,
}

impl EdgeIdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, persisted: u64, live: EdgeId) {
        self.map.insert(persisted, live);
    }

    pub fn map(&self, persisted: u64) -> Result<EdgeId> {
        self.map
            .get(&persisted)
            .copied()
            .ok_or(Error::UnknownEdgeId(persisted))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Fills `buf` completely. Returns `false` on a clean end of stream and an
/// `UnexpectedEof` error if the stream stops inside the record.
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated record ({} of {} bytes)", filled, buf.len()),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut field = [0u8; 8];
    field.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(field)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(field)
}

fn le_f32(bytes: &[u8]) -> f32 {
    f32::from_bits(le_u32(bytes))
}

fn le_f64(bytes: &[u8]) -> f64 {
    f64::from_bits(le_u64(bytes))
}

fn write_coverage_records<W, F>(writer: &mut W, ids: &[(u64, EdgeId)], value: F) -> Result<()>
where
    W: Write,
    F: Fn(EdgeId) -> u32,
{
    for &(persisted, e) in ids {
        writer.write_all(&persisted.to_le_bytes())?;
        writer.write_all(&value(e).to_le_bytes())?;
    }
    Ok(())
}

fn read_coverage_records<R, F>(reader: &mut R, mapper: &EdgeIdMapper, mut apply: F) -> Result<usize>
where
    R: Read,
    F: FnMut(EdgeId, u32),
{
    let mut buf = [0u8; 12];
    let mut records = 0;
    while read_record(reader, &mut buf)? {
        let (id, coverage) = buf.split_at(8);
        apply(mapper.map(le_u64(id))?, le_u32(coverage));
        records += 1;
    }
    Ok(records)
}

/// Writes `(u64 id, u32 raw coverage)` for every edge of `ids`, in order.
pub fn write_coverage<W: Write>(
    writer: &mut W,
    graph: &AssemblyGraph,
    ids: &[(u64, EdgeId)],
) -> Result<()> {
    write_coverage_records(writer, ids, |e| graph.raw_coverage(e))
}

/// Reads coverage records until end of stream and applies them to `graph`.
/// Returns the number of records read.
pub fn read_coverage<R: Read>(
    reader: &mut R,
    mapper: &EdgeIdMapper,
    graph: &mut AssemblyGraph,
) -> Result<usize> {
    read_coverage_records(reader, mapper, |e, coverage| graph.set_raw_coverage(e, coverage))
}

/// Same record layout as [`write_coverage`], holding the raw flanking
/// coverage of every edge.
pub fn write_flanking_coverage<W: Write>(
    writer: &mut W,
    flanking: &FlankingCoverage,
    ids: &[(u64, EdgeId)],
) -> Result<()> {
    write_coverage_records(writer, ids, |e| flanking.raw_coverage(e))
}

pub fn read_flanking_coverage<R: Read>(
    reader: &mut R,
    mapper: &EdgeIdMapper,
    flanking: &mut FlankingCoverage,
) -> Result<usize> {
    read_coverage_records(reader, mapper, |e, coverage| flanking.set_raw_coverage(e, coverage))
}

/// Writes one `(u64 e1, u64 e2, u32 n)` header per edge pair followed by `n`
/// `(f32 distance, f64 weight, f32 variance)` points.
pub fn write_paired_info<W: Write>(
    writer: &mut W,
    index: &PairedInfoIndex,
    persisted: &AHashMap<EdgeId, u64>,
) -> Result<()> {
    for ((e1, e2), hist) in index.entries() {
        let (p1, p2) = match (persisted.get(&e1), persisted.get(&e2)) {
            (Some(p1), Some(p2)) => (*p1, *p2),
            _ => continue,
        };
        writer.write_all(&p1.to_le_bytes())?;
        writer.write_all(&p2.to_le_bytes())?;
        writer.write_all(&(hist.len() as u32).to_le_bytes())?;
        for point in hist.points() {
            writer.write_all(&point.distance.to_le_bytes())?;
            writer.write_all(&point.weight.to_le_bytes())?;
            writer.write_all(&point.variance.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn read_paired_info<R: Read>(reader: &mut R, mapper: &EdgeIdMapper) -> Result<PairedInfoIndex> {
    let mut index = PairedInfoIndex::new();
    let mut header = [0u8; 20];
    let mut point = [0u8; 16];
    while read_record(reader, &mut header)? {
        let e1 = mapper.map(le_u64(&header[0..8]))?;
        let e2 = mapper.map(le_u64(&header[8..16]))?;
        let n = le_u32(&header[16..20]);
        for _ in 0..n {
            if !read_record(reader, &mut point)? {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "missing histogram points").into());
            }
            index.add_point(
                e1,
                e2,
                PairPoint {
                    distance: le_f32(&point[0..4]),
                    weight: le_f64(&point[4..12]),
                    variance: le_f32(&point[12..16]),
                },
            );
        }
    }
    Ok(index)
}
