//! Stage checkpoints.
//!
//! A checkpoint of stage `s` in directory `dir` consists of
//! - `dir/s.grp`: JSON manifest and edge list (persisted id, conjugate id, sequence),
//! - `dir/s.cvr`: raw coverage records,
//! - `dir/s.prd`: paired info records, empty until paired info exists,
//! - `dir/s.flcvr`: flanking coverage records, when flanking coverage is known,
//! - `dir/s.ids`: persisted id to in-memory edge id at save time (TSV).
//!
//! Persisted ids are dense and follow edge traversal order.

use crate::config::Stage;
use crate::error::{Error, Result};
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use crate::graph::coverage::FlankingCoverage;
use crate::graph::paired_info::PairedInfoIndex;
use crate::io::binary::{
    read_coverage, read_flanking_coverage, read_paired_info, write_coverage, write_flanking_coverage,
    write_paired_info, EdgeIdMapper,
};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub stage: Stage,
    pub k: usize,
    pub read_length: usize,
    pub timestamp: DateTime<Utc>,
    pub edge_count: usize,
    /// Window of the saved flanking coverage, if any was saved.
    #[serde(default)]
    pub flanking_range: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEdge {
    id: u64,
    conjugate: u64,
    sequence: String,
}

#[derive(Serialize, Deserialize)]
struct GraphFile {
    manifest: Manifest,
    edges: Vec<PersistedEdge>,
}

/// Everything a later stage needs from an earlier one.
pub struct Checkpoint {
    pub manifest: Manifest,
    pub graph: AssemblyGraph,
    /// Empty for checkpoints taken before paired info was collected.
    pub paired_info: PairedInfoIndex,
    pub flanking: Option<FlankingCoverage>,
    /// Persisted id → edge id in the saving process.
    pub saved_ids: Vec<(u64, usize)>,
}

pub fn checkpoint_path(dir: &Path, stage: Stage, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", stage.name(), extension))
}

/// What a stage hands to [`save_checkpoint`].
pub struct StageState<'a> {
    pub graph: &'a AssemblyGraph,
    pub paired_info: Option<&'a PairedInfoIndex>,
    pub flanking: Option<&'a FlankingCoverage>,
    pub read_length: usize,
}

impl<'a> StageState<'a> {
    pub fn new(graph: &'a AssemblyGraph, read_length: usize) -> Self {
        Self {
            graph,
            paired_info: None,
            flanking: None,
            read_length,
        }
    }
}

/// Writes the checkpoint of `stage` into `dir`.
pub fn save_checkpoint(dir: &Path, stage: Stage, state: &StageState) -> Result<Manifest> {
    let graph = state.graph;
    fs::create_dir_all(dir)?;
    let ids: Vec<(u64, EdgeId)> = graph
        .edges()
        .enumerate()
        .map(|(i, e)| (i as u64, e))
        .collect();
    let persisted: AHashMap<EdgeId, u64> = ids.iter().map(|&(p, e)| (e, p)).collect();

    let manifest = Manifest {
        stage,
        k: graph.k(),
        read_length: state.read_length,
        timestamp: Utc::now(),
        edge_count: ids.len(),
        flanking_range: state.flanking.map(|f| f.range()),
    };
    let edges = ids
        .iter()
        .map(|&(p, e)| PersistedEdge {
            id: p,
            conjugate: persisted[&graph.conjugate(e)],
            sequence: String::from_utf8_lossy(graph.sequence(e)).into_owned(),
        })
        .collect();
    let file = GraphFile {
        manifest: manifest.clone(),
        edges,
    };
    let writer = BufWriter::new(File::create(checkpoint_path(dir, stage, "grp"))?);
    serde_json::to_writer(writer, &file)?;

    let mut writer = BufWriter::new(File::create(checkpoint_path(dir, stage, "cvr"))?);
    write_coverage(&mut writer, graph, &ids)?;
    writer.flush()?;

    let mut writer = BufWriter::new(File::create(checkpoint_path(dir, stage, "prd"))?);
    if let Some(index) = state.paired_info {
        write_paired_info(&mut writer, index, &persisted)?;
    }
    writer.flush()?;

    if let Some(flanking) = state.flanking {
        let mut writer = BufWriter::new(File::create(checkpoint_path(dir, stage, "flcvr"))?);
        write_flanking_coverage(&mut writer, flanking, &ids)?;
        writer.flush()?;
    }

    let mut writer = BufWriter::new(File::create(checkpoint_path(dir, stage, "ids"))?);
    writeln!(writer, "persisted_id\tedge_id")?;
    for &(p, e) in &ids {
        writeln!(writer, "{}\t{}", p, e.0)?;
    }
    writer.flush()?;

    info!(
        "Saved checkpoint '{}' ({} edges) to {:?}",
        stage,
        manifest.edge_count,
        dir
    );
    Ok(manifest)
}

/// Reads only the manifest of a checkpoint.
pub fn read_manifest(dir: &Path, stage: Stage) -> Result<Manifest> {
    Ok(read_graph_file(dir, stage)?.manifest)
}

fn read_graph_file(dir: &Path, stage: Stage) -> Result<GraphFile> {
    let path = checkpoint_path(dir, stage, "grp");
    if !path.exists() {
        return Err(Error::CheckpointMissing {
            stage: stage.name().to_string(),
            path,
        });
    }
    let reader = BufReader::new(File::open(&path)?);
    serde_json::from_reader(reader).map_err(|e| Error::corrupt(&path, e.to_string()))
}

fn rebuild_graph(path: &Path, k: usize, edges: &[PersistedEdge]) -> Result<(AssemblyGraph, EdgeIdMapper)> {
    let mut graph = AssemblyGraph::new(k);
    let mut mapper = EdgeIdMapper::new();
    let by_id: AHashMap<u64, &PersistedEdge> = edges.iter().map(|e| (e.id, e)).collect();

    for edge in edges {
        if mapper.map(edge.id).is_ok() {
            continue;
        }
        if edge.sequence.len() < k || !edge.sequence.bytes().all(|b| b"ACGT".contains(&b)) {
            return Err(Error::corrupt(path, format!("edge {} has an invalid sequence", edge.id)));
        }
        let conjugate = by_id
            .get(&edge.conjugate)
            .ok_or(Error::UnknownEdgeId(edge.conjugate))?;
        let e = graph.add_edge(edge.sequence.clone().into_bytes());
        let c = graph.conjugate(e);
        if graph.sequence(c) != conjugate.sequence.as_bytes() || (e == c) != (edge.id == edge.conjugate) {
            return Err(Error::corrupt(
                path,
                format!("edge {} and its conjugate {} disagree", edge.id, edge.conjugate),
            ));
        }
        mapper.insert(edge.id, e);
        mapper.insert(edge.conjugate, c);
    }
    Ok((graph, mapper))
}

fn read_id_table(path: &Path) -> Result<Vec<(u64, usize)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut table = Vec::new();
    for line in reader.lines().skip(1) {
        let line = line?;
        let mut fields = line.split('\t');
        let parsed = match (fields.next(), fields.next()) {
            (Some(p), Some(e)) => p.parse::<u64>().ok().zip(e.parse::<usize>().ok()),
            _ => None,
        };
        match parsed {
            Some(pair) => table.push(pair),
            None => return Err(Error::corrupt(path, format!("bad id table line '{}'", line))),
        }
    }
    Ok(table)
}

/// Loads the checkpoint of `stage` from `dir`, rejecting one built with a
/// k-mer length other than `expected_k`.
pub fn load_checkpoint(dir: &Path, stage: Stage, expected_k: usize) -> Result<Checkpoint> {
    let path = checkpoint_path(dir, stage, "grp");
    let file = read_graph_file(dir, stage)?;
    let manifest = file.manifest;
    if manifest.k != expected_k {
        return Err(Error::KmerLengthMismatch {
            expected: expected_k,
            found: manifest.k,
            context: Some(format!("checkpoint {:?}", path)),
        });
    }
    let (mut graph, mapper) = rebuild_graph(&path, manifest.k, &file.edges)?;
    if graph.edge_count() != manifest.edge_count {
        return Err(Error::corrupt(
            &path,
            format!("manifest lists {} edges, file holds {}", manifest.edge_count, graph.edge_count()),
        ));
    }

    let cvr = checkpoint_path(dir, stage, "cvr");
    let records = read_coverage(&mut open_part(stage, &cvr)?, &mapper, &mut graph)?;
    debug!("Read {} coverage records from {:?}", records, cvr);

    let prd = checkpoint_path(dir, stage, "prd");
    let paired_info = read_paired_info(&mut open_part(stage, &prd)?, &mapper)?;

    let flanking = match manifest.flanking_range {
        Some(range) => {
            let flcvr = checkpoint_path(dir, stage, "flcvr");
            let mut flanking = FlankingCoverage::new(range);
            let records = read_flanking_coverage(&mut open_part(stage, &flcvr)?, &mapper, &mut flanking)?;
            debug!("Read {} flanking coverage records from {:?}", records, flcvr);
            Some(flanking)
        }
        None => None,
    };

    let saved_ids = read_id_table(&checkpoint_path(dir, stage, "ids"))?;
    info!(
        "Loaded checkpoint '{}' from {:?}: {} edges, saved {}",
        stage,
        dir,
        graph.edge_count(),
        manifest.timestamp
    );
    Ok(Checkpoint {
        manifest,
        graph,
        paired_info,
        flanking,
        saved_ids,
    })
}

fn open_part(stage: Stage, path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|_| Error::CheckpointMissing {
        stage: stage.name().to_string(),
        path: path.to_path_buf(),
    })?;
    Ok(BufReader::new(file))
}

/// Copies every file of `from` whose name starts with `prefix.` into `to`.
/// Returns the number of files copied.
pub fn copy_files_by_prefix(from: &Path, prefix: &str, to: &Path) -> Result<usize> {
    fs::create_dir_all(to)?;
    let pattern = format!("{}.", prefix);
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(&pattern) && entry.file_type()?.is_file() {
            fs::copy(entry.path(), to.join(&name))?;
            copied += 1;
        }
    }
    debug!("Copied {} '{}' files from {:?} to {:?}", copied, prefix, from, to);
    Ok(copied)
}
