//! Stage pipeline: construction → simplification → paired info, with a
//! checkpoint saved after every stage.

pub mod checkpoint;
pub mod construction;

use crate::config::{AssemblyConfig, ErroneousPolicyKind, PairedMetric, Stage};
use crate::error::{Error, Result};
use crate::graph::assembly_graph::AssemblyGraph;
use crate::graph::coverage::FlankingCoverage;
use crate::graph::mapper::KmerMapper;
use crate::graph::paired_info::{fill_paired_index, product_weight, read_count_weight, PairedInfoIndex};
use crate::graph::simplify::{
    coverage_threshold, relative_coverage, ErroneousEdgePolicy, SimplificationReport, Simplifier,
};
use crate::io::fasta::{write_graph_edges, FastaReadStream};
use crate::io::fastq::{FastqPairedStream, FastqReadStream};
use crate::io::gfa::write_graph_gfa;
use crate::io::reads::{PairedAsSingle, PairedReadStreams, ReadStreams};
use crate::kmer::index::{DetachedIndex, KmerIndex};
use crate::stats::GraphStats;
use checkpoint::{copy_files_by_prefix, load_checkpoint, read_manifest, save_checkpoint, StageState};
use construction::construct_graph_with_contigs;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const CONTIGS_FILE: &str = "final_contigs.fasta";
pub const GFA_FILE: &str = "assembly_graph.gfa";

/// State handed from stage to stage, and the result of a run.
pub struct AssemblyOutput {
    pub graph: AssemblyGraph,
    /// Attached to `graph`.
    pub index: KmerIndex,
    pub read_length: usize,
    pub paired_info: Option<PairedInfoIndex>,
    /// Absent once the graph changed without k-mer multiplicities at hand.
    pub flanking: Option<FlankingCoverage>,
    /// Present when simplification ran in this process.
    pub simplification: Option<SimplificationReport>,
}

impl AssemblyOutput {
    pub fn stats(&self) -> GraphStats {
        GraphStats::from_graph(&self.graph)
    }
}

/// Opens the FASTQ files named in the configuration. Paired libraries feed
/// k-mer counting as single reads too.
pub fn open_read_streams(config: &AssemblyConfig) -> Result<(ReadStreams, PairedReadStreams)> {
    let mut single: ReadStreams = Vec::new();
    let mut paired: PairedReadStreams = Vec::new();
    for path in &config.reads.single {
        single.push(Box::new(FastqReadStream::open(path)?));
    }
    let insert_size = config.paired.insert_size;
    for (left, right) in config.reads.left.iter().zip(&config.reads.right) {
        paired.push(Box::new(FastqPairedStream::open(left, right, insert_size)?));
        single.push(Box::new(PairedAsSingle::new(Box::new(FastqPairedStream::open(
            left,
            right,
            insert_size,
        )?))));
    }
    info!(
        "Opened {} read stream(s), {} of them paired",
        single.len(),
        paired.len()
    );
    Ok((single, paired))
}

/// Opens the additional contigs file, if one is configured.
pub fn open_contig_streams(config: &AssemblyConfig) -> Result<ReadStreams> {
    let mut contigs: ReadStreams = Vec::new();
    if let Some(path) = &config.reads.additional_contigs {
        contigs.push(Box::new(FastaReadStream::open(path)?));
        info!("Using additional contigs from {:?}", path);
    }
    Ok(contigs)
}

/// Runs every stage from the configured entry point on a dedicated thread
/// pool of `config.threads` workers.
pub fn run(
    config: &AssemblyConfig,
    streams: &mut ReadStreams,
    paired: &mut PairedReadStreams,
) -> Result<AssemblyOutput> {
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| Error::Config(format!("cannot build thread pool: {}", e)))?;
    info!("=== helix: k={}, {} threads ===", config.k, config.threads);
    pool.install(|| run_stages(config, streams, paired))
}

fn run_stages(
    config: &AssemblyConfig,
    streams: &mut ReadStreams,
    paired: &mut PairedReadStreams,
) -> Result<AssemblyOutput> {
    let saves = config.saves_dir();
    fs::create_dir_all(&saves)?;

    let mut output = match config.entry_point.previous() {
        Some(previous) => resume_from(config, previous, &saves)?,
        None => run_construction(config, streams, &saves)?,
    };
    if config.entry_point <= Stage::Simplification {
        run_simplification(config, &mut output, &saves)?;
    }
    run_paired_info(config, &mut output, paired, &saves)?;

    let contigs = config.output_dir.join(CONTIGS_FILE);
    let written = write_graph_edges(&output.graph, &contigs)?;
    write_graph_gfa(&output.graph, &config.output_dir.join(GFA_FILE))?;
    config.save(&config.output_dir.join("config.json"))?;
    info!("Wrote {} edges to {:?}", written, contigs);
    Ok(output)
}

fn load_dir(config: &AssemblyConfig) -> Result<PathBuf> {
    config
        .load_from
        .as_ref()
        .map(|dir| dir.join("saves"))
        .ok_or_else(|| Error::Config(format!("entry point '{}' needs a run to load from", config.entry_point)))
}

/// Checks the checkpoint of every skipped stage, loads the one of
/// `previous` and carries the files of the skipped stages over into this
/// run's saves.
fn resume_from(config: &AssemblyConfig, previous: Stage, saves: &Path) -> Result<AssemblyOutput> {
    let from = load_dir(config)?;
    let skipped: Vec<Stage> = Stage::ALL
        .into_iter()
        .filter(|&s| s < config.entry_point)
        .collect();
    for &stage in &skipped {
        let manifest = read_manifest(&from, stage)?;
        if manifest.k != config.k {
            return Err(Error::KmerLengthMismatch {
                expected: config.k,
                found: manifest.k,
                context: Some(format!("checkpoint '{}' in {:?}", stage, from)),
            });
        }
    }
    let checkpoint = load_checkpoint(&from, previous, config.k)?;
    if fs::canonicalize(&from)? != fs::canonicalize(saves)? {
        for &stage in &skipped {
            if copy_files_by_prefix(&from, stage.name(), saves)? == 0 {
                return Err(Error::CheckpointMissing {
                    stage: stage.name().to_string(),
                    path: from.clone(),
                });
            }
        }
    }
    let index = DetachedIndex::new(config.k).attach(&checkpoint.graph)?;
    info!(
        "Resuming at '{}' from checkpoint '{}' ({} edges)",
        config.entry_point,
        previous,
        checkpoint.graph.edge_count()
    );
    Ok(AssemblyOutput {
        graph: checkpoint.graph,
        index,
        read_length: checkpoint.manifest.read_length,
        paired_info: Some(checkpoint.paired_info),
        flanking: checkpoint.flanking,
        simplification: None,
    })
}

fn finish_stage(stage: Stage, output: &AssemblyOutput, saves: &Path, start: Instant) -> Result<()> {
    let state = StageState {
        paired_info: output.paired_info.as_ref(),
        flanking: output.flanking.as_ref(),
        ..StageState::new(&output.graph, output.read_length)
    };
    save_checkpoint(saves, stage, &state)?;
    info!(
        "Stage '{}' finished in {:.2}s\n{}",
        stage,
        start.elapsed().as_secs_f32(),
        output.stats()
    );
    Ok(())
}

fn run_construction(config: &AssemblyConfig, streams: &mut ReadStreams, saves: &Path) -> Result<AssemblyOutput> {
    let start = Instant::now();
    info!("Stage 'construction' started");
    let mut contigs = open_contig_streams(config)?;
    let built = construct_graph_with_contigs(&config.construction, config.k, streams, &mut contigs)?;
    let output = AssemblyOutput {
        graph: built.graph,
        index: built.index,
        read_length: built.read_length,
        paired_info: None,
        flanking: Some(built.flanking),
        simplification: None,
    };
    finish_stage(Stage::Construction, &output, saves, start)?;
    Ok(output)
}

fn erroneous_policy(config: &AssemblyConfig) -> Box<dyn ErroneousEdgePolicy> {
    let max_length = config.erroneous_max_length();
    let ec = &config.simplification.erroneous_connections;
    match ec.policy {
        ErroneousPolicyKind::CoverageThreshold => Box::new(coverage_threshold(max_length, ec.min_coverage)),
        ErroneousPolicyKind::RelativeCoverage => Box::new(relative_coverage(max_length, ec.ratio)),
    }
}

fn run_simplification(config: &AssemblyConfig, output: &mut AssemblyOutput, saves: &Path) -> Result<()> {
    let start = Instant::now();
    info!("Stage 'simplification' started");
    let tip_length = config
        .simplification
        .tip_length_bound
        .unwrap_or_else(|| output.read_length.saturating_sub(config.k));
    let policy = erroneous_policy(config);
    let report = Simplifier::new(tip_length, config.simplification.cycles, &*policy).run(&mut output.graph);
    output.index.assign_edges(&output.graph);
    if let Some(info) = output.paired_info.as_mut() {
        info.retain_live(&output.graph);
    }
    output.flanking = if output.index.total_multiplicity() > 0 {
        let range = config.construction.flanking_range;
        Some(FlankingCoverage::from_index(&output.graph, &output.index, range))
    } else {
        debug!("No k-mer multiplicities after resuming; flanking coverage dropped");
        None
    };
    output.simplification = Some(report);
    finish_stage(Stage::Simplification, output, saves, start)
}

fn run_paired_info(
    config: &AssemblyConfig,
    output: &mut AssemblyOutput,
    paired: &mut PairedReadStreams,
    saves: &Path,
) -> Result<()> {
    let start = Instant::now();
    info!("Stage 'paired_info' started");
    let info = if paired.is_empty() {
        warn!("No paired libraries; paired info stays empty");
        PairedInfoIndex::new()
    } else {
        let mapper = KmerMapper::new(&output.graph, &output.index);
        match config.paired.metric {
            PairedMetric::ReadCount => fill_paired_index(&output.graph, &mapper, paired, read_count_weight)?,
            PairedMetric::Product => fill_paired_index(&output.graph, &mapper, paired, product_weight)?,
        }
    };
    output.paired_info = Some(info);
    finish_stage(Stage::PairedInfo, output, saves, start)
}
