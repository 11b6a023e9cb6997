use clap::{Args, Parser, Subcommand};
use helix::config::{AssemblyConfig, PairedMetric, Stage};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "helix", version, about = "Parallel de Bruijn graph assembler", long_about = None)]
pub struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, simplify and annotate the assembly graph
    Assemble(AssembleArgs),

    /// Print statistics of a saved stage
    Stats {
        /// Directory holding the checkpoint files (a run's `saves/`)
        #[arg(short, long)]
        dir: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Stage::PairedInfo)]
        stage: Stage,

        /// K-mer length the checkpoint was built with
        #[arg(short)]
        k: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write FASTA and GFA of a saved stage
    Export {
        #[arg(short, long)]
        dir: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Stage::PairedInfo)]
        stage: Stage,

        #[arg(short)]
        k: usize,

        /// Output FASTA(.gz) file
        #[arg(long)]
        fasta: Option<PathBuf>,

        /// Output GFA file
        #[arg(long)]
        gfa: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct AssembleArgs {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// K-mer length (odd, 3..=127)
    #[arg(short)]
    pub k: Option<usize>,

    /// Number of threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Single-end FASTQ(.gz) file, repeatable
    #[arg(short, long)]
    pub single: Vec<PathBuf>,

    /// First-mate FASTQ(.gz) file, repeatable
    #[arg(short = '1', long)]
    pub left: Vec<PathBuf>,

    /// Second-mate FASTQ(.gz) file, repeatable
    #[arg(short = '2', long)]
    pub right: Vec<PathBuf>,

    /// FASTA(.gz) of contigs whose k-mers are added to the graph
    #[arg(long)]
    pub additional_contigs: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// First stage to run; earlier stages are loaded from --load-from
    #[arg(long, value_enum)]
    pub entry_point: Option<Stage>,

    /// Run directory whose saves hold the earlier stages
    #[arg(long)]
    pub load_from: Option<PathBuf>,

    #[arg(long)]
    pub insert_size: Option<usize>,

    /// Weight of one paired observation
    #[arg(long, value_enum)]
    pub metric: Option<PairedMetric>,
}

impl AssembleArgs {
    /// The configuration file, or the defaults, with flags applied on top.
    pub fn to_config(&self) -> anyhow::Result<AssemblyConfig> {
        let mut config = match &self.config {
            Some(path) => AssemblyConfig::load(path)?,
            None => AssemblyConfig::default(),
        };
        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if !self.single.is_empty() {
            config.reads.single = self.single.clone();
        }
        if !self.left.is_empty() || !self.right.is_empty() {
            config.reads.left = self.left.clone();
            config.reads.right = self.right.clone();
        }
        if let Some(contigs) = &self.additional_contigs {
            config.reads.additional_contigs = Some(contigs.clone());
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(entry_point) = self.entry_point {
            config.entry_point = entry_point;
        }
        if let Some(load_from) = &self.load_from {
            config.load_from = Some(load_from.clone());
        }
        if let Some(insert_size) = self.insert_size {
            config.paired.insert_size = insert_size;
        }
        if let Some(metric) = self.metric {
            config.paired.metric = metric;
        }
        config.validate()?;
        Ok(config)
    }
}
