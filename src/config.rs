//! Run configuration, loaded from JSON and overridable from the command line.

use crate::error::{Error, Result};
use crate::graph::condense::CondenseParams;
use crate::kmer::kmer::validate_k;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Stage {
    Construction,
    Simplification,
    PairedInfo,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Construction, Stage::Simplification, Stage::PairedInfo];

    /// File-name prefix of the stage's checkpoint.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Construction => "construction",
            Stage::Simplification => "simplification",
            Stage::PairedInfo => "paired_info",
        }
    }

    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.name() == name)
    }

    /// The stage whose checkpoint this one starts from.
    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Construction => None,
            Stage::Simplification => Some(Stage::Construction),
            Stage::PairedInfo => Some(Stage::Simplification),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionMode {
    /// Counted k-mer index; adjacency by probing neighbours.
    Legacy,
    /// Adjacency masks with early tip clipping; coverage recounted afterwards.
    Extension,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyTipClipperConfig {
    pub enable: bool,
    /// Defaults to `read_length - k`.
    pub length_bound: Option<usize>,
}

impl Default for EarlyTipClipperConfig {
    fn default() -> Self {
        Self {
            enable: true,
            length_bound: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    pub mode: ConstructionMode,
    pub early_tip_clipping: EarlyTipClipperConfig,
    #[serde(flatten)]
    pub condense: CondenseParams,
    /// Number of k-mers at each edge end summed into flanking coverage.
    pub flanking_range: usize,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            mode: ConstructionMode::Extension,
            early_tip_clipping: EarlyTipClipperConfig::default(),
            condense: CondenseParams::default(),
            flanking_range: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErroneousPolicyKind {
    CoverageThreshold,
    RelativeCoverage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErroneousConnectionConfig {
    pub policy: ErroneousPolicyKind,
    /// Longest edge considered, in k-mers. Defaults to `k + 30`.
    pub max_length: Option<usize>,
    pub min_coverage: f64,
    pub ratio: f64,
}

impl Default for ErroneousConnectionConfig {
    fn default() -> Self {
        Self {
            policy: ErroneousPolicyKind::CoverageThreshold,
            max_length: None,
            min_coverage: 2.0,
            ratio: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplificationConfig {
    pub cycles: usize,
    /// Defaults to `read_length - k`.
    pub tip_length_bound: Option<usize>,
    pub erroneous_connections: ErroneousConnectionConfig,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            cycles: 10,
            tip_length_bound: None,
            erroneous_connections: ErroneousConnectionConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PairedMetric {
    ReadCount,
    Product,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairedConfig {
    pub metric: PairedMetric,
    pub insert_size: usize,
}

impl Default for PairedConfig {
    fn default() -> Self {
        Self {
            metric: PairedMetric::ReadCount,
            insert_size: 300,
        }
    }
}

/// Input FASTQ files. `left[i]` and `right[i]` are the two mates of one library.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadsConfig {
    pub single: Vec<PathBuf>,
    pub left: Vec<PathBuf>,
    pub right: Vec<PathBuf>,
    /// FASTA of previously assembled contigs. Their k-mers enter the graph
    /// and its coverage but not the read length estimate.
    pub additional_contigs: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub k: usize,
    pub threads: usize,
    pub entry_point: Stage,
    pub output_dir: PathBuf,
    /// Run directory whose `saves/` holds the checkpoints of skipped stages.
    pub load_from: Option<PathBuf>,
    pub reads: ReadsConfig,
    pub construction: ConstructionConfig,
    pub simplification: SimplificationConfig,
    pub paired: PairedConfig,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            k: 55,
            threads: num_cpus::get(),
            entry_point: Stage::Construction,
            output_dir: PathBuf::from("helix_output"),
            load_from: None,
            reads: ReadsConfig::default(),
            construction: ConstructionConfig::default(),
            simplification: SimplificationConfig::default(),
            paired: PairedConfig::default(),
        }
    }
}

impl AssemblyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AssemblyConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_k(self.k)?;
        if self.threads == 0 {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        let c = &self.construction.condense;
        if c.queue_min_size == 0 || c.queue_min_size > c.queue_max_size {
            return Err(Error::Config(format!(
                "queue sizes must satisfy 0 < min ({}) <= max ({})",
                c.queue_min_size, c.queue_max_size
            )));
        }
        if !(c.queue_growth_rate >= 1.0) {
            return Err(Error::Config(format!(
                "queue growth rate must be at least 1.0, got {}",
                c.queue_growth_rate
            )));
        }
        if self.construction.flanking_range == 0 {
            return Err(Error::Config("flanking range must be at least 1".to_string()));
        }
        if self.reads.left.len() != self.reads.right.len() {
            return Err(Error::Config(format!(
                "{} left mate file(s) but {} right mate file(s)",
                self.reads.left.len(),
                self.reads.right.len()
            )));
        }
        if self.entry_point != Stage::Construction && self.load_from.is_none() {
            return Err(Error::Config(format!(
                "entry point '{}' needs a run directory to load earlier stages from",
                self.entry_point
            )));
        }
        Ok(())
    }

    pub fn saves_dir(&self) -> PathBuf {
        self.output_dir.join("saves")
    }

    pub fn erroneous_max_length(&self) -> usize {
        self.simplification
            .erroneous_connections
            .max_length
            .unwrap_or(self.k + 30)
    }
}
