use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by graph construction, persistence and the stage pipeline.
///
/// Invariant violations inside a live graph (a missing conjugate, a sequence
/// that disagrees with its conjugate) are not represented here: they panic.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No input streams specified")]
    NoReadStreams,

    #[error("Invalid k-mer length {k}: {reason}")]
    InvalidK { k: usize, reason: &'static str },

    #[error("K-mer length mismatch: expected k={expected}, found k={found}{}", Error::format_msg_as_detail(context))]
    KmerLengthMismatch {
        expected: usize,
        found: usize,
        context: Option<String>,
    },

    #[error("Checkpoint for stage '{stage}' not found at {:?}", path)]
    CheckpointMissing { stage: String, path: PathBuf },

    #[error("Checkpoint file at {:?} is invalid{}", path, Error::format_msg_as_detail(msg))]
    CorruptCheckpoint { path: PathBuf, msg: Option<String> },

    #[error("Persisted state references unknown edge id {0}")]
    UnknownEdgeId(u64),

    #[error("Failed parsing {}{}", context, Error::format_msg_as_detail(msg))]
    Parse { context: String, msg: Option<String> },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Error::CorruptCheckpoint {
            path: path.into(),
            msg: Some(msg.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
