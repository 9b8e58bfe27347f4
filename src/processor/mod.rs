use std::path::PathBuf;
use thiserror::Error;

use crate::helpers::number::NumberError;

pub mod aggregator;
pub mod config;
pub mod extractor;
pub mod filter;
pub mod input;
pub mod keys;
pub mod report;
pub mod scheduler;
pub mod schema;
pub mod stats;

/// Numeric document identifier (`NU_DOCUMENTO`).
pub type DocumentId = u32;

/// Fatal error: aborts the whole run.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid number in {}:{line} ({column}): {source}", path.display())]
    InvalidNumber {
        path: PathBuf,
        line: u64,
        column: &'static str,
        #[source]
        source: NumberError,
    },

    #[error("document {document_id} has more lines than were counted during key discovery")]
    InputChanged { document_id: DocumentId },

    #[error("document {document_id} is still missing {remaining} lines at the end of its round")]
    IncompleteDocument {
        document_id: DocumentId,
        remaining: u32,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ProcessorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProcessorError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Recoverable error: the line is logged, counted and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected {expected} columns, found {found}")]
    TooFewColumns { found: usize, expected: usize },

    #[error("empty document id")]
    EmptyDocumentId,

    #[error("invalid document id {0:?}")]
    InvalidDocumentId(String),
}

/// Aggregate operations reported for every monetary field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateOp {
    pub const ALL: [AggregateOp; 4] = [
        AggregateOp::Sum,
        AggregateOp::Avg,
        AggregateOp::Max,
        AggregateOp::Min,
    ];

    /// Column suffix used in the report header.
    pub fn label(self) -> &'static str {
        match self {
            AggregateOp::Sum => "SOMA",
            AggregateOp::Avg => "MEDIA",
            AggregateOp::Max => "MAX",
            AggregateOp::Min => "MIN",
        }
    }
}

/// What to do with a line whose monetary field does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericErrorPolicy {
    /// Log, count and skip the line.
    #[default]
    Skip,
    /// Fail the run with [`ProcessorError::InvalidNumber`].
    Abort,
}

/// Totals of one complete run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    /// Data lines (headers excluded) seen during key discovery.
    pub lines: u64,
    pub malformed_lines: u64,
    pub filtered_lines: u64,
    pub numeric_errors: u64,
    pub distinct_documents: usize,
    pub rounds: usize,
    pub rows_written: u64,
}
