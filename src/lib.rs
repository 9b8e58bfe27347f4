//! # receivables_aggregator
//!
//! `receivables_aggregator` is a multi-threaded, memory-bounded aggregator for
//! large semicolon-delimited receivables stock files. For every document number
//! it reports sum, mean, maximum and minimum of the nominal, present and
//! acquisition values. It supports:
//!
//! - Memory-mapped file scanning with zero-copy column extraction
//! - A hand-written decimal parser with configurable grouping and decimal marks
//! - Exact and substring filters on creditor/debtor names and ids
//! - A hard ceiling on resident aggregates, processed in rounds
//! - Pooled scratch buffers and aggregates shared by all workers
//!
//! # Example
//!
//! ```rust,no_run
//! use receivables_aggregator::{AggregationConfig, Aggregator, ReportWriter, list_input_files};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AggregationConfig::default();
//!     let files = list_input_files(Path::new("files"))?;
//!     let mut report = ReportWriter::create(&config.report_path(Path::new("output")), b',')?;
//!
//!     let aggregator = Aggregator::new(config)?;
//!     let summary = aggregator.run(&files, &mut report)?;
//!     report.finish()?;
//!
//!     println!("{} documents in {} rounds", summary.rows_written, summary.rounds);
//!     Ok(())
//! }
//! ```

pub mod helpers;
pub mod processor;

pub use helpers::number::{NumberError, NumberFormat};
pub use processor::{
    AggregateOp, DocumentId, LineError, NumericErrorPolicy, ProcessorError, RunSummary,
    aggregator::Aggregator,
    config::AggregationConfig,
    filter::{FilterSet, TextMatch},
    input::list_input_files,
    report::ReportWriter,
    schema::Schema,
};
