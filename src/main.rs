use clap::{Parser, ValueEnum};
use log::{error, info};
use std::{path::PathBuf, process, time::Instant};

use receivables_aggregator::{
    AggregationConfig, Aggregator, FilterSet, NumberFormat, NumericErrorPolicy, ProcessorError,
    ReportWriter, TextMatch, list_input_files,
};

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NameMatch {
    Exact,
    Contains,
}

impl From<NameMatch> for TextMatch {
    fn from(m: NameMatch) -> Self {
        match m {
            NameMatch::Exact => TextMatch::Exact,
            NameMatch::Contains => TextMatch::Contains,
        }
    }
}

/// Aggregates receivables stock files per document number.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory holding the semicolon-delimited input files
    #[arg(long, default_value = "files")]
    input_dir: PathBuf,

    /// Directory the report is written to
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Only this document number
    #[arg(long, default_value = "")]
    docnum: String,

    /// Creditor name
    #[arg(long, default_value = "")]
    nomecedente: String,

    /// Creditor document (exact)
    #[arg(long, default_value = "")]
    doccedente: String,

    /// Debtor name
    #[arg(long, default_value = "")]
    nomesacado: String,

    /// Debtor document (exact)
    #[arg(long, default_value = "")]
    docsacado: String,

    #[arg(long, value_enum, default_value_t = NameMatch::Exact)]
    creditor_name_match: NameMatch,

    #[arg(long, value_enum, default_value_t = NameMatch::Contains)]
    debtor_name_match: NameMatch,

    /// Maximum document aggregates held in memory at once
    #[arg(long, default_value_t = AggregationConfig::DEFAULT_CEILING)]
    ceiling: usize,

    /// Worker threads (0 = one per CPU)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Abort on the first unparsable monetary value instead of skipping the line
    #[arg(long)]
    strict_numbers: bool,

    /// Monetary values are written as `1.234,56`
    #[arg(long)]
    brazilian_numbers: bool,
}

impl Cli {
    fn config(&self) -> Result<AggregationConfig, ProcessorError> {
        let filters = FilterSet::new()
            .document_id(&self.docnum)?
            .creditor_id(&self.doccedente)
            .debtor_id(&self.docsacado)
            .creditor_name(&self.nomecedente, self.creditor_name_match.into())
            .debtor_name(&self.nomesacado, self.debtor_name_match.into());

        Ok(AggregationConfig {
            number_format: if self.brazilian_numbers {
                NumberFormat::brazilian()
            } else {
                NumberFormat::default()
            },
            filters,
            ceiling: self.ceiling,
            workers: self.threads,
            numeric_errors: if self.strict_numbers {
                NumericErrorPolicy::Abort
            } else {
                NumericErrorPolicy::Skip
            },
            debug: self.debug,
            ..Default::default()
        })
    }
}

fn run(cli: &Cli) -> Result<(), ProcessorError> {
    let started = Instant::now();
    let config = cli.config()?;
    let files = list_input_files(&cli.input_dir)?;
    info!("{} input files in {}", files.len(), cli.input_dir.display());

    let report_path = config.report_path(&cli.output_dir);
    let mut report = ReportWriter::create(&report_path, config.report_delimiter)?;
    let aggregator = Aggregator::new(config)?;
    let summary = aggregator.run(&files, &mut report)?;
    report.finish()?;

    info!(
        "wrote {} rows to {} in {:.2?}: {:?}",
        summary.rows_written,
        report_path.display(),
        started.elapsed(),
        summary
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(&cli) {
        error!("{e}");
        process::exit(1);
    }
}
