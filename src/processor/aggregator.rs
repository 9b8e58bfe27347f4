use log::{Level, debug, info, log, warn};
use std::{
    collections::{HashMap, HashSet},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Instant,
};

use crate::{
    helpers::{
        number::{NumberError, NumberFormat},
        pool::Pool,
    },
    processor::{
        DocumentId, LineError, NumericErrorPolicy, ProcessorError, RunSummary,
        config::AggregationConfig,
        extractor::{ColumnExtractor, DelimiterPositions, LineFields, parse_document_id},
        input::for_each_record,
        keys::PendingKeySet,
        report::ReportWriter,
        scheduler::FileScheduler,
        schema::Column,
        stats::DocumentAggregate,
    },
};

/// Upper bound on idle aggregates kept for reuse between rounds.
const AGGREGATE_POOL_CAP: usize = 1 << 16;

/// Per-line outcome counts of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineTally {
    pub lines: u64,
    pub malformed: u64,
    pub filtered: u64,
    pub numeric_errors: u64,
}

impl LineTally {
    fn add(&mut self, other: &LineTally) {
        self.lines += other.lines;
        self.malformed += other.malformed;
        self.filtered += other.filtered;
        self.numeric_errors += other.numeric_errors;
    }
}

/// Result of key discovery.
#[derive(Debug, Clone, Default)]
pub struct KeyDiscovery {
    pub keys: PendingKeySet,
    pub tally: LineTally,
}

/// Result of the bounded aggregation rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundsOutcome {
    pub rounds: usize,
    pub rows_written: u64,
    pub numeric_errors: u64,
}

/// Admission slot of one document during a round.
#[derive(Debug)]
struct Slot {
    remaining: u32,
    aggregate: Option<Box<DocumentAggregate>>,
}

/// Documents admitted to one aggregation round.
///
/// `admitted` is read-only for the round so workers can skip foreign ids
/// without locking. `slots` holds the counters and aggregates; the whole
/// lookup / accumulate / decrement sequence runs under its lock.
#[derive(Debug)]
struct Round {
    admitted: HashSet<DocumentId>,
    slots: Mutex<HashMap<DocumentId, Slot>>,
}

impl Round {
    fn new(batch: Vec<(DocumentId, u32)>) -> Self {
        let admitted = batch.iter().map(|&(id, _)| id).collect();
        let slots = batch
            .into_iter()
            .map(|(id, remaining)| {
                (
                    id,
                    Slot {
                        remaining,
                        aggregate: None,
                    },
                )
            })
            .collect();
        Round {
            admitted,
            slots: Mutex::new(slots),
        }
    }

    fn is_admitted(&self, id: DocumentId) -> bool {
        self.admitted.contains(&id)
    }

    /// Consumes one counted occurrence of `id`. `values` is `None` for a line
    /// whose numbers were rejected: it still uses up its occurrence.
    fn consume(
        &self,
        id: DocumentId,
        values: Option<[f32; 3]>,
        pool: &Pool<Box<DocumentAggregate>>,
    ) -> Result<(), ProcessorError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.get_mut(&id) else {
            return Ok(());
        };
        if slot.remaining == 0 {
            return Err(ProcessorError::InputChanged { document_id: id });
        }
        slot.remaining -= 1;
        if let Some([nominal, present, acquisition]) = values {
            slot.aggregate
                .get_or_insert_with(|| pool.acquire())
                .accumulate(nominal, present, acquisition);
        }
        Ok(())
    }

    /// Completed aggregates sorted by id. Every admitted document must have
    /// seen all of its counted occurrences.
    fn finish(self) -> Result<Vec<(DocumentId, Box<DocumentAggregate>)>, ProcessorError> {
        let slots = self
            .slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut done = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            if slot.remaining > 0 {
                return Err(ProcessorError::IncompleteDocument {
                    document_id: id,
                    remaining: slot.remaining,
                });
            }
            match slot.aggregate {
                Some(agg) => done.push((id, agg)),
                None => debug!("document {id} had no parsable line, no row written"),
            }
        }
        done.sort_unstable_by_key(|&(id, _)| id);
        Ok(done)
    }
}

/// Two-pass aggregation over a set of receivable files.
///
/// Pass 1 counts, per document id, the lines that survive extraction and
/// filtering. Pass 2 runs rounds: each admits at most `ceiling` pending ids,
/// rescans every file aggregating only those ids, then writes their rows and
/// recycles the aggregates. Resident aggregates never exceed the ceiling and
/// every document gets exactly one row.
#[derive(Debug)]
pub struct Aggregator {
    config: AggregationConfig,
    extractor: ColumnExtractor,
    scheduler: FileScheduler,
    positions: Pool<DelimiterPositions>,
    aggregates: Pool<Box<DocumentAggregate>>,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Result<Self, ProcessorError> {
        config.validate()?;
        let workers = config.worker_count();
        let extractor =
            ColumnExtractor::new(&config.schema, config.delimiter, config.validate_width);
        let delimiters = config.schema.delimiter_count();
        let positions = Pool::new(workers, move || DelimiterPositions::with_capacity(delimiters));
        let aggregates = Pool::new(config.ceiling.min(AGGREGATE_POOL_CAP), || {
            Box::new(DocumentAggregate::new())
        });
        let scheduler = FileScheduler::new(workers)?;

        debug!(
            "aggregator ready: {} workers, ceiling {}, filters {:?}",
            workers, config.ceiling, config.filters
        );

        Ok(Aggregator {
            config,
            extractor,
            scheduler,
            positions,
            aggregates,
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Both passes, writing every row to `report`.
    pub fn run<W: Write>(
        &self,
        files: &[PathBuf],
        report: &mut ReportWriter<W>,
    ) -> Result<RunSummary, ProcessorError> {
        let discovery = self.discover_keys(files)?;
        let distinct_documents = discovery.keys.len();
        let outcome = self.aggregate_rounds(files, discovery.keys, report)?;

        Ok(RunSummary {
            files: files.len(),
            lines: discovery.tally.lines,
            malformed_lines: discovery.tally.malformed,
            filtered_lines: discovery.tally.filtered,
            numeric_errors: outcome.numeric_errors,
            distinct_documents,
            rounds: outcome.rounds,
            rows_written: outcome.rows_written,
        })
    }

    /// Pass 1: occurrence count per document id over all files.
    pub fn discover_keys(&self, files: &[PathBuf]) -> Result<KeyDiscovery, ProcessorError> {
        let started = Instant::now();
        let keys = Mutex::new(PendingKeySet::new());
        let tally = Mutex::new(LineTally::default());

        self.scheduler
            .run(files, |path| self.count_file(path, &keys, &tally))?;

        let discovery = KeyDiscovery {
            keys: keys.into_inner().unwrap_or_else(PoisonError::into_inner),
            tally: tally.into_inner().unwrap_or_else(PoisonError::into_inner),
        };
        info!(
            "key discovery: {} files, {} lines, {} documents ({} malformed, {} filtered) in {:.2?}",
            files.len(),
            discovery.tally.lines,
            discovery.keys.len(),
            discovery.tally.malformed,
            discovery.tally.filtered,
            started.elapsed()
        );
        Ok(discovery)
    }

    /// Pass 2: bounded rounds until no key is pending.
    pub fn aggregate_rounds<W: Write>(
        &self,
        files: &[PathBuf],
        mut pending: PendingKeySet,
        report: &mut ReportWriter<W>,
    ) -> Result<RoundsOutcome, ProcessorError> {
        let mut outcome = RoundsOutcome::default();

        while !pending.is_empty() {
            outcome.rounds += 1;
            let started = Instant::now();
            let round = Round::new(pending.take_batch(self.config.ceiling));
            info!(
                "round {}: {} documents admitted, {} still pending",
                outcome.rounds,
                round.admitted.len(),
                pending.len()
            );

            let tally = Mutex::new(LineTally::default());
            self.scheduler
                .run(files, |path| self.aggregate_file(path, &round, &tally))?;
            outcome.numeric_errors += tally
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .numeric_errors;

            let completed = round.finish()?;
            report.write_rows(completed.iter().map(|(id, agg)| (*id, &**agg)))?;
            outcome.rows_written += completed.len() as u64;
            for (_, agg) in completed {
                self.aggregates.release(agg);
            }

            log!(
                self.progress_level(),
                "round {} done in {:.2?} (aggregate pool: {} created, {} reused)",
                outcome.rounds,
                started.elapsed(),
                self.aggregates.created(),
                self.aggregates.reused()
            );
        }

        Ok(outcome)
    }

    /// Extracts, identifies and filters one line. `Ok(None)` means filtered out.
    fn admit<'a>(
        &self,
        line: &'a [u8],
        positions: &mut DelimiterPositions,
    ) -> Result<Option<(DocumentId, LineFields<'a>)>, LineError> {
        let fields = self.extractor.extract(line, positions)?;
        let id = parse_document_id(fields.document_id)?;
        if !self.config.filters.matches(id, &fields) {
            return Ok(None);
        }
        Ok(Some((id, fields)))
    }

    fn count_file(
        &self,
        path: &Path,
        keys: &Mutex<PendingKeySet>,
        tally: &Mutex<LineTally>,
    ) -> Result<(), ProcessorError> {
        let mut positions = self.positions.checkout();
        let mut local: HashMap<DocumentId, u32> = HashMap::new();
        let mut t = LineTally::default();

        for_each_record(path, |line_no, line| {
            t.lines += 1;
            match self.admit(line, &mut positions) {
                Ok(Some((id, _))) => *local.entry(id).or_insert(0) += 1,
                Ok(None) => t.filtered += 1,
                Err(e) => {
                    t.malformed += 1;
                    Self::log_rejected(path, line_no, &e);
                }
            }
            Ok(())
        })?;

        if t.malformed > 0 {
            warn!("{}: skipped {} malformed lines", path.display(), t.malformed);
        }
        log!(
            self.progress_level(),
            "{}: {} lines, {} documents, {} filtered",
            path.display(),
            t.lines,
            local.len(),
            t.filtered
        );
        keys.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(&local);
        tally.lock().unwrap_or_else(PoisonError::into_inner).add(&t);
        Ok(())
    }

    fn aggregate_file(
        &self,
        path: &Path,
        round: &Round,
        tally: &Mutex<LineTally>,
    ) -> Result<(), ProcessorError> {
        let mut positions = self.positions.checkout();
        let mut scratch = Vec::with_capacity(32);
        let mut t = LineTally::default();
        let number_format = self.config.number_format;

        for_each_record(path, |line_no, line| {
            // Rejected lines were already counted and logged in pass 1.
            let Ok(Some((id, fields))) = self.admit(line, &mut positions) else {
                return Ok(());
            };
            if !round.is_admitted(id) {
                return Ok(());
            }

            match parse_values(&number_format, &fields, &mut scratch) {
                Ok(values) => round.consume(id, Some(values), &self.aggregates),
                Err((column, source)) => match self.config.numeric_errors {
                    NumericErrorPolicy::Abort => Err(ProcessorError::InvalidNumber {
                        path: path.to_path_buf(),
                        line: line_no,
                        column: column.name(),
                        source,
                    }),
                    NumericErrorPolicy::Skip => {
                        t.numeric_errors += 1;
                        let reason = format!("{}: {}", column.name(), source);
                        Self::log_rejected(path, line_no, &reason);
                        round.consume(id, None, &self.aggregates)
                    }
                },
            }
        })?;

        if t.numeric_errors > 0 {
            warn!(
                "{}: skipped {} lines with invalid numbers",
                path.display(),
                t.numeric_errors
            );
        }
        tally.lock().unwrap_or_else(PoisonError::into_inner).add(&t);
        Ok(())
    }

    /// Per-file and per-round progress lines go out at `Info` when the run is
    /// configured with `debug`, so they show under the default log filter.
    fn progress_level(&self) -> Level {
        if self.config.debug {
            Level::Info
        } else {
            Level::Debug
        }
    }

    fn log_rejected(path: &Path, line_no: u64, reason: &dyn std::fmt::Display) {
        debug!("{}:{}: line skipped: {}", path.display(), line_no, reason);
    }
}

fn parse_values(
    format: &NumberFormat,
    fields: &LineFields<'_>,
    scratch: &mut Vec<u8>,
) -> Result<[f32; 3], (Column, NumberError)> {
    let nominal = format
        .parse(fields.nominal_value, scratch)
        .map_err(|e| (Column::NominalValue, e))?;
    let present = format
        .parse(fields.present_value, scratch)
        .map_err(|e| (Column::PresentValue, e))?;
    let acquisition = format
        .parse(fields.acquisition_value, scratch)
        .map_err(|e| (Column::AcquisitionValue, e))?;
    Ok([nominal, present, acquisition])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::schema::Schema;
    use std::{fs, path::PathBuf};
    use tempfile::TempDir;

    fn tiny_schema() -> Schema {
        Schema {
            column_count: 8,
            document_id: 0,
            nominal_value: 1,
            present_value: 2,
            acquisition_value: 3,
            creditor_name: 4,
            creditor_id: 5,
            debtor_name: 6,
            debtor_id: 7,
        }
    }

    fn config(ceiling: usize) -> AggregationConfig {
        AggregationConfig {
            schema: tiny_schema(),
            ceiling,
            workers: 2,
            ..Default::default()
        }
    }

    fn write_files(files: &[(&str, &[&str])]) -> (TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, rows) in files {
            let mut body = String::from("ID;VN;VP;VA;NC;DC;NS;DS\n");
            for row in *rows {
                body.push_str(row);
                body.push('\n');
            }
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    fn run_to_string(aggregator: &Aggregator, files: &[PathBuf]) -> (RunSummary, String) {
        let mut report = ReportWriter::new(Vec::new(), b',');
        let summary = aggregator.run(files, &mut report).unwrap();
        let out = String::from_utf8(report.finish().unwrap()).unwrap();
        (summary, out)
    }

    #[test]
    fn test_discover_counts_occurrences() {
        let (_dir, files) = write_files(&[
            ("a.csv", &["1;1;1;1;A;1;B;2", "2;1;1;1;A;1;B;2"]),
            ("b.csv", &["1;1;1;1;A;1;B;2", "bad line"]),
        ]);
        let aggregator = Aggregator::new(config(10)).unwrap();
        let discovery = aggregator.discover_keys(&files).unwrap();
        assert_eq!(discovery.keys.remaining(1), Some(2));
        assert_eq!(discovery.keys.remaining(2), Some(1));
        assert_eq!(discovery.tally.lines, 4);
        assert_eq!(discovery.tally.malformed, 1);
    }

    #[test]
    fn test_ceiling_splits_rounds_one_row_per_document() {
        let (_dir, files) = write_files(&[
            ("a.csv", &["3;1;1;1;A;1;B;2", "1;2;2;2;A;1;B;2", "2;4;4;4;A;1;B;2"]),
            ("b.csv", &["1;6;6;6;A;1;B;2", "3;5;5;5;A;1;B;2"]),
        ]);
        let aggregator = Aggregator::new(config(1)).unwrap();
        let (summary, out) = run_to_string(&aggregator, &files);

        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.rows_written, 3);
        let rows: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(
            rows,
            vec![
                "1,8,4,6,2,8,4,6,2,8,4,6,2",
                "2,4,4,4,4,4,4,4,4,4,4,4,4",
                "3,6,3,5,1,6,3,5,1,6,3,5,1",
            ]
        );
    }

    #[test]
    fn test_same_output_for_any_ceiling() {
        let (_dir, files) = write_files(&[
            ("a.csv", &["5;1.5;1;1;A;1;B;2", "7;2;2;2;A;1;B;2", "5;3;3;3;A;1;B;2"]),
            ("b.csv", &["9;1;1;1;A;1;B;2", "7;0.25;1;1;A;1;B;2"]),
            ("c.csv", &["5;-1;1;1;A;1;B;2"]),
        ]);
        let (_, wide) = run_to_string(&Aggregator::new(config(100)).unwrap(), &files);
        let (_, narrow) = run_to_string(&Aggregator::new(config(2)).unwrap(), &files);
        assert_eq!(wide, narrow);
    }

    #[test]
    fn test_invalid_number_skipped_but_consumed() {
        let (_dir, files) = write_files(&[("a.csv", &["1;10;1;1;A;1;B;2", "1;1x;1;1;A;1;B;2"])]);
        let aggregator = Aggregator::new(config(10)).unwrap();
        let (summary, out) = run_to_string(&aggregator, &files);
        assert_eq!(summary.numeric_errors, 1);
        assert_eq!(out.lines().nth(1), Some("1,10,10,10,10,1,1,1,1,1,1,1,1"));
    }

    #[test]
    fn test_invalid_number_aborts_under_strict_policy() {
        let (_dir, files) = write_files(&[("a.csv", &["1;1.2.3;1;1;A;1;B;2"])]);
        let aggregator = Aggregator::new(AggregationConfig {
            numeric_errors: NumericErrorPolicy::Abort,
            ..config(10)
        })
        .unwrap();
        let mut report = ReportWriter::new(Vec::new(), b',');
        let err = aggregator.run(&files, &mut report).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::InvalidNumber {
                line: 2,
                column: "VALOR_NOMINAL",
                source: NumberError::MultipleDecimalPoints,
                ..
            }
        ));
    }

    #[test]
    fn test_document_with_only_bad_numbers_has_no_row() {
        let (_dir, files) = write_files(&[("a.csv", &["1;?;1;1;A;1;B;2", "2;3;3;3;A;1;B;2"])]);
        let aggregator = Aggregator::new(config(10)).unwrap();
        let (summary, out) = run_to_string(&aggregator, &files);
        assert_eq!(summary.distinct_documents, 2);
        assert_eq!(summary.rows_written, 1);
        assert!(out.lines().nth(1).unwrap().starts_with("2,"));
    }

    #[test]
    fn test_debug_raises_progress_level() {
        let quiet = Aggregator::new(config(10)).unwrap();
        assert_eq!(quiet.progress_level(), Level::Debug);

        let verbose = Aggregator::new(AggregationConfig {
            debug: true,
            ..config(10)
        })
        .unwrap();
        assert_eq!(verbose.progress_level(), Level::Info);
    }

    #[test]
    fn test_round_detects_extra_occurrence() {
        let pool = Pool::new(4, || Box::new(DocumentAggregate::new()));
        let round = Round::new(vec![(1, 1)]);
        round.consume(1, Some([1.0, 1.0, 1.0]), &pool).unwrap();
        let err = round.consume(1, Some([1.0, 1.0, 1.0]), &pool).unwrap_err();
        assert!(matches!(err, ProcessorError::InputChanged { document_id: 1 }));
    }

    #[test]
    fn test_round_detects_missing_occurrence() {
        let pool = Pool::new(4, || Box::new(DocumentAggregate::new()));
        let round = Round::new(vec![(1, 2), (2, 1)]);
        round.consume(1, Some([1.0, 1.0, 1.0]), &pool).unwrap();
        round.consume(2, Some([1.0, 1.0, 1.0]), &pool).unwrap();
        let err = round.finish().unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::IncompleteDocument {
                document_id: 1,
                remaining: 1
            }
        ));
    }

    #[test]
    fn test_aggregates_recycled_between_rounds() {
        let rows: Vec<String> = (0..6).map(|i| format!("{i};1;1;1;A;1;B;2")).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let (_dir, files) = write_files(&[("a.csv", &rows)]);

        let aggregator = Aggregator::new(config(2)).unwrap();
        let (summary, _) = run_to_string(&aggregator, &files);
        assert_eq!(summary.rounds, 3);
        assert_eq!(aggregator.aggregates.created(), 2);
        assert_eq!(aggregator.aggregates.reused(), 4);
    }
}
