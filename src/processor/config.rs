use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use crate::{
    helpers::number::NumberFormat,
    processor::{NumericErrorPolicy, ProcessorError, filter::FilterSet, schema::Schema},
};

/// Everything a run needs, fixed before the first worker starts.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub schema: Schema,
    /// Field delimiter of the input files.
    pub delimiter: u8,
    pub number_format: NumberFormat,
    pub filters: FilterSet,
    /// Maximum number of document aggregates resident at once.
    pub ceiling: usize,
    /// Worker threads per pass; 0 picks the available parallelism.
    pub workers: usize,
    pub numeric_errors: NumericErrorPolicy,
    /// Reject lines narrower than the schema instead of only checking the
    /// columns that are read.
    pub validate_width: bool,
    pub report_delimiter: u8,
    /// Log per-file and per-round progress at `info` instead of `debug`.
    pub debug: bool,
}

impl AggregationConfig {
    pub const DEFAULT_CEILING: usize = 1_000_000;

    pub fn validate(&self) -> Result<(), ProcessorError> {
        self.schema.validate()?;
        if self.ceiling == 0 {
            return Err(ProcessorError::Config("ceiling must be > 0".into()));
        }
        let nf = &self.number_format;
        if nf.grouping == nf.decimal {
            return Err(ProcessorError::Config(
                "grouping and decimal characters must differ".into(),
            ));
        }
        if nf.decimal == self.delimiter || nf.grouping == self.delimiter {
            return Err(ProcessorError::Config(
                "number format characters must differ from the field delimiter".into(),
            ));
        }
        if self.delimiter == b'\n' || self.delimiter == b'\r' {
            return Err(ProcessorError::Config(
                "field delimiter cannot be a line terminator".into(),
            ));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// `dir/calculations[_<filter>-<value>...].csv`
    pub fn report_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("calculations{}.csv", self.filters.file_suffix()))
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            schema: Schema::default(),
            delimiter: b';',
            number_format: NumberFormat::default(),
            filters: FilterSet::default(),
            ceiling: Self::DEFAULT_CEILING,
            workers: 0,
            numeric_errors: NumericErrorPolicy::Skip,
            validate_width: true,
            report_delimiter: b',',
            debug: false,
        }
    }
}
