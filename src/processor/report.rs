use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use crate::processor::{
    AggregateOp, DocumentId, ProcessorError,
    stats::{DocumentAggregate, Measure},
};

/// Header written once at the top of every report.
pub const REPORT_HEADER: [&str; 13] = [
    "NU_DOCUMENTO",
    "VN_SOMA",
    "VN_MEDIA",
    "VN_MAX",
    "VN_MIN",
    "VP_SOMA",
    "VP_MEDIA",
    "VP_MAX",
    "VP_MIN",
    "VA_SOMA",
    "VA_MEDIA",
    "VA_MAX",
    "VA_MIN",
];

/// Appends aggregate rows to a delimited report, one flush event per round.
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    out: BufWriter<W>,
    delimiter: u8,
    header_written: bool,
    rows: u64,
    label: String,
}

impl ReportWriter<File> {
    /// Creates (truncating) the report file, and its parent directory if needed.
    pub fn create(path: &Path, delimiter: u8) -> Result<Self, ProcessorError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ProcessorError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| ProcessorError::io(path, e))?;
        let mut writer = ReportWriter::new(file, delimiter);
        writer.label = path.display().to_string();
        Ok(writer)
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, delimiter: u8) -> Self {
        ReportWriter {
            out: BufWriter::new(out),
            delimiter,
            header_written: false,
            rows: 0,
            label: "<report>".to_string(),
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    fn write_header(&mut self) -> Result<(), ProcessorError> {
        if self.header_written {
            return Ok(());
        }
        let mut line = String::with_capacity(160);
        for (i, name) in REPORT_HEADER.iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter as char);
            }
            line.push_str(name);
        }
        line.push('\n');
        self.write_bytes(line.as_bytes())?;
        self.header_written = true;
        Ok(())
    }

    /// Writes one row per aggregate, in the order given.
    pub fn write_rows<'r, I>(&mut self, rows: I) -> Result<(), ProcessorError>
    where
        I: IntoIterator<Item = (DocumentId, &'r DocumentAggregate)>,
    {
        self.write_header()?;
        let mut line = String::with_capacity(256);
        for (id, agg) in rows {
            line.clear();
            format_row(&mut line, id, agg, self.delimiter as char);
            self.write_bytes(line.as_bytes())?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Flushes and hands back the sink. The header is present even when no
    /// row was ever written.
    pub fn finish(mut self) -> Result<W, ProcessorError> {
        self.write_header()?;
        let label = std::mem::take(&mut self.label);
        self.out
            .into_inner()
            .map_err(|e| ProcessorError::io(label, e.into_error()))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProcessorError> {
        self.out
            .write_all(bytes)
            .map_err(|e| ProcessorError::io(&self.label, e))
    }
}

fn format_row(line: &mut String, id: DocumentId, agg: &DocumentAggregate, delimiter: char) {
    use std::fmt::Write as _;

    // Writing into a String cannot fail.
    let _ = write!(line, "{id}");
    for measure in Measure::ALL {
        let stat = agg.field(measure);
        for op in AggregateOp::ALL {
            line.push(delimiter);
            if let Some(v) = stat.value(op) {
                let _ = write!(line, "{v}");
            }
        }
    }
    line.push('\n');
}
