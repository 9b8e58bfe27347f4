use memchr::memchr_iter;

use crate::{
    helpers::pool::Reset,
    processor::{
        DocumentId, LineError,
        schema::{Column, Schema},
    },
};

/// Byte offsets of the delimiters of one line. Pooled per worker and cleared
/// for every line, so it only allocates when a worker first checks it out.
#[derive(Debug, Clone, Default)]
pub struct DelimiterPositions {
    offsets: Vec<usize>,
}

impl DelimiterPositions {
    pub fn with_capacity(n: usize) -> Self {
        DelimiterPositions {
            offsets: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.offsets
    }
}

impl Reset for DelimiterPositions {
    fn reset(&mut self) {
        self.offsets.clear();
    }
}

/// Borrowed views of the semantic columns of one line. Nothing here may
/// outlive the line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFields<'a> {
    pub document_id: &'a [u8],
    pub nominal_value: &'a [u8],
    pub present_value: &'a [u8],
    pub acquisition_value: &'a [u8],
    pub creditor_name: &'a [u8],
    pub creditor_id: &'a [u8],
    pub debtor_name: &'a [u8],
    pub debtor_id: &'a [u8],
}

/// Slices fixed columns out of a delimited line without copying.
#[derive(Debug, Clone)]
pub struct ColumnExtractor {
    schema: Schema,
    delimiter: u8,
    validate_width: bool,
    wanted: usize,
}

impl ColumnExtractor {
    /// With `validate_width` every line must carry the full schema width;
    /// without it the scan stops as soon as the last semantic column is closed.
    pub fn new(schema: &Schema, delimiter: u8, validate_width: bool) -> Self {
        let wanted = if validate_width {
            schema.delimiter_count()
        } else {
            (schema.last_needed() + 1).min(schema.delimiter_count())
        };
        ColumnExtractor {
            schema: schema.clone(),
            delimiter,
            validate_width,
            wanted,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn extract<'a>(
        &self,
        line: &'a [u8],
        positions: &mut DelimiterPositions,
    ) -> Result<LineFields<'a>, LineError> {
        positions.reset();
        if self.wanted > 0 {
            for pos in memchr_iter(self.delimiter, line) {
                positions.offsets.push(pos);
                if positions.offsets.len() == self.wanted {
                    break;
                }
            }
        }

        let found = positions.len();
        let required = if self.validate_width {
            self.schema.delimiter_count()
        } else {
            self.schema.last_needed()
        };
        if found < required {
            return Err(LineError::TooFewColumns {
                found: found + 1,
                expected: required + 1,
            });
        }

        let offsets = positions.as_slice();
        let field = move |column: Column| -> &'a [u8] {
            let idx = self.schema.index(column);
            let start = if idx == 0 { 0 } else { offsets[idx - 1] + 1 };
            // Last column of the line: no delimiter follows it.
            let end = offsets.get(idx).copied().unwrap_or(line.len());
            &line[start..end]
        };

        let fields = LineFields {
            document_id: field(Column::DocumentId),
            nominal_value: field(Column::NominalValue),
            present_value: field(Column::PresentValue),
            acquisition_value: field(Column::AcquisitionValue),
            creditor_name: field(Column::CreditorName),
            creditor_id: field(Column::CreditorId),
            debtor_name: field(Column::DebtorName),
            debtor_id: field(Column::DebtorId),
        };

        if fields.document_id.is_empty() {
            return Err(LineError::EmptyDocumentId);
        }
        Ok(fields)
    }
}

/// Parses a fixed-width, possibly zero-padded, numeric document id.
pub fn parse_document_id(bytes: &[u8]) -> Result<DocumentId, LineError> {
    if bytes.is_empty() {
        return Err(LineError::EmptyDocumentId);
    }
    let significant = bytes
        .iter()
        .position(|&b| b != b'0')
        .map_or(&bytes[bytes.len()..], |first| &bytes[first..]);
    if significant.is_empty() {
        return Ok(0);
    }
    atoi_simd::parse::<DocumentId>(significant)
        .map_err(|_| LineError::InvalidDocumentId(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_schema() -> Schema {
        Schema {
            column_count: 6,
            document_id: 0,
            nominal_value: 1,
            present_value: 2,
            acquisition_value: 3,
            creditor_name: 4,
            creditor_id: 4,
            debtor_name: 5,
            debtor_id: 5,
        }
    }

    #[test]
    fn test_extract_slices_without_copy() {
        let extractor = ColumnExtractor::new(&small_schema(), b';', true);
        let mut positions = DelimiterPositions::with_capacity(5);
        let line = b"42;10.00;9.50;8.00;ACME;JOHN";
        let fields = extractor.extract(line, &mut positions).unwrap();

        assert_eq!(fields.document_id, b"42");
        assert_eq!(fields.nominal_value, b"10.00");
        assert_eq!(fields.present_value, b"9.50");
        assert_eq!(fields.acquisition_value, b"8.00");
        assert_eq!(fields.creditor_name, b"ACME");
        // Final column falls back to the end of the line.
        assert_eq!(fields.debtor_name, b"JOHN");
        assert_eq!(fields.document_id.as_ptr(), line.as_ptr());
        assert_eq!(positions.len(), 5);
    }

    #[test]
    fn test_extract_default_schema_width() {
        let mut cols = vec!["x"; Schema::STOCK_COLUMNS];
        cols[16] = "0000123";
        cols[22] = "1,000.50";
        let line = cols.join(";");

        let extractor = ColumnExtractor::new(&Schema::default(), b';', true);
        let mut positions = DelimiterPositions::default();
        let fields = extractor.extract(line.as_bytes(), &mut positions).unwrap();
        assert_eq!(fields.document_id, b"0000123");
        assert_eq!(fields.nominal_value, b"1,000.50");
        assert_eq!(positions.len(), 53);
    }

    #[test]
    fn test_short_line_rejected() {
        let extractor = ColumnExtractor::new(&small_schema(), b';', true);
        let mut positions = DelimiterPositions::default();
        let err = extractor
            .extract(b"42;10.00;9.50", &mut positions)
            .unwrap_err();
        assert_eq!(
            err,
            LineError::TooFewColumns {
                found: 3,
                expected: 6
            }
        );
    }

    #[test]
    fn test_empty_document_id_rejected() {
        let extractor = ColumnExtractor::new(&small_schema(), b';', true);
        let mut positions = DelimiterPositions::default();
        let err = extractor
            .extract(b";1;2;3;A;B", &mut positions)
            .unwrap_err();
        assert_eq!(err, LineError::EmptyDocumentId);
    }

    #[test]
    fn test_relaxed_width_stops_early() {
        let schema = Schema {
            column_count: 10,
            ..small_schema()
        };
        let extractor = ColumnExtractor::new(&schema, b';', false);
        let mut positions = DelimiterPositions::default();
        let line = b"7;1;2;3;A;B;c;d;e;f";
        let fields = extractor.extract(line, &mut positions).unwrap();
        assert_eq!(fields.debtor_id, b"B");
        assert_eq!(positions.len(), 6);

        // Missing trailing columns are fine as long as the needed ones exist.
        let fields = extractor.extract(b"7;1;2;3;A;B", &mut positions).unwrap();
        assert_eq!(fields.debtor_id, b"B");
    }

    #[test]
    fn test_positions_reused_across_lines() {
        let extractor = ColumnExtractor::new(&small_schema(), b';', true);
        let mut positions = DelimiterPositions::with_capacity(5);
        extractor
            .extract(b"1;2;3;4;5;6", &mut positions)
            .unwrap();
        let fields = extractor
            .extract(b"9;8;7;6;5;4", &mut positions)
            .unwrap();
        assert_eq!(fields.document_id, b"9");
        assert_eq!(positions.len(), 5);
    }

    #[test]
    fn test_parse_document_id() {
        assert_eq!(parse_document_id(b"0000000123"), Ok(123));
        assert_eq!(parse_document_id(b"000"), Ok(0));
        assert_eq!(parse_document_id(b"4294967295"), Ok(u32::MAX));
        assert!(parse_document_id(b"4294967296").is_err());
        assert!(parse_document_id(b"12A").is_err());
        assert_eq!(parse_document_id(b""), Err(LineError::EmptyDocumentId));
    }
}
