use crate::processor::{
    DocumentId, ProcessorError, extractor::LineFields, extractor::parse_document_id,
};

/// How a name filter compares against the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Exact,
    Contains,
}

/// Case-insensitive name predicate. The needle is uppercased once, with full
/// Unicode case mapping, so `joão` matches `JOÃO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    needle: String,
    mode: TextMatch,
}

impl TextFilter {
    pub fn new(needle: &str, mode: TextMatch) -> Self {
        TextFilter {
            needle: needle.trim().to_uppercase(),
            mode,
        }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn mode(&self) -> TextMatch {
        self.mode
    }

    pub fn matches(&self, field: &[u8]) -> bool {
        if self.needle.is_empty() {
            return self.mode == TextMatch::Contains || field.is_empty();
        }
        if field.is_ascii() {
            let needle = self.needle.as_bytes();
            return match self.mode {
                TextMatch::Exact => eq_upper(field, needle),
                TextMatch::Contains => field
                    .windows(needle.len())
                    .any(|window| eq_upper(window, needle)),
            };
        }

        let upper = String::from_utf8_lossy(field).to_uppercase();
        match self.mode {
            TextMatch::Exact => upper == self.needle,
            TextMatch::Contains => upper.contains(self.needle.as_str()),
        }
    }
}

/// `field` is ASCII; `upper` is an already-uppercased needle.
fn eq_upper(field: &[u8], upper: &[u8]) -> bool {
    field.len() == upper.len()
        && field
            .iter()
            .zip(upper)
            .all(|(a, b)| a.to_ascii_uppercase() == *b)
}

/// Identity predicates fixed for the whole run. Every configured predicate
/// must hold (logical AND); an empty set accepts every line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    document_id: Option<(DocumentId, String)>,
    creditor_id: Option<Vec<u8>>,
    debtor_id: Option<Vec<u8>>,
    creditor_name: Option<TextFilter>,
    debtor_name: Option<TextFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `docnum`; compared numerically so zero-padded ids still match.
    pub fn document_id(mut self, raw: &str) -> Result<Self, ProcessorError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(self);
        }
        let id = parse_document_id(raw.as_bytes())
            .map_err(|e| ProcessorError::Config(format!("docnum filter: {e}")))?;
        self.document_id = Some((id, raw.to_string()));
        Ok(self)
    }

    /// `doccedente`
    pub fn creditor_id(mut self, raw: &str) -> Self {
        self.creditor_id = non_empty(raw).map(|s| s.as_bytes().to_vec());
        self
    }

    /// `docsacado`
    pub fn debtor_id(mut self, raw: &str) -> Self {
        self.debtor_id = non_empty(raw).map(|s| s.as_bytes().to_vec());
        self
    }

    /// `nomecedente`
    pub fn creditor_name(mut self, raw: &str, mode: TextMatch) -> Self {
        self.creditor_name = non_empty(raw).map(|s| TextFilter::new(s, mode));
        self
    }

    /// `nomesacado`
    pub fn debtor_name(mut self, raw: &str, mode: TextMatch) -> Self {
        self.debtor_name = non_empty(raw).map(|s| TextFilter::new(s, mode));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.document_id.is_none()
            && self.creditor_id.is_none()
            && self.debtor_id.is_none()
            && self.creditor_name.is_none()
            && self.debtor_name.is_none()
    }

    /// Evaluated on the identity columns only, before any monetary field is
    /// parsed.
    pub fn matches(&self, id: DocumentId, fields: &LineFields<'_>) -> bool {
        if let Some((wanted, _)) = self.document_id {
            if id != wanted {
                return false;
            }
        }
        if let Some(wanted) = &self.creditor_id {
            if fields.creditor_id != wanted.as_slice() {
                return false;
            }
        }
        if let Some(wanted) = &self.debtor_id {
            if fields.debtor_id != wanted.as_slice() {
                return false;
            }
        }
        if let Some(filter) = &self.creditor_name {
            if !filter.matches(fields.creditor_name) {
                return false;
            }
        }
        if let Some(filter) = &self.debtor_name {
            if !filter.matches(fields.debtor_name) {
                return false;
            }
        }
        true
    }

    /// `_docnum-123_nomesacado-JOHN` style suffix for the report file name.
    pub fn file_suffix(&self) -> String {
        let mut suffix = String::new();
        let mut push = |key: &str, value: &str| {
            suffix.push('_');
            suffix.push_str(key);
            suffix.push('-');
            suffix.extend(value.chars().map(|c| {
                if c.is_ascii_alphanumeric() {
                    c
                } else {
                    '_'
                }
            }));
        };
        if let Some((_, raw)) = &self.document_id {
            push("docnum", raw);
        }
        if let Some(f) = &self.creditor_name {
            push("nomecedente", f.needle());
        }
        if let Some(v) = &self.creditor_id {
            push("doccedente", &String::from_utf8_lossy(v));
        }
        if let Some(f) = &self.debtor_name {
            push("nomesacado", f.needle());
        }
        if let Some(v) = &self.debtor_id {
            push("docsacado", &String::from_utf8_lossy(v));
        }
        suffix
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    (!raw.is_empty()).then_some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(creditor: &'a [u8], debtor: &'a [u8], debtor_id: &'a [u8]) -> LineFields<'a> {
        LineFields {
            document_id: b"1",
            nominal_value: b"0",
            present_value: b"0",
            acquisition_value: b"0",
            creditor_name: creditor,
            creditor_id: b"11222333000144",
            debtor_name: debtor,
            debtor_id,
        }
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filters = FilterSet::new();
        assert!(filters.is_empty());
        assert!(filters.matches(7, &fields(b"A", b"B", b"C")));
        assert_eq!(filters.file_suffix(), "");
    }

    #[test]
    fn test_document_id_numeric_match() {
        let filters = FilterSet::new().document_id("0001").unwrap();
        assert!(filters.matches(1, &fields(b"A", b"B", b"C")));
        assert!(!filters.matches(2, &fields(b"A", b"B", b"C")));
        assert!(FilterSet::new().document_id("abc").is_err());
    }

    #[test]
    fn test_default_name_modes() {
        let filters = FilterSet::new()
            .creditor_name("acme fidc", TextMatch::Exact)
            .debtor_name("silva", TextMatch::Contains);

        assert!(filters.matches(1, &fields(b"Acme FIDC", b"MARIA DA SILVA", b"1")));
        // Creditor is exact: a longer name does not match.
        assert!(!filters.matches(1, &fields(b"ACME FIDC II", b"MARIA DA SILVA", b"1")));
        assert!(!filters.matches(1, &fields(b"ACME FIDC", b"MARIA SOUZA", b"1")));
    }

    #[test]
    fn test_ids_are_exact_bytes() {
        let filters = FilterSet::new()
            .debtor_id("12345678900")
            .creditor_id("11222333000144");
        assert!(filters.matches(1, &fields(b"A", b"B", b"12345678900")));
        assert!(!filters.matches(1, &fields(b"A", b"B", b"012345678900")));
    }

    #[test]
    fn test_blank_options_are_ignored() {
        let filters = FilterSet::new()
            .document_id("  ")
            .unwrap()
            .creditor_name("", TextMatch::Exact)
            .debtor_id(" ");
        assert!(filters.is_empty());
    }

    #[test]
    fn test_file_suffix() {
        let filters = FilterSet::new()
            .document_id("42")
            .unwrap()
            .debtor_name("João Silva", TextMatch::Contains);
        assert_eq!(filters.file_suffix(), "_docnum-42_nomesacado-JO_O_SILVA");
    }

    #[test]
    fn test_accented_names_uppercased() {
        let filter = TextFilter::new("joão", TextMatch::Contains);
        assert_eq!(filter.needle(), "JOÃO");
        assert!(filter.matches("JOÃO SILVA".as_bytes()));
        assert!(filter.matches("joão silva".as_bytes()));
        assert!(!filter.matches(b"JOAO SILVA"));

        let exact = FilterSet::new().creditor_name("Conceição Fomento", TextMatch::Exact);
        let debtor = "MARIA DA CONCEIÇÃO".as_bytes();
        assert!(exact.matches(1, &fields("CONCEIÇÃO FOMENTO".as_bytes(), debtor, b"1")));
        assert!(!exact.matches(1, &fields("CONCEIÇÃO FOMENTO II".as_bytes(), debtor, b"1")));

        let contains = FilterSet::new().debtor_name("conceição", TextMatch::Contains);
        assert!(contains.matches(1, &fields(b"A", debtor, b"1")));
    }

    #[test]
    fn test_ascii_needle_against_accented_field() {
        let filter = TextFilter::new("silva", TextMatch::Contains);
        assert!(filter.matches("JOÃO SILVA".as_bytes()));
        assert!(!TextFilter::new("silva", TextMatch::Exact).matches("JOÃO SILVA".as_bytes()));
    }
}
