use crate::processor::ProcessorError;

/// Semantic columns read from every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    DocumentId,
    NominalValue,
    PresentValue,
    AcquisitionValue,
    CreditorName,
    CreditorId,
    DebtorName,
    DebtorId,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::DocumentId,
        Column::NominalValue,
        Column::PresentValue,
        Column::AcquisitionValue,
        Column::CreditorName,
        Column::CreditorId,
        Column::DebtorName,
        Column::DebtorId,
    ];

    /// Header name in the source files.
    pub fn name(self) -> &'static str {
        match self {
            Column::DocumentId => "NU_DOCUMENTO",
            Column::NominalValue => "VALOR_NOMINAL",
            Column::PresentValue => "VALOR_PRESENTE",
            Column::AcquisitionValue => "VALOR_AQUISICAO",
            Column::CreditorName => "NOME_CEDENTE",
            Column::CreditorId => "DOC_CEDENTE",
            Column::DebtorName => "NOME_SACADO",
            Column::DebtorId => "DOC_SACADO",
        }
    }
}

/// Fixed layout of the receivables stock files: total column count and the
/// zero-based position of each semantic column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub column_count: usize,
    pub document_id: usize,
    pub nominal_value: usize,
    pub present_value: usize,
    pub acquisition_value: usize,
    pub creditor_name: usize,
    pub creditor_id: usize,
    pub debtor_name: usize,
    pub debtor_id: usize,
}

impl Schema {
    pub const STOCK_COLUMNS: usize = 54;

    pub fn index(&self, column: Column) -> usize {
        match column {
            Column::DocumentId => self.document_id,
            Column::NominalValue => self.nominal_value,
            Column::PresentValue => self.present_value,
            Column::AcquisitionValue => self.acquisition_value,
            Column::CreditorName => self.creditor_name,
            Column::CreditorId => self.creditor_id,
            Column::DebtorName => self.debtor_name,
            Column::DebtorId => self.debtor_id,
        }
    }

    /// Highest index any semantic column uses.
    pub fn last_needed(&self) -> usize {
        Column::ALL
            .iter()
            .map(|&c| self.index(c))
            .max()
            .unwrap_or(0)
    }

    pub fn delimiter_count(&self) -> usize {
        self.column_count.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.column_count == 0 {
            return Err(ProcessorError::Config("schema has no columns".into()));
        }
        for column in Column::ALL {
            let idx = self.index(column);
            if idx >= self.column_count {
                return Err(ProcessorError::Config(format!(
                    "column {} at index {} is outside a {}-column schema",
                    column.name(),
                    idx,
                    self.column_count
                )));
            }
        }
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            column_count: Self::STOCK_COLUMNS,
            document_id: 16,
            nominal_value: 22,
            present_value: 23,
            acquisition_value: 24,
            creditor_name: 3,
            creditor_id: 4,
            debtor_name: 7,
            debtor_id: 8,
        }
    }
}
