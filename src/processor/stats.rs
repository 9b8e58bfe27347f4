use crate::{helpers::pool::Reset, processor::AggregateOp};

/// Running aggregate of one monetary field.
///
/// Starts at `max = -inf`, `min = +inf` so the first value sets both bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStatistic {
    pub sum: f32,
    pub count: u32,
    pub max: f32,
    pub min: f32,
}

impl FieldStatistic {
    pub const fn new() -> Self {
        FieldStatistic {
            sum: 0.0,
            count: 0,
            max: f32::NEG_INFINITY,
            min: f32::INFINITY,
        }
    }

    #[inline]
    pub fn accumulate(&mut self, value: f32) {
        self.sum += value;
        self.count += 1;
        if value > self.max {
            self.max = value;
        }
        if value < self.min {
            self.min = value;
        }
    }

    pub fn mean(&self) -> Option<f32> {
        (self.count > 0).then(|| self.sum / self.count as f32)
    }

    pub fn value(&self, op: AggregateOp) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        match op {
            AggregateOp::Sum => Some(self.sum),
            AggregateOp::Avg => self.mean(),
            AggregateOp::Max => Some(self.max),
            AggregateOp::Min => Some(self.min),
        }
    }
}

impl Default for FieldStatistic {
    fn default() -> Self {
        Self::new()
    }
}

/// Monetary fields of a receivable, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    Nominal,
    Present,
    Acquisition,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Nominal, Measure::Present, Measure::Acquisition];

    pub fn prefix(self) -> &'static str {
        match self {
            Measure::Nominal => "VN",
            Measure::Present => "VP",
            Measure::Acquisition => "VA",
        }
    }
}

/// Statistics of the three monetary fields of one document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DocumentAggregate {
    pub nominal: FieldStatistic,
    pub present: FieldStatistic,
    pub acquisition: FieldStatistic,
}

impl DocumentAggregate {
    pub const fn new() -> Self {
        DocumentAggregate {
            nominal: FieldStatistic::new(),
            present: FieldStatistic::new(),
            acquisition: FieldStatistic::new(),
        }
    }

    /// Callers must hold whatever lock guards this aggregate so the three
    /// updates land together.
    #[inline]
    pub fn accumulate(&mut self, nominal: f32, present: f32, acquisition: f32) {
        self.nominal.accumulate(nominal);
        self.present.accumulate(present);
        self.acquisition.accumulate(acquisition);
    }

    pub fn field(&self, measure: Measure) -> &FieldStatistic {
        match measure {
            Measure::Nominal => &self.nominal,
            Measure::Present => &self.present,
            Measure::Acquisition => &self.acquisition,
        }
    }

    pub fn count(&self) -> u32 {
        self.nominal.count
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl Reset for DocumentAggregate {
    fn reset(&mut self) {
        *self = DocumentAggregate::new();
    }
}
