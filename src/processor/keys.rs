use std::collections::{BTreeMap, HashMap};

use crate::processor::DocumentId;

/// Remaining expected occurrences per document id, built by key discovery.
///
/// Ordered by id so rounds admit documents (and write rows) in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingKeySet {
    remaining: BTreeMap<DocumentId, u32>,
}

impl PendingKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: DocumentId, occurrences: u32) {
        if occurrences > 0 {
            *self.remaining.entry(id).or_insert(0) += occurrences;
        }
    }

    /// Folds one worker's per-file counts in.
    pub fn merge(&mut self, counts: &HashMap<DocumentId, u32>) {
        for (&id, &n) in counts {
            self.record(id, n);
        }
    }

    pub fn remaining(&self, id: DocumentId) -> Option<u32> {
        self.remaining.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.remaining.values().map(|&n| u64::from(n)).sum()
    }

    /// Removes and returns up to `limit` ids, lowest first.
    pub fn take_batch(&mut self, limit: usize) -> Vec<(DocumentId, u32)> {
        let mut batch = Vec::with_capacity(limit.min(self.remaining.len()));
        while batch.len() < limit {
            match self.remaining.pop_first() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        batch
    }
}
