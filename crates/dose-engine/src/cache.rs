//! Memoized expansion.
//!
//! Expansion is pure, so its result is fully determined by the medication's
//! rule and dates plus the window. The cache is owned by the caller and needs
//! `&mut self`; there is no interior mutability.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::Result;
use crate::expander::expand_medication;
use crate::rule::{Medication, Occurrence, RecurrenceRule};

/// Everything an expansion result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpansionKey {
    pub medication_id: String,
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

impl ExpansionKey {
    pub fn new(medication: &Medication, window_start: NaiveDate, window_end: NaiveDate) -> Self {
        Self {
            medication_id: medication.id.clone(),
            rule: medication.rule.clone(),
            start_date: medication.start_date,
            end_date: medication.end_date,
            window_start,
            window_end,
        }
    }
}

#[derive(Debug, Default)]
pub struct ExpansionCache {
    entries: HashMap<ExpansionKey, Arc<[Occurrence]>>,
    hits: u64,
    misses: u64,
}

impl ExpansionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand through the cache. Errors are returned and not cached.
    pub fn expand(
        &mut self,
        medication: &Medication,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Arc<[Occurrence]>> {
        let key = ExpansionKey::new(medication, window_start, window_end);
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(hit));
        }

        let occurrences: Arc<[Occurrence]> =
            expand_medication(medication, window_start, window_end)?.into();
        self.misses += 1;
        self.entries.insert(key, Arc::clone(&occurrences));
        Ok(occurrences)
    }

    /// Drop every cached window of one medication, e.g. after it was edited
    /// in place under the same id.
    pub fn invalidate(&mut self, medication_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.medication_id != medication_id);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
