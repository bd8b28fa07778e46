//! Dense per-cell counters and the sparse monthly tally.

use std::collections::BTreeMap;

use crime_grid_crime_models::{Month, TemporalBucket, category_column};
use crime_grid_spatial::CellId;

use crate::AggregateError;

/// Column order of the monthly table.
pub const MONTHLY_COLUMNS: [&str; 6] = [
    "cell_id",
    "month",
    "hour",
    "dow",
    "primary_type",
    "crime_count",
];

/// Total and per-tracked-category crime counts for every cell.
///
/// Storage is dense and indexed by `cell_id`, so every cell has a row even
/// when nothing landed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAggregates {
    categories: Vec<String>,
    totals: Vec<u64>,
    /// Cell-major: `by_category[cell_id * categories.len() + slot]`.
    by_category: Vec<u64>,
}

impl CellAggregates {
    /// Zeroed counters for `cell_count` cells. Duplicate categories are
    /// tracked once.
    #[must_use]
    pub fn new(cell_count: usize, categories: &[String]) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(categories.len());
        for category in categories {
            if !unique.contains(category) {
                unique.push(category.clone());
            }
        }

        Self {
            totals: vec![0; cell_count],
            by_category: vec![0; cell_count * unique.len()],
            categories: unique,
        }
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.totals.len()
    }

    /// Tracked categories in column order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// `crime_<category>` column names, in the same order as
    /// [`Self::categories`].
    #[must_use]
    pub fn category_columns(&self) -> Vec<String> {
        self.categories.iter().map(|c| category_column(c)).collect()
    }

    /// Position of `category` among the tracked categories (exact match).
    #[must_use]
    pub fn category_slot(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    /// `crime_count_total` of a cell; zero for unknown cells.
    #[must_use]
    pub fn total(&self, cell_id: CellId) -> u64 {
        self.totals.get(cell_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn totals(&self) -> &[u64] {
        &self.totals
    }

    /// Per-category counts of a cell, aligned with [`Self::categories`].
    #[must_use]
    pub fn category_counts(&self, cell_id: CellId) -> &[u64] {
        let width = self.categories.len();
        let start = cell_id * width;
        self.by_category.get(start..start + width).unwrap_or(&[])
    }

    /// Count of one tracked category in a cell, or `None` if the category is
    /// not tracked.
    #[must_use]
    pub fn category_count(&self, cell_id: CellId, category: &str) -> Option<u64> {
        let slot = self.category_slot(category)?;
        Some(self.category_counts(cell_id).get(slot).copied().unwrap_or(0))
    }

    /// Sum of `crime_count_total` over all cells.
    #[must_use]
    pub fn grand_total(&self) -> u64 {
        self.totals.iter().sum()
    }

    /// Counts one event in `cell_id`, and in its category slot if tracked.
    pub(crate) fn record(&mut self, cell_id: CellId, slot: Option<usize>) {
        self.totals[cell_id] += 1;
        if let Some(slot) = slot {
            self.by_category[cell_id * self.categories.len() + slot] += 1;
        }
    }

    /// Adds `other`'s counts into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::ShapeMismatch`] if the two were built for
    /// different cell counts or category lists.
    pub fn merge(&mut self, other: &Self) -> Result<(), AggregateError> {
        if self.totals.len() != other.totals.len() || self.categories != other.categories {
            return Err(AggregateError::ShapeMismatch {
                message: format!(
                    "cannot merge {} cells {:?} into {} cells {:?}",
                    other.totals.len(),
                    other.categories,
                    self.totals.len(),
                    self.categories
                ),
            });
        }

        for (mine, theirs) in self.totals.iter_mut().zip(&other.totals) {
            *mine += theirs;
        }
        for (mine, theirs) in self.by_category.iter_mut().zip(&other.by_category) {
            *mine += theirs;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TallyKey {
    cell_id: CellId,
    when: TemporalBucket,
    type_id: usize,
}

/// One row of the monthly table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthlyRow<'a> {
    pub cell_id: CellId,
    pub month: Month,
    pub hour: u8,
    pub dow: u8,
    pub primary_type: &'a str,
    pub crime_count: u64,
}

/// Sparse event counts keyed by (cell, month, hour, weekday, primary type).
///
/// Only observed keys are stored. Primary types are interned so a key is a
/// small `Copy` value.
#[derive(Debug, Clone, Default)]
pub struct MonthlyTally {
    primary_types: Vec<String>,
    type_ids: BTreeMap<String, usize>,
    counts: BTreeMap<TallyKey, u64>,
}

impl MonthlyTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `primary_type`, assigning the next one if unseen.
    pub(crate) fn intern(&mut self, primary_type: &str) -> usize {
        if let Some(&id) = self.type_ids.get(primary_type) {
            return id;
        }
        let id = self.primary_types.len();
        self.primary_types.push(primary_type.to_owned());
        self.type_ids.insert(primary_type.to_owned(), id);
        id
    }

    pub(crate) fn record(&mut self, cell_id: CellId, when: TemporalBucket, type_id: usize) {
        *self
            .counts
            .entry(TallyKey {
                cell_id,
                when,
                type_id,
            })
            .or_insert(0) += 1;
    }

    /// Counts one event.
    pub fn increment(&mut self, cell_id: CellId, when: TemporalBucket, primary_type: &str) {
        let type_id = self.intern(primary_type);
        self.record(cell_id, when, type_id);
    }

    /// Count for one key; zero if never observed.
    #[must_use]
    pub fn get(&self, cell_id: CellId, when: TemporalBucket, primary_type: &str) -> u64 {
        self.type_ids
            .get(primary_type)
            .and_then(|&type_id| {
                self.counts.get(&TallyKey {
                    cell_id,
                    when,
                    type_id,
                })
            })
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct observed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Distinct primary types seen, in first-seen order.
    #[must_use]
    pub fn primary_types(&self) -> &[String] {
        &self.primary_types
    }

    /// All rows, sorted by cell, month, hour, weekday, then primary type.
    #[must_use]
    pub fn rows(&self) -> Vec<MonthlyRow<'_>> {
        let mut rows: Vec<MonthlyRow<'_>> = self
            .counts
            .iter()
            .map(|(key, &crime_count)| MonthlyRow {
                cell_id: key.cell_id,
                month: key.when.month,
                hour: key.when.hour,
                dow: key.when.dow,
                primary_type: &self.primary_types[key.type_id],
                crime_count,
            })
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Adds `other`'s counts into `self`.
    pub fn merge(&mut self, other: &Self) {
        for (key, count) in &other.counts {
            let type_id = self.intern(&other.primary_types[key.type_id]);
            *self
                .counts
                .entry(TallyKey { type_id, ..*key })
                .or_insert(0) += count;
        }
    }
}

impl PartialEq for MonthlyTally {
    fn eq(&self, other: &Self) -> bool {
        self.rows() == other.rows()
    }
}

impl Eq for MonthlyTally {}
