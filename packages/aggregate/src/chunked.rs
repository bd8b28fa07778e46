//! Streaming aggregation of crime batches onto grid cells.

use crime_grid_crime_models::CrimeEvent;
use crime_grid_source::progress::{NullProgress, ProgressCallback};
use crime_grid_source::{CrimeBatchSource, SourceError};
use crime_grid_spatial::CellIndex;

use crate::{CellAggregates, MonthlyTally};

/// Counters describing one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub batches: u64,
    pub events_seen: u64,
    /// Events that resolved to a cell. Always equals the sum of
    /// `crime_count_total` over all cells.
    pub events_classified: u64,
    /// Events outside every cell; skipped.
    pub events_outside: u64,
}

/// Everything an aggregation run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOutput {
    pub aggregates: CellAggregates,
    pub monthly: MonthlyTally,
    pub stats: AggregationStats,
}

/// Accumulates crime events one batch at a time.
///
/// Every update is a commutative increment, so totals do not depend on
/// batch size, batch boundaries or event order. State only grows: if a
/// source fails mid-stream, everything ingested so far stays intact and
/// the aggregator can keep consuming another source or be finished.
pub struct ChunkedAggregator<'a> {
    index: &'a CellIndex<'a>,
    aggregates: CellAggregates,
    monthly: MonthlyTally,
    stats: AggregationStats,
    /// Tracked-category slot per interned primary type id.
    tracked_slots: Vec<Option<usize>>,
}

impl<'a> ChunkedAggregator<'a> {
    /// Zeroed accumulators for every cell of the index's grid.
    #[must_use]
    pub fn new(index: &'a CellIndex<'a>, categories: &[String]) -> Self {
        Self {
            aggregates: CellAggregates::new(index.grid().len(), categories),
            monthly: MonthlyTally::new(),
            stats: AggregationStats::default(),
            tracked_slots: Vec::new(),
            index,
        }
    }

    /// Classifies and counts every event of one batch.
    pub fn ingest_batch(&mut self, batch: &[CrimeEvent]) {
        self.stats.batches += 1;
        for event in batch {
            self.ingest_event(event);
        }
    }

    fn ingest_event(&mut self, event: &CrimeEvent) {
        self.stats.events_seen += 1;

        let Some(cell_id) = self.index.classify(event.location) else {
            self.stats.events_outside += 1;
            return;
        };
        self.stats.events_classified += 1;

        let type_id = self.monthly.intern(&event.primary_type);
        let slot = self.tracked_slot(type_id, &event.primary_type);

        self.aggregates.record(cell_id, slot);
        self.monthly.record(cell_id, event.when, type_id);
    }

    /// Slot of an interned type among the tracked categories, resolved
    /// once per type.
    fn tracked_slot(&mut self, type_id: usize, primary_type: &str) -> Option<usize> {
        if type_id >= self.tracked_slots.len() {
            self.tracked_slots.resize(type_id + 1, None);
            self.tracked_slots[type_id] = self.aggregates.category_slot(primary_type);
        }
        self.tracked_slots[type_id]
    }

    /// Pulls batches from `source` until it is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the source's error. Batches ingested before the failure are
    /// kept.
    pub fn consume<S: CrimeBatchSource + ?Sized>(
        &mut self,
        source: &mut S,
        progress: &dyn ProgressCallback,
    ) -> Result<(), SourceError> {
        while let Some(batch) = source.next_batch()? {
            self.ingest_batch(&batch);
            progress.inc(batch.len() as u64);

            log::info!(
                "Batch {}: {} events ({} classified, {} outside grid so far)",
                self.stats.batches,
                batch.len(),
                self.stats.events_classified,
                self.stats.events_outside
            );
        }
        Ok(())
    }

    #[must_use]
    pub const fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    #[must_use]
    pub const fn aggregates(&self) -> &CellAggregates {
        &self.aggregates
    }

    #[must_use]
    pub const fn monthly(&self) -> &MonthlyTally {
        &self.monthly
    }

    /// Consumes the aggregator and returns its accumulators.
    #[must_use]
    pub fn finish(self) -> AggregationOutput {
        log::debug!(
            "Aggregation finished: {} batches, {} events, {} monthly rows",
            self.stats.batches,
            self.stats.events_seen,
            self.monthly.len()
        );

        AggregationOutput {
            aggregates: self.aggregates,
            monthly: self.monthly,
            stats: self.stats,
        }
    }
}

/// Aggregates a whole source in one call, without progress reporting.
///
/// # Errors
///
/// Returns the source's error if a batch cannot be produced.
pub fn aggregate<S: CrimeBatchSource + ?Sized>(
    source: &mut S,
    index: &CellIndex<'_>,
    categories: &[String],
) -> Result<AggregationOutput, SourceError> {
    let mut aggregator = ChunkedAggregator::new(index, categories);
    aggregator.consume(source, &NullProgress)?;
    Ok(aggregator.finish())
}
