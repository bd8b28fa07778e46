//! Batch source over events already held in memory.

use std::vec;

use crime_grid_crime_models::CrimeEvent;

use crate::{CrimeBatchSource, SourceError};

/// Serves a fixed list of events in batches of `batch_size`.
///
/// Useful for small inputs and for re-batching the same events at
/// different sizes.
pub struct VecBatchSource {
    events: vec::IntoIter<CrimeEvent>,
    batch_size: usize,
}

impl VecBatchSource {
    /// A `batch_size` of zero is treated as one.
    #[must_use]
    pub fn new(events: Vec<CrimeEvent>, batch_size: usize) -> Self {
        Self {
            events: events.into_iter(),
            batch_size: batch_size.max(1),
        }
    }

    /// Events not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl CrimeBatchSource for VecBatchSource {
    fn next_batch(&mut self) -> Result<Option<Vec<CrimeEvent>>, SourceError> {
        let batch: Vec<CrimeEvent> = self.events.by_ref().take(self.batch_size).collect();
        Ok(if batch.is_empty() { None } else { Some(batch) })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use geo::Point;

    use super::*;

    fn events(n: u32) -> Vec<CrimeEvent> {
        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| CrimeEvent::at(Point::new(f64::from(i), 0.0), "THEFT", at))
            .collect()
    }

    #[test]
    fn splits_into_bounded_batches() {
        let mut source = VecBatchSource::new(events(5), 2);

        let sizes: Vec<usize> = std::iter::from_fn(|| source.next_batch().unwrap())
            .map(|batch| batch.len())
            .collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert_eq!(source.remaining(), 0);
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn empty_source_ends_immediately() {
        let mut source = VecBatchSource::new(Vec::new(), 10);
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn zero_batch_size_still_makes_progress() {
        let mut source = VecBatchSource::new(events(2), 0);
        assert_eq!(source.next_batch().unwrap().unwrap().len(), 1);
    }
}
