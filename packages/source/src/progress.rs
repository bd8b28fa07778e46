//! Progress reporting for long-running steps.
//!
//! Library code reports through [`ProgressCallback`] and never draws
//! anything itself; the CLI plugs in an `indicatif` bar, everything else
//! gets [`NullProgress`].

use std::sync::Arc;

/// Receiver of progress updates from a pipeline step.
pub trait ProgressCallback: Send + Sync {
    /// Sets the expected number of units. Zero means unknown.
    fn set_total(&self, total: u64);

    /// Moves to an absolute position.
    fn set_position(&self, pos: u64);

    /// Advances by `delta` units (records, for the crime stream).
    fn inc(&self, delta: u64);

    /// Replaces the text shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the step complete.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
