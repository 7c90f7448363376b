//! Progress reporting for imports and fetches.
//!
//! [`ProgressCallback`] keeps the ingestion library independent of how
//! progress is rendered. The ingestion binary plugs in `indicatif` bars.

/// Receives progress updates from a long-running import.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the work as complete with a final message.
    fn finish(&self, msg: String);
}
