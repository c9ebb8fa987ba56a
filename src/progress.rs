//! Advisory progress reporting. The library core only exposes the
//! contract; rendering a bar to a terminal is the binary's job.

/// A sink for progress updates from a long-running phase of the
/// analysis. Implementations may ignore every call (the default,
/// `NullProgress`) or render a bar, log lines, etc.
///
/// Calls are advisory: a phase that finishes without ever calling
/// `finish` is still considered complete by its caller. No
/// implementation should be relied on for correctness.
pub trait ProgressSink: Send + Sync {
    /// `current` out of `total` items processed in a phase named
    /// `label`. Called frequently; implementations must be cheap.
    fn update(&self, label: &str, current: u64, total: u64);

    /// Marks the named phase as finished.
    fn finish(&self, label: &str);
}

/// A `ProgressSink` that does nothing, for library callers (and tests)
/// that don't want progress output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _label: &str, _current: u64, _total: u64) {}
    fn finish(&self, _label: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_progress_accepts_any_call() {
        let sink = NullProgress;
        sink.update("scanning", 10, 100);
        sink.finish("scanning");
    }
}
