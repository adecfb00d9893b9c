//! Stress run configuration.

use core::time::Duration;

/// Shape of a stress run: how many workers, how many iterations each, and an
/// optional wall-clock cap that stops workers early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    thread_count: usize,
    iterations: usize,
    duration: Option<Duration>,
}

impl StressConfig {
    /// Defaults: 4 threads, 1000 iterations each, no time cap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            thread_count: 4,
            iterations: 1000,
            duration: None,
        }
    }

    /// The mutual exclusion run: 8 threads, 100,000 increments each.
    #[must_use]
    pub const fn exclusion() -> Self {
        Self::new().threads(8).iterations(100_000)
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub const fn threads(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    /// Sets the number of iterations per thread.
    #[must_use]
    pub const fn iterations(mut self, count: usize) -> Self {
        self.iterations = count;
        self
    }

    /// Stops every worker once `duration` has passed, even mid-run.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub const fn get_thread_count(&self) -> usize {
        self.thread_count
    }

    #[must_use]
    pub const fn get_iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub const fn get_duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Operations a full run performs when no time cap cuts it short.
    #[must_use]
    pub const fn planned_operations(&self) -> usize {
        self.thread_count.saturating_mul(self.iterations)
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_presets() {
        let config = StressConfig::new().threads(3).iterations(7);
        assert_eq!(config.planned_operations(), 21);
        assert_eq!(config.get_duration(), None);

        let exclusion = StressConfig::exclusion();
        assert_eq!(exclusion.get_thread_count(), 8);
        assert_eq!(exclusion.planned_operations(), 800_000);

        let capped = StressConfig::default().duration(Duration::from_millis(5));
        assert_eq!(capped.get_duration(), Some(Duration::from_millis(5)));
    }
}
