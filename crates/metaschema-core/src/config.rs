//! Validation run configuration.

use std::num::NonZeroUsize;
use std::thread;

/// Settings for one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Number of worker threads per phase. 1 runs on the calling thread.
    pub parallelism: usize,

    /// Stop dispatching new context nodes once this many findings exist.
    /// None means unlimited.
    pub max_findings: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            max_findings: None,
        }
    }
}

impl ValidationConfig {
    /// Sequential run without a finding budget.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Use one worker per available CPU.
    pub fn parallel() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            parallelism: workers,
            ..Default::default()
        }
    }

    /// Set the number of workers. Zero is treated as one.
    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = workers.max(1);
        self
    }

    /// Set the finding budget.
    pub fn with_max_findings(mut self, max: usize) -> Self {
        self.max_findings = Some(max);
        self
    }

    /// Effective worker count for `items` units of work.
    pub(crate) fn workers_for(&self, items: usize) -> usize {
        self.parallelism.max(1).min(items.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sequential() {
        let config = ValidationConfig::default();
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.max_findings, None);
        assert_eq!(config, ValidationConfig::sequential());
    }

    #[test]
    fn test_builder() {
        let config = ValidationConfig::default()
            .with_parallelism(0)
            .with_max_findings(10);
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.max_findings, Some(10));
    }

    #[test]
    fn test_workers_for() {
        let config = ValidationConfig::default().with_parallelism(8);
        assert_eq!(config.workers_for(3), 3);
        assert_eq!(config.workers_for(100), 8);
        assert_eq!(config.workers_for(0), 1);
        assert!(ValidationConfig::parallel().parallelism >= 1);
    }
}
