//! Explicit scan context: configuration, rule runner and worker pool

use crate::config::Config;
use crate::counter::{BoundedCounter, CounterError};
use crate::platform::AccessibilityTree;
use crate::registry::{RegistryError, RuleFactory, RuleProvider, RuleRegistration};
use crate::runner::{ExceptionReporter, RuleRunner};
use crate::walker::TreeWalker;
use log::{debug, warn};
use rayon::ThreadPool;
use std::sync::Arc;

/// Everything a walk needs besides the platform
#[derive(Debug)]
pub struct ScanContext {
    config: Config,
    runner: RuleRunner,
    pool: Option<ThreadPool>,
}

impl ScanContext {
    /// Validate the registrations and size the worker pool from `config`
    pub fn new(config: Config, registrations: Vec<RuleRegistration>) -> Result<Self, RegistryError> {
        let factory = RuleFactory::new(registrations)?;
        let runner = RuleRunner::new(Arc::new(RuleProvider::new(factory)));

        let pool = if config.engine.parallel {
            let threads = config.engine.threads();
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => {
                    debug!("Worker pool with {} threads", threads);
                    Some(pool)
                }
                Err(e) => {
                    warn!("Falling back to the global thread pool: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config,
            runner,
            pool,
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ExceptionReporter>) -> Self {
        self.runner = self.runner.with_reporter(reporter);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &RuleRunner {
        &self.runner
    }

    pub fn provider(&self) -> &RuleProvider {
        self.runner.provider()
    }

    /// Walker over `platform` with a fresh counter bounded by `scan.max_elements`
    pub fn walker<'a, P: AccessibilityTree>(
        &'a self,
        platform: &'a P,
    ) -> Result<TreeWalker<'a, P>, CounterError> {
        let counter = BoundedCounter::new(self.config.scan.max_elements)?;
        let walker = TreeWalker::new(platform, counter, self.config.walk_options())
            .with_runner(&self.runner);
        Ok(match &self.pool {
            Some(pool) => walker.with_pool(pool),
            None => walker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SnapshotTree;
    use crate::rules::builtin_registrations;
    use crate::walker::{WalkMode, WalkState};

    #[test]
    fn test_walker_from_config() {
        let mut config = Config::new();
        config.engine.jobs = 2;
        config.scan.max_elements = 5;
        let context = ScanContext::new(config, builtin_registrations()).unwrap();
        assert_eq!(context.provider().factory().len(), 3);

        let platform = SnapshotTree::from_yaml_str("control_type: Pane").unwrap();
        let mut walker = context.walker(&platform).unwrap();
        assert_eq!(walker.counter().upper_bound(), 5);
        assert_eq!(walker.options().mode, WalkMode::Test);

        let scan = walker.walk(&platform.root()).unwrap();
        assert_eq!(scan.state(), WalkState::RulesEvaluated);
    }

    #[test]
    fn test_invalid_bound() {
        let mut config = Config::new();
        config.engine.parallel = false;
        config.scan.max_elements = 0;
        let context = ScanContext::new(config, Vec::new()).unwrap();
        let platform = SnapshotTree::from_yaml_str("control_type: Pane").unwrap();
        assert_eq!(
            context.walker(&platform).unwrap_err(),
            CounterError::InvalidUpperBound(0)
        );
    }

    #[test]
    fn test_duplicate_registrations() {
        let mut registrations = builtin_registrations();
        registrations.extend(builtin_registrations());
        assert!(matches!(
            ScanContext::new(Config::new(), registrations),
            Err(RegistryError::DuplicateRule(_))
        ));
    }
}
