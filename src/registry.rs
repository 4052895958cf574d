//! Rule registry
//!
//! [`RuleFactory`] holds the validated registration table; [`RuleProvider`]
//! turns it into lazily created, shared rule instances.

use crate::rule::{Rule, RuleId, RuleMetadata};
use dashmap::DashMap;
use log::debug;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Registry configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate rule id '{0}'")]
    DuplicateRule(RuleId),

    #[error("Rule registration #{index} ('{rule}') is missing required metadata: {fields}")]
    MissingMetadata {
        index: usize,
        rule: String,
        fields: String,
    },
}

type Constructor = dyn Fn(&RuleMetadata) -> Arc<dyn Rule> + Send + Sync;

/// One entry of the registration table: metadata plus a constructor
#[derive(Clone)]
pub struct RuleRegistration {
    metadata: RuleMetadata,
    constructor: Arc<Constructor>,
}

impl RuleRegistration {
    pub fn new<F>(metadata: RuleMetadata, constructor: F) -> Self
    where
        F: Fn(&RuleMetadata) -> Arc<dyn Rule> + Send + Sync + 'static,
    {
        Self {
            metadata,
            constructor: Arc::new(constructor),
        }
    }

    pub fn id(&self) -> RuleId {
        self.metadata.id
    }

    pub fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn construct(&self) -> Arc<dyn Rule> {
        debug!("Constructing rule '{}'", self.metadata.id);
        (self.constructor)(&self.metadata)
    }
}

impl fmt::Debug for RuleRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistration")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Validated, immutable map from rule id to registration
#[derive(Debug)]
pub struct RuleFactory {
    registrations: Vec<RuleRegistration>,
    index: HashMap<RuleId, usize>,
}

impl RuleFactory {
    pub fn new(registrations: Vec<RuleRegistration>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(registrations.len());

        for (i, registration) in registrations.iter().enumerate() {
            let missing = registration.metadata.missing_fields();
            if !missing.is_empty() {
                return Err(RegistryError::MissingMetadata {
                    index: i,
                    rule: registration.id().to_string(),
                    fields: missing.join(", "),
                });
            }
            if index.insert(registration.id(), i).is_some() {
                return Err(RegistryError::DuplicateRule(registration.id()));
            }
        }

        Ok(Self {
            registrations,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn registration(&self, id: RuleId) -> Option<&RuleRegistration> {
        self.index.get(&id).map(|&i| &self.registrations[i])
    }

    /// Rule ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.registrations.iter().map(RuleRegistration::id)
    }
}

/// Lazily creates and caches one shared instance per rule id
pub struct RuleProvider {
    factory: RuleFactory,
    rules: DashMap<RuleId, Arc<dyn Rule>>,
    materialized: OnceCell<()>,
}

impl RuleProvider {
    pub fn new(factory: RuleFactory) -> Self {
        Self {
            factory,
            rules: DashMap::new(),
            materialized: OnceCell::new(),
        }
    }

    pub fn factory(&self) -> &RuleFactory {
        &self.factory
    }

    /// Shared instance for `id`, created on first request
    ///
    /// Creation happens under the map entry's lock, so concurrent first
    /// requests construct the rule once. Constructors must not call back into
    /// the provider.
    pub fn get_rule(&self, id: RuleId) -> Option<Arc<dyn Rule>> {
        if let Some(rule) = self.rules.get(&id) {
            return Some(Arc::clone(rule.value()));
        }
        let registration = self.factory.registration(id)?;
        let rule = self
            .rules
            .entry(id)
            .or_insert_with(|| registration.construct());
        Some(Arc::clone(rule.value()))
    }

    /// Create every registered rule; runs once per provider
    pub fn materialize_all(&self) {
        self.materialized.get_or_init(|| {
            for id in self.factory.ids() {
                self.get_rule(id);
            }
            debug!("Materialized {} rules", self.rules.len());
        });
    }

    /// Every rule in registration order
    pub fn all_rules(&self) -> Vec<Arc<dyn Rule>> {
        self.materialize_all();
        self.factory
            .ids()
            .filter_map(|id| self.get_rule(id))
            .collect()
    }

    /// Number of rules constructed so far
    pub fn constructed(&self) -> usize {
        self.rules.len()
    }
}

impl fmt::Debug for RuleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleProvider")
            .field("registered", &self.factory.len())
            .field("constructed", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::element::ControlTypeId;
    use crate::rule::{EvaluationCode, FnRule};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn meta(id: &'static str) -> RuleMetadata {
        RuleMetadata::new(id, "Description", "How to fix", "WCAG 1.1.1")
    }

    fn counting(id: &'static str, counter: Arc<AtomicUsize>) -> RuleRegistration {
        RuleRegistration::new(meta(id), move |m| -> Arc<dyn Rule> {
            counter.fetch_add(1, Ordering::SeqCst);
            // Make racing constructions likely if the guard were missing.
            thread::sleep(std::time::Duration::from_millis(5));
            Arc::new(FnRule::new(
                m,
                Some(Condition::control_type(ControlTypeId::BUTTON)),
                |_| Ok(EvaluationCode::Pass),
            ))
        })
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let count = Arc::new(AtomicUsize::new(0));
        let err = RuleFactory::new(vec![
            counting("a", Arc::clone(&count)),
            counting("a", Arc::clone(&count)),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateRule(RuleId("a")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_metadata_rejected() {
        let registration = RuleRegistration::new(
            RuleMetadata::new("b", "Description", "", ""),
            |m| -> Arc<dyn Rule> { Arc::new(FnRule::new(m, None, |_| Ok(EvaluationCode::Pass))) },
        );
        let err = RuleFactory::new(vec![registration]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Rule registration #0 ('b') is missing required metadata: how_to_fix, standard"
        );
    }

    #[test]
    fn test_lazy_creation_and_caching() {
        let count = Arc::new(AtomicUsize::new(0));
        let factory = RuleFactory::new(vec![
            counting("a", Arc::clone(&count)),
            counting("b", Arc::clone(&count)),
        ])
        .unwrap();
        let provider = RuleProvider::new(factory);
        assert_eq!(provider.constructed(), 0);

        let first = provider.get_rule(RuleId("a")).unwrap();
        let second = provider.get_rule(RuleId("a")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(first.info().condition, "Button");

        assert!(provider.get_rule(RuleId("missing")).is_none());
    }

    #[test]
    fn test_concurrent_get_rule_constructs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let provider =
            RuleProvider::new(RuleFactory::new(vec![counting("a", Arc::clone(&count))]).unwrap());
        let barrier = Barrier::new(5);

        thread::scope(|s| {
            for _ in 0..5 {
                s.spawn(|| {
                    barrier.wait();
                    assert!(provider.get_rule(RuleId("a")).is_some());
                });
            }
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_materialize_all_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let provider = RuleProvider::new(
            RuleFactory::new(vec![
                counting("a", Arc::clone(&count)),
                counting("b", Arc::clone(&count)),
                counting("c", Arc::clone(&count)),
            ])
            .unwrap(),
        );

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| provider.materialize_all());
            }
        });
        provider.materialize_all();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        let ids: Vec<RuleId> = provider.all_rules().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![RuleId("a"), RuleId("b"), RuleId("c")]);
    }
}
