//! Effect Manager
//!
//! An effect is an async computation bound to a key in a valued dependency
//! graph. The manager runs effects in topological order, either all of them
//! or only those reachable from a set of changed names.
//!
//! # Passes
//!
//! - **Full pass** (`trigger_effects(None)`): every bound effect runs exactly
//!   once, in order, regardless of what changed.
//!
//! - **Incremental pass** (`trigger_effects(Some(names))`): a key is skipped
//!   unless one of its dependencies is in the changed set. An effect that runs
//!   adds the names it reports to the set; a key without an effect (a relay,
//!   such as a bare field name depending on `"field:disabled"`) adds its own
//!   name. Keys later in the order see the grown set.
//!
//! Keys with no dependencies can only run in a full pass.
//!
//! # Failure
//!
//! A failing callback aborts the pass. Nodes not yet reached stay
//! unevaluated and mutations made by earlier nodes are kept.
//!
//! # Concurrency
//!
//! Callbacks are awaited one at a time. At most one pass may be in flight per
//! manager; a second concurrent call returns [`Error::PassInProgress`]. The
//! graph lock is never held across an `await`, so callbacks may register new
//! effects (they take part from the next pass on).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{BoxError, Error, Result};
use crate::graph::ValuedDependencyGraph;
use crate::state::ChangedNames;

/// What an effect callback resolves to: the names it changed.
pub type EffectResult = std::result::Result<ChangedNames, BoxError>;

type EffectFn = dyn Fn(EffectTrigger) -> BoxFuture<'static, EffectResult> + Send + Sync;

/// Passed to an effect callback when it runs.
#[derive(Debug, Clone)]
pub struct EffectTrigger {
    /// The key the effect is bound to.
    pub key: String,
    /// Snapshot of the changed-name frontier at the time the effect runs.
    /// `None` during a full pass. Later growth of the frontier is not visible
    /// through it.
    pub changed_names: Option<Arc<ChangedNames>>,
}

impl EffectTrigger {
    pub fn is_full_pass(&self) -> bool {
        self.changed_names.is_none()
    }
}

/// A computation bound to a graph key.
#[derive(Clone)]
pub struct Effect {
    callback: Arc<EffectFn>,
    label: Option<String>,
}

impl Effect {
    /// Create an effect from an async callback.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(EffectTrigger) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EffectResult> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |trigger| callback(trigger).boxed()),
            label: None,
        }
    }

    /// Create an effect from a callback that completes immediately.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(EffectTrigger) -> EffectResult + Send + Sync + 'static,
    {
        Self::new(move |trigger| std::future::ready(callback(trigger)))
    }

    /// Attach a human-readable label, used in logs.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn run(&self, trigger: EffectTrigger) -> BoxFuture<'static, EffectResult> {
        (self.callback)(trigger)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Marks a pass as running for as long as it is alive.
///
/// Dropping the guard clears the flag even when the pass future is dropped
/// midway or a callback fails.
struct PassGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn enter(running: &'a AtomicBool) -> Result<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::PassInProgress)?;
        Ok(Self { running })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// One step of a pass, copied out of the graph before any callback runs.
struct Step {
    key: String,
    dependencies: IndexSet<String>,
    effect: Option<Effect>,
}

/// Owns the effect graph and drives passes over it.
#[derive(Debug, Default)]
pub struct EffectManager {
    graph: Mutex<ValuedDependencyGraph<String, Effect>>,
    running: AtomicBool,
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `effect` to `key` with its declared dependencies. Nothing runs.
    pub fn register_node<I, S>(&self, key: impl Into<String>, effect: Effect, depends_on: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let depends_on: Vec<String> = depends_on.into_iter().map(Into::into).collect();
        debug!(key = %key, dependencies = ?depends_on, "registering effect");
        self.graph.lock().register_node(key, effect, depends_on);
    }

    /// Record a plain edge, without binding an effect to either end.
    pub fn add_dependency(&self, dependent: impl Into<String>, dependency: impl Into<String>) {
        self.graph
            .lock()
            .add_dependency(dependent.into(), dependency.into());
    }

    /// Rebuild the order if anything was registered since the last build.
    pub fn build(&self) -> Result<()> {
        let mut graph = self.graph.lock();
        if graph.is_stale() {
            graph.build_dependencies_map()?;
        }
        Ok(())
    }

    /// The evaluation order, dependencies first.
    pub fn order(&self) -> Result<Vec<String>> {
        self.build()?;
        Ok(self
            .graph
            .lock()
            .dependencies_map()
            .map(|map| map.order().to_vec())
            .unwrap_or_default())
    }

    /// Declared dependencies of `key` as of the last successful build.
    pub fn dependencies_of(&self, key: &str) -> Option<IndexSet<String>> {
        self.graph
            .lock()
            .dependencies_map()
            .and_then(|map| map.dependencies_of(&key.to_string()).cloned())
    }

    pub fn has_effect(&self, key: &str) -> bool {
        self.graph.lock().value(&key.to_string()).is_some()
    }

    pub fn effect_count(&self) -> usize {
        self.graph.lock().node_count()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run a full pass (`None`) or an incremental pass seeded with
    /// `changed_names`.
    ///
    /// Returns the final frontier for an incremental pass, `None` for a full
    /// pass.
    pub async fn trigger_effects(
        &self,
        changed_names: Option<ChangedNames>,
    ) -> Result<Option<ChangedNames>> {
        let _guard = PassGuard::enter(&self.running)?;
        let steps = self.plan()?;

        match &changed_names {
            Some(names) => debug!(seed = ?names, steps = steps.len(), "starting incremental pass"),
            None => debug!(steps = steps.len(), "starting full pass"),
        }

        // Shared with each trigger; copied only if a callback still holds its
        // snapshot when the frontier grows.
        let mut changed = changed_names.map(Arc::new);
        for step in steps {
            if let Some(names) = &changed {
                if !step.dependencies.iter().any(|dep| names.contains(dep)) {
                    trace!(key = %step.key, "skipping: no dependency changed");
                    continue;
                }
            }

            match step.effect {
                Some(effect) => {
                    debug!(key = %step.key, label = ?effect.label(), "running effect");
                    let trigger = EffectTrigger {
                        key: step.key.clone(),
                        changed_names: changed.clone(),
                    };
                    let produced = effect.run(trigger).await.map_err(|source| Error::Effect {
                        key: step.key.clone(),
                        source,
                    })?;
                    if let Some(names) = changed.as_mut() {
                        if produced.iter().any(|name| !names.contains(name)) {
                            Arc::make_mut(names).extend(produced);
                        }
                    }
                }
                None => {
                    if let Some(names) = changed.as_mut() {
                        trace!(key = %step.key, "relaying");
                        if !names.contains(&step.key) {
                            Arc::make_mut(names).insert(step.key);
                        }
                    }
                }
            }
        }

        Ok(changed.map(|names| {
            Arc::try_unwrap(names).unwrap_or_else(|shared| (*shared).clone())
        }))
    }

    fn plan(&self) -> Result<Vec<Step>> {
        let mut graph = self.graph.lock();
        if graph.is_stale() {
            graph.build_dependencies_map()?;
        }
        let Some(map) = graph.dependencies_map() else {
            return Ok(Vec::new());
        };

        Ok(map
            .order()
            .iter()
            .map(|key| Step {
                key: key.clone(),
                dependencies: map.dependencies_of(key).cloned().unwrap_or_default(),
                effect: graph.value(key).cloned(),
            })
            .collect())
    }
}

impl Clone for EffectManager {
    /// An independent manager with the same edges and bound effects. The copy
    /// is never marked as running.
    fn clone(&self) -> Self {
        Self {
            graph: Mutex::new(self.graph.lock().clone()),
            running: AtomicBool::new(false),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> ChangedNames {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, produces: &'static [&'static str]) -> Effect {
        let log = log.clone();
        Effect::sync(move |trigger| {
            log.lock().push(trigger.key);
            Ok(names(produces))
        })
    }

    #[tokio::test]
    async fn full_pass_runs_every_effect_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("total", recording(&log, &[]), ["subtotal", "tax"]);
        manager.register_node("subtotal", recording(&log, &[]), ["price"]);
        manager.register_node("seed", recording(&log, &[]), Vec::<String>::new());

        let result = manager.trigger_effects(None).await.unwrap();

        assert!(result.is_none());
        let log = log.lock();
        assert_eq!(log.len(), 3);
        let pos = |key: &str| log.iter().position(|k| k == key).unwrap();
        assert!(pos("subtotal") < pos("total"));
    }

    #[tokio::test]
    async fn incremental_pass_follows_declared_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("sum", recording(&log, &[]), ["a", "b"]);

        manager.trigger_effects(Some(names(&["a"]))).await.unwrap();
        assert_eq!(*log.lock(), vec!["sum".to_string()]);

        manager.trigger_effects(Some(names(&["c"]))).await.unwrap();
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn incremental_pass_never_runs_dependency_free_effects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("seed", recording(&log, &[]), Vec::<String>::new());

        manager.trigger_effects(Some(names(&["seed"]))).await.unwrap();
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn produced_names_extend_the_frontier() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("b", recording(&log, &["b"]), ["a"]);
        manager.register_node("c", recording(&log, &["c"]), ["b"]);
        manager.register_node("unrelated", recording(&log, &[]), ["z"]);

        let frontier = manager
            .trigger_effects(Some(names(&["a"])))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(*log.lock(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(frontier, names(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn trigger_snapshot_is_not_affected_by_later_growth() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        let sink = seen.clone();
        manager.register_node(
            "b",
            Effect::sync(move |trigger| {
                sink.lock().extend(trigger.changed_names);
                Ok(names(&["b"]))
            }),
            ["a"],
        );
        manager.register_node("c", Effect::sync(|_| Ok(names(&["c"]))), ["b"]);

        let frontier = manager
            .trigger_effects(Some(names(&["a"])))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(frontier, names(&["a", "b", "c"]));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(*seen[0], names(&["a"]));
    }

    #[tokio::test]
    async fn effect_reporting_nothing_stops_propagation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("b", recording(&log, &[]), ["a"]);
        manager.register_node("c", recording(&log, &[]), ["b"]);

        manager.trigger_effects(Some(names(&["a"]))).await.unwrap();
        assert_eq!(*log.lock(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn relay_keys_propagate_their_own_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.add_dependency("email", "email:disabled");
        manager.register_node("summary", recording(&log, &[]), ["email"]);

        let frontier = manager
            .trigger_effects(Some(names(&["email:disabled"])))
            .await
            .unwrap()
            .unwrap();

        assert!(frontier.contains("email"));
        assert_eq!(*log.lock(), vec!["summary".to_string()]);
    }

    #[tokio::test]
    async fn failing_effect_aborts_the_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("first", recording(&log, &[]), ["a"]);
        manager.register_node("broken", Effect::sync(|_| Err("bad input".into())), ["first"]);
        manager.register_node("after", recording(&log, &[]), ["broken"]);

        let err = manager.trigger_effects(None).await.unwrap_err();

        assert!(matches!(err, Error::Effect { ref key, .. } if key == "broken"));
        assert_eq!(*log.lock(), vec!["first".to_string()]);
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn cycle_is_reported_before_anything_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = EffectManager::new();
        manager.register_node("x", recording(&log, &[]), ["y"]);
        manager.register_node("y", recording(&log, &[]), ["x"]);

        let err = manager.trigger_effects(None).await.unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn nested_pass_is_rejected() {
        let manager = Arc::new(EffectManager::new());
        let inner = Arc::downgrade(&manager);
        manager.register_node(
            "reentrant",
            Effect::new(move |_| {
                let inner = inner.clone();
                async move {
                    let Some(manager) = inner.upgrade() else {
                        return Ok(ChangedNames::new());
                    };
                    match manager.trigger_effects(None).await {
                        Err(Error::PassInProgress) => Ok(ChangedNames::new()),
                        other => Err(format!("expected PassInProgress, got {other:?}").into()),
                    }
                }
            }),
            ["a"],
        );

        manager.trigger_effects(None).await.unwrap();
    }

    #[tokio::test]
    async fn clone_is_independent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let base = EffectManager::new();
        base.register_node("b", recording(&log, &[]), ["a"]);

        let derived = base.clone();
        derived.register_node("c", recording(&log, &[]), ["b"]);

        assert_eq!(base.order().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(derived.effect_count(), 2);
        assert_eq!(base.effect_count(), 1);
    }

    #[tokio::test]
    async fn dependencies_reflect_last_build() {
        let manager = EffectManager::new();
        manager.register_node("sum", Effect::sync(|_| Ok(ChangedNames::new())), ["a", "b"]);
        assert!(manager.dependencies_of("sum").is_none());

        manager.build().unwrap();
        assert_eq!(manager.dependencies_of("sum"), Some(names(&["a", "b"])));
        assert!(manager.has_effect("sum"));
        assert!(!manager.has_effect("a"));
    }
}
