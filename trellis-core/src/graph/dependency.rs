//! Keyed Dependency Graph
//!
//! Edges are accumulated raw and only turned into adjacency maps and a
//! topological order when [`DependencyGraph::build_dependencies_map`] is
//! called. Adding edges afterwards leaves the previous build in place until
//! the next rebuild.
//!
//! # Algorithm
//!
//! Kahn's algorithm, seeded in first-seen order:
//!
//! 1. Every key starts with a pending count equal to the number of distinct
//!    keys it depends on.
//! 2. Keys with a zero count are queued in the order they were first
//!    observed while building the maps (not sorted by key).
//! 3. Dequeue a key, append it to the order and decrement each dependent,
//!    queueing the ones that reach zero.
//! 4. If keys remain unplaced, they sit on or behind a cycle and the build
//!    fails with [`CyclicDependency`].

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// No evaluation order exists for the recorded edges.
///
/// `unresolved` lists, in first-seen order, every key that could not be
/// placed: the keys forming the cycle plus anything depending on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cyclic dependency: no evaluation order exists for {unresolved:?}")]
pub struct CyclicDependency<K: Debug> {
    pub unresolved: Vec<K>,
}

#[derive(Debug, Clone)]
enum Entry<K> {
    Node(K),
    Edge { dependent: K, dependency: K },
}

/// Adjacency maps and evaluation order computed from a set of edges.
#[derive(Debug, Clone)]
pub struct DependencyMap<K> {
    keys: IndexSet<K>,
    dependencies: IndexMap<K, IndexSet<K>>,
    dependents: IndexMap<K, IndexSet<K>>,
    order: Vec<K>,
}

impl<K> DependencyMap<K>
where
    K: Clone + Eq + Hash + Debug,
{
    fn build(entries: &[Entry<K>]) -> Result<Self, CyclicDependency<K>> {
        let mut keys: IndexSet<K> = IndexSet::new();
        let mut dependencies: IndexMap<K, IndexSet<K>> = IndexMap::new();
        let mut dependents: IndexMap<K, IndexSet<K>> = IndexMap::new();

        let mut observe = |key: &K,
                           dependencies: &mut IndexMap<K, IndexSet<K>>,
                           dependents: &mut IndexMap<K, IndexSet<K>>| {
            if keys.insert(key.clone()) {
                dependencies.insert(key.clone(), IndexSet::new());
                dependents.insert(key.clone(), IndexSet::new());
            }
        };

        for entry in entries {
            match entry {
                Entry::Node(key) => observe(key, &mut dependencies, &mut dependents),
                Entry::Edge {
                    dependent,
                    dependency,
                } => {
                    observe(dependent, &mut dependencies, &mut dependents);
                    observe(dependency, &mut dependencies, &mut dependents);
                    if let Some(deps) = dependencies.get_mut(dependent) {
                        deps.insert(dependency.clone());
                    }
                    if let Some(users) = dependents.get_mut(dependency) {
                        users.insert(dependent.clone());
                    }
                }
            }
        }

        let order = {
            let mut pending: IndexMap<&K, usize> = dependencies
                .iter()
                .map(|(key, deps)| (key, deps.len()))
                .collect();
            let mut queue: VecDeque<&K> = pending
                .iter()
                .filter(|(_, count)| **count == 0)
                .map(|(key, _)| *key)
                .collect();
            let mut order = Vec::with_capacity(keys.len());

            while let Some(key) = queue.pop_front() {
                order.push(key.clone());

                if let Some(users) = dependents.get(key) {
                    for user in users {
                        if let Some(count) = pending.get_mut(user) {
                            *count -= 1;
                            if *count == 0 {
                                queue.push_back(user);
                            }
                        }
                    }
                }
            }

            order
        };

        if order.len() < keys.len() {
            let placed: IndexSet<&K> = order.iter().collect();
            let unresolved = keys
                .iter()
                .filter(|key| !placed.contains(key))
                .cloned()
                .collect();
            return Err(CyclicDependency { unresolved });
        }

        Ok(Self {
            keys,
            dependencies,
            dependents,
            order,
        })
    }

    /// Distinct keys, in first-seen order.
    pub fn keys(&self) -> &IndexSet<K> {
        &self.keys
    }

    /// Keys ordered so that every dependency precedes its dependents.
    pub fn order(&self) -> &[K] {
        &self.order
    }

    /// Keys that `key` depends on. `None` if the key is not in the graph.
    pub fn dependencies_of(&self, key: &K) -> Option<&IndexSet<K>> {
        self.dependencies.get(key)
    }

    /// Keys that depend on `key`. `None` if the key is not in the graph.
    pub fn dependents_of(&self, key: &K) -> Option<&IndexSet<K>> {
        self.dependents.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }
}

/// A directed graph of "dependent depends on dependency" edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    entries: Vec<Entry<K>>,
    map: Option<DependencyMap<K>>,
    stale: bool,
}

impl<K> DependencyGraph<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            map: None,
            stale: true,
        }
    }

    /// Record that `dependent` cannot be evaluated before `dependency`.
    pub fn add_dependency(&mut self, dependent: K, dependency: K) {
        self.entries.push(Entry::Edge {
            dependent,
            dependency,
        });
        self.stale = true;
    }

    /// Record a key that takes part in the order even without edges.
    pub fn add_node(&mut self, key: K) {
        self.entries.push(Entry::Node(key));
        self.stale = true;
    }

    /// Recompute adjacency maps and the topological order from every
    /// recorded edge.
    ///
    /// On failure the previous build, if any, is kept.
    pub fn build_dependencies_map(&mut self) -> Result<&DependencyMap<K>, CyclicDependency<K>> {
        let map = DependencyMap::build(&self.entries)?;
        self.stale = false;
        Ok(self.map.insert(map))
    }

    /// The last successful build.
    pub fn dependencies_map(&self) -> Option<&DependencyMap<K>> {
        self.map.as_ref()
    }

    /// True when edges were recorded after the last successful build.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn edge_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Entry::Edge { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K> Default for DependencyGraph<K>
where
    K: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
