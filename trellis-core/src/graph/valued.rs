//! Valued Dependency Graph
//!
//! A [`DependencyGraph`] whose keys can carry a bound value. Keys that only
//! appear as edge endpoints have no value; consumers decide what that means
//! (the effect manager treats them as relays).

use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;

use super::dependency::{CyclicDependency, DependencyGraph, DependencyMap};

#[derive(Debug, Clone)]
pub struct ValuedDependencyGraph<K, V> {
    graph: DependencyGraph<K>,
    values: IndexMap<K, V>,
}

impl<K, V> ValuedDependencyGraph<K, V>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            values: IndexMap::new(),
        }
    }

    /// Bind `value` to `key` and record its dependencies.
    ///
    /// Registering the same key again replaces the value; previously recorded
    /// edges are kept.
    pub fn register_node<I>(&mut self, key: K, value: V, depends_on: I)
    where
        I: IntoIterator<Item = K>,
    {
        self.graph.add_node(key.clone());
        for dependency in depends_on {
            self.graph.add_dependency(key.clone(), dependency);
        }
        self.values.insert(key, value);
    }

    pub fn add_dependency(&mut self, dependent: K, dependency: K) {
        self.graph.add_dependency(dependent, dependency);
    }

    pub fn build_dependencies_map(&mut self) -> Result<&DependencyMap<K>, CyclicDependency<K>> {
        self.graph.build_dependencies_map()
    }

    pub fn dependencies_map(&self) -> Option<&DependencyMap<K>> {
        self.graph.dependencies_map()
    }

    pub fn is_stale(&self) -> bool {
        self.graph.is_stale()
    }

    /// The value bound to `key`, if any.
    pub fn value(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    /// Number of keys with a bound value.
    pub fn node_count(&self) -> usize {
        self.values.len()
    }

    pub fn graph(&self) -> &DependencyGraph<K> {
        &self.graph
    }
}

impl<K, V> Default for ValuedDependencyGraph<K, V>
where
    K: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
