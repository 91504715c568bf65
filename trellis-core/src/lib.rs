//! Trellis Core
//!
//! This crate manages the reactive state of a set of named, interdependent
//! input fields (forms, wizards, dynamic UIs). It implements:
//!
//! - A keyed dependency graph with topological ordering and cycle detection
//! - An effect manager that re-runs only the computations affected by a change
//! - A change ledger that records, deduplicates and marks processed every
//!   value/metadata mutation
//! - Fields with multiple isolated value/metadata states that report state
//!   switches as ordinary changes
//!
//! # Architecture
//!
//! - `graph`: keyed dependency graph and its valued variant
//! - `reactive`: effects, the effect manager and subscriber lists
//! - `state`: fields, change records, the change set and collections
//! - `form`: the aggregate owning one change set, effect manager and
//!   collection
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use trellis_core::{Context, Effect, Field, FieldType, Form};
//!
//! let form = Form::default();
//! let price = form.add_field(Field::builder("price", FieldType::Number));
//! let total = form.add_field(Field::builder("total", FieldType::Number));
//!
//! let (p, t) = (price.clone(), total.clone());
//! form.register_effect(
//!     "total",
//!     Effect::sync(move |_| {
//!         let price = p.get_value(&Context::new()).as_f64().unwrap_or(0.0);
//!         Ok(t.set_value(json!(price * 1.2), &Context::new()))
//!     }),
//!     ["price"],
//! );
//!
//! form.initialize().await?;
//! let changed = price.set_value(json!(10), &Context::new());
//! form.propagate(changed).await?;
//! ```

pub mod config;
pub mod error;
pub mod form;
pub mod graph;
pub mod reactive;
pub mod state;

pub use config::{ChangeSetConfig, FormConfig, DEFAULT_STATE_KEY};
pub use error::{BoxError, Error, Result};
pub use form::Form;
pub use graph::{CyclicDependency, DependencyGraph, DependencyMap, ValuedDependencyGraph};
pub use reactive::{
    Effect, EffectManager, EffectResult, EffectTrigger, ListenerId, Listeners, Propagation,
};
pub use state::{
    ChangeBatch, ChangeFilter, ChangeRecord, ChangeSet, ChangedNames, Context, Field, FieldBuilder,
    FieldId, FieldType, FieldsCollection, StateScope, Track, TrackKind,
};
