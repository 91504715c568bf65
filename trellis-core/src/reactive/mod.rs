//! Reactive Effects
//!
//! This module implements the run-time half of the engine: effects bound to
//! graph keys, the manager that runs them in dependency order, and the
//! subscriber lists used for change notifications.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is an async computation registered under a key together with
//! the keys it depends on. When it runs it may write to fields and reports
//! the names it changed.
//!
//! ## Passes
//!
//! A full pass runs every effect once. An incremental pass starts from a
//! set of changed names and only runs effects that depend on something in
//! the set, growing the set as it goes. Keys without an effect relay: they
//! add their own name when one of their dependencies changed.
//!
//! # Implementation Notes
//!
//! Dependencies are declared, not tracked automatically. Passes are
//! sequential: each callback is awaited before the next key is evaluated.

mod effect;
mod subscriber;

pub use effect::{Effect, EffectManager, EffectResult, EffectTrigger};
pub use subscriber::{ListenerId, Listeners, Propagation};
