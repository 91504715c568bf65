//! Form Aggregate
//!
//! A form owns the shared change set, effect manager and field collection,
//! and wires new fields to them. It is the one place that sequences field
//! writes with effect passes.

use std::sync::Arc;

use tracing::debug;

use crate::config::FormConfig;
use crate::error::Result;
use crate::reactive::{Effect, EffectManager};
use crate::state::{
    ChangeSet, ChangedNames, Context, Field, FieldBuilder, FieldId, FieldsCollection,
};

#[derive(Debug)]
pub struct Form {
    config: FormConfig,
    changes: Arc<ChangeSet>,
    effects: Arc<EffectManager>,
    fields: FieldsCollection,
}

impl Form {
    pub fn new(config: FormConfig) -> Self {
        Self {
            changes: Arc::new(ChangeSet::new(config.change_set.clone())),
            effects: Arc::new(EffectManager::new()),
            fields: FieldsCollection::new(),
            config,
        }
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn changes(&self) -> &Arc<ChangeSet> {
        &self.changes
    }

    pub fn effects(&self) -> &Arc<EffectManager> {
        &self.effects
    }

    pub fn fields(&self) -> &FieldsCollection {
        &self.fields
    }

    /// Build a field against this form's change set and effect manager and
    /// add it to the collection.
    pub fn add_field(&self, builder: FieldBuilder) -> Arc<Field> {
        let field = builder
            .default_state_key(self.config.default_state_key.clone())
            .build(Arc::clone(&self.changes), Arc::clone(&self.effects));
        self.fields.add(Arc::clone(&field));
        field
    }

    /// The first field named `name`.
    pub fn field(&self, name: &str) -> Option<Arc<Field>> {
        self.fields.first(name)
    }

    pub fn remove_field(&self, id: FieldId) -> Option<Arc<Field>> {
        self.fields.remove(id)
    }

    pub fn register_effect<I, S>(&self, key: impl Into<String>, effect: Effect, depends_on: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.effects.register_node(key, effect, depends_on);
    }

    /// Run every effect once.
    pub async fn initialize(&self) -> Result<()> {
        self.effects.trigger_effects(None).await?;
        Ok(())
    }

    /// Run the effects reachable from `changed` and return the final
    /// frontier.
    pub async fn propagate(&self, changed: ChangedNames) -> Result<ChangedNames> {
        if changed.is_empty() {
            return Ok(changed);
        }
        Ok(self
            .effects
            .trigger_effects(Some(changed))
            .await?
            .unwrap_or_default())
    }

    /// Switch every field to `state_key`, then propagate the union of what
    /// the switches reported.
    pub async fn switch_state(&self, state_key: &str, ctx: &Context) -> Result<ChangedNames> {
        let ctx = ctx.merge(&Context::new().process_changes(true));
        let mut changed = ChangedNames::new();
        for field in self.fields.all() {
            changed.extend(field.switch_state(state_key, &ctx));
        }
        debug!(state = state_key, changed = changed.len(), "form switched state");
        self.propagate(changed).await
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new(FormConfig::default())
    }
}
