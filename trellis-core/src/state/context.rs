//! Per-call options for field operations.
//!
//! Every field operation takes a `&Context`. Unset options fall back to the
//! field's defaults: the current state, no initiator, changes processed, and
//! disabled fields read normally. Contexts nest by merging, with the child's
//! set options overriding the parent's.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// State to read or write. Defaults to the field's current state.
    pub state_key: Option<String>,
    /// Recorded on every change made through this context.
    pub initiator: Option<String>,
    /// `false` records changes without processing or dispatching them.
    pub process_changes: Option<bool>,
    /// Read the value of a disabled field as `null`.
    pub disabled_is_null: Option<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    pub fn initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }

    pub fn process_changes(mut self, process: bool) -> Self {
        self.process_changes = Some(process);
        self
    }

    /// Shorthand for `process_changes(false)`.
    pub fn dry_run(self) -> Self {
        self.process_changes(false)
    }

    pub fn disabled_is_null(mut self, enabled: bool) -> Self {
        self.disabled_is_null = Some(enabled);
        self
    }

    /// `self` with every option `child` sets taking precedence.
    pub fn merge(&self, child: &Context) -> Context {
        Context {
            state_key: child.state_key.clone().or_else(|| self.state_key.clone()),
            initiator: child.initiator.clone().or_else(|| self.initiator.clone()),
            process_changes: child.process_changes.or(self.process_changes),
            disabled_is_null: child.disabled_is_null.or(self.disabled_is_null),
        }
    }

    pub fn processes_changes(&self) -> bool {
        self.process_changes.unwrap_or(true)
    }

    pub fn nulls_disabled(&self) -> bool {
        self.disabled_is_null.unwrap_or(false)
    }
}
