//! Change Set
//!
//! An append-only, size-bounded ledger of change records shared by every
//! field of a form.
//!
//! # Bookkeeping
//!
//! - For each (field, track) at most one record is flagged `last`; adding a
//!   record clears the flag on the previous holder.
//! - `processed` only ever goes from false to true.
//! - When the ledger is over `max_size`, the oldest processed records are
//!   evicted. Unprocessed records are never evicted, so the ledger can grow
//!   past the cap while nobody consumes changes.
//!
//! The ledger lock is never held while a field's listeners run.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{trace, warn};

use super::change::{
    ChangeBatch, ChangeFilter, ChangeRecord, ChangedNames, PendingChange, StateScope, TrackKind,
};
use super::field::Field;
use crate::config::ChangeSetConfig;

#[derive(Debug, Default)]
struct Ledger {
    records: VecDeque<ChangeRecord>,
    next_id: u64,
}

impl Ledger {
    fn evict(&mut self, max_size: usize) {
        while self.records.len() > max_size {
            match self.records.iter().position(|record| record.processed) {
                Some(index) => {
                    if let Some(record) = self.records.remove(index) {
                        trace!(id = record.id, field = %record.field_name, "evicted change record");
                    }
                }
                None => {
                    warn!(
                        len = self.records.len(),
                        max_size, "change set over capacity with no processed records to evict"
                    );
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ChangeSet {
    config: ChangeSetConfig,
    ledger: Mutex<Ledger>,
}

impl ChangeSet {
    pub fn new(config: ChangeSetConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Append a change as the new `last` record of its (field, track).
    ///
    /// Returns the id of the stored record.
    pub fn add(&self, change: PendingChange) -> u64 {
        let mut ledger = self.ledger.lock();

        if let Some(previous) = ledger.records.iter_mut().rev().find(|record| {
            record.last && record.field_id == change.field_id && record.track == change.track
        }) {
            previous.last = false;
        }

        let id = ledger.next_id;
        ledger.next_id += 1;
        let record = ChangeRecord::from_pending(id, change);
        trace!(
            id,
            field = %record.field_name,
            state = %record.state_key,
            track = ?record.track,
            "recorded change"
        );
        ledger.records.push_back(record);
        ledger.evict(self.config.max_size);
        id
    }

    /// Remove the record with `id`. Absent ids are a no-op.
    pub fn remove(&self, id: u64) -> Option<ChangeRecord> {
        let mut ledger = self.ledger.lock();
        let index = ledger.records.iter().position(|record| record.id == id)?;
        ledger.records.remove(index)
    }

    /// Records of `field` matching `filter`, oldest first.
    pub fn get_field_changes(&self, field: &Field, filter: &ChangeFilter) -> Vec<ChangeRecord> {
        let current = field.current_state_key();
        self.ledger
            .lock()
            .records
            .iter()
            .filter(|record| filter.matches(record, field.id(), &current))
            .cloned()
            .collect()
    }

    /// The most recent record of `field` matching `filter`.
    pub fn get_field_change(&self, field: &Field, filter: &ChangeFilter) -> Option<ChangeRecord> {
        let current = field.current_state_key();
        self.ledger
            .lock()
            .records
            .iter()
            .rev()
            .find(|record| filter.matches(record, field.id(), &current))
            .cloned()
    }

    pub fn has_changes(&self, field: &Field, filter: &ChangeFilter) -> bool {
        let current = field.current_state_key();
        self.ledger
            .lock()
            .records
            .iter()
            .any(|record| filter.matches(record, field.id(), &current))
    }

    /// Collect the pending `last` records of `field` in its current state,
    /// optionally limited to one track kind, and project them to changed
    /// names.
    ///
    /// Unless `dry_run` is set, every pending record of that field, state and
    /// kind is marked processed and the selected `last` records are
    /// dispatched to the field's listeners as one batch. A dry run has no
    /// side effects.
    pub fn process_changes(
        &self,
        field: &Field,
        track: Option<TrackKind>,
        dry_run: bool,
    ) -> ChangedNames {
        let filter = ChangeFilter {
            track,
            processed: Some(false),
            state: StateScope::Current,
            ..ChangeFilter::default()
        };
        let current = field.current_state_key();

        let selected: Vec<ChangeRecord> = {
            let mut ledger = self.ledger.lock();
            let mut selected = Vec::new();
            for record in ledger
                .records
                .iter_mut()
                .filter(|record| filter.matches(record, field.id(), &current))
            {
                if !dry_run {
                    record.processed = true;
                }
                if record.last {
                    selected.push(record.clone());
                }
            }
            if !dry_run {
                ledger.evict(self.config.max_size);
            }
            selected
        };

        let names = selected.iter().map(ChangeRecord::changed_name).collect();

        if !dry_run && !selected.is_empty() {
            field.dispatch(&ChangeBatch::new(field.id(), field.name(), selected));
        }

        names
    }

    /// Mark every pending record of `field` in `state_key` processed without
    /// dispatching anything. Returns how many records were settled.
    pub fn settle(&self, field: &Field, state_key: &str) -> usize {
        let filter = ChangeFilter::new().processed(false).state(state_key);
        let mut ledger = self.ledger.lock();
        let mut settled = 0;
        for record in ledger
            .records
            .iter_mut()
            .filter(|record| filter.matches(record, field.id(), state_key))
        {
            record.processed = true;
            settled += 1;
        }
        ledger.evict(self.config.max_size);
        settled
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().records.is_empty()
    }

    /// Snapshot of every stored record, oldest first.
    pub fn records(&self) -> Vec<ChangeRecord> {
        self.ledger.lock().records.iter().cloned().collect()
    }
}
