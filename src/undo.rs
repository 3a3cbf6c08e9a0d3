use serde_json::{Map, Value};
use uuid::Uuid;

/// The saved properties of one instance, keyed by its element uuid.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceCopy {
    pub uuid: Uuid,
    pub data: Map<String, Value>,
}

/// One committed edit.
///
/// Instances only present in `after` were created by the edit.
#[derive(Clone, Debug, PartialEq)]
pub struct UndoEntry {
    pub label: String,
    pub before: Vec<InstanceCopy>,
    pub after: Vec<InstanceCopy>,
}

impl UndoEntry {
    /// Instances the edit created.
    pub fn created(&self) -> impl Iterator<Item = &InstanceCopy> {
        self.after
            .iter()
            .filter(|a| !self.before.iter().any(|b| b.uuid == a.uuid))
    }
}

/// The undo history. Edits are bracketed by `begin_edit` and `commit_edit`.
#[derive(Default)]
pub struct UndoLog {
    open: Option<Vec<InstanceCopy>>,
    history: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an edit with the state of the instances it's about to change.
    ///
    /// An edit that is still open gets discarded.
    pub fn begin_edit(&mut self, before: Vec<InstanceCopy>) {
        if self.open.is_some() {
            log::warn!("discarding unfinished edit");
        }
        self.open = Some(before);
    }

    /// Finish the open edit. Does nothing if no edit was started.
    pub fn commit_edit(&mut self, label: impl Into<String>, after: Vec<InstanceCopy>) {
        let Some(before) = self.open.take() else {
            log::warn!("commit without a matching begin");
            return;
        };
        let label = label.into();
        log::debug!("committed edit '{label}'");
        self.history.push(UndoEntry {
            label,
            before,
            after,
        });
    }

    pub fn cancel_edit(&mut self) {
        self.open = None;
    }

    pub fn is_editing(&self) -> bool {
        self.open.is_some()
    }

    /// Take the most recent edit off the history.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.history.pop()
    }

    pub fn last(&self) -> Option<&UndoEntry> {
        self.history.last()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
