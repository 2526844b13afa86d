//! Deferred lifecycle actions, coalesced per service.
//!
//! Independent subsystems may each ask for a different lifecycle step on
//! the same service within one run. Requests are recorded here, one entry
//! per service name, and merged so that only the strongest requested
//! action survives: a restart also covers a reload, a reload also covers
//! a start. The queue is replayed once at end-of-run, highest priority
//! first, by [`drain`](DelayedActions::drain).

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Lifecycle steps eligible for deferral, ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DelayedKind {
    Start,
    Reload,
    Restart,
}

impl DelayedKind {
    pub fn verb(&self) -> &'static str {
        match self {
            DelayedKind::Start => "start",
            DelayedKind::Reload => "reload",
            DelayedKind::Restart => "restart",
        }
    }
}

/// A custom unit of work replacing the plain lifecycle call, used when the
/// deferred operation is more than `<kind>(service)` alone.
pub type DelayedWork = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// What to run for a service at drain time.
pub enum DelayedAction {
    /// Dispatch `<kind>(service)` through the coordinator.
    Lifecycle(DelayedKind),
    /// Run `work` directly; `kind` still participates in merging.
    Custom { kind: DelayedKind, work: DelayedWork },
}

impl DelayedAction {
    fn kind(&self) -> DelayedKind {
        match self {
            DelayedAction::Lifecycle(kind) => *kind,
            DelayedAction::Custom { kind, .. } => *kind,
        }
    }
}

struct Entry {
    kind: DelayedKind,
    work: Option<DelayedWork>,
    priority: u32,
    seq: u64,
}

/// One pending action per service name, merged by strength.
#[derive(Default)]
pub struct DelayedActions {
    entries: HashMap<String, Entry>,
    next_seq: u64,
    drained: bool,
}

impl DelayedActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deferred action for `service`.
    ///
    /// Merge rule against an existing entry: an identical plain lifecycle
    /// request is a no-op; otherwise the incoming action wins exactly when
    /// it is at least as strong as the stored one. A weaker request never
    /// downgrades what is already scheduled.
    pub fn register(&mut self, service: &str, action: DelayedAction, priority: u32) -> Result<()> {
        if service.is_empty() {
            return Err(Error::Configuration(
                "delayed action requires a service name".into(),
            ));
        }

        if self.drained {
            tracing::debug!(
                "ignoring {} for {}: delayed actions already drained",
                action.kind().verb(),
                service
            );
            return Ok(());
        }

        let kind = action.kind();

        if let Some(existing) = self.entries.get(service) {
            let plain = matches!(action, DelayedAction::Lifecycle(_));
            if existing.kind == kind && plain && existing.work.is_none() {
                return Ok(());
            }
            if kind < existing.kind {
                tracing::debug!(
                    "keeping {} for {}: stronger than requested {}",
                    existing.kind.verb(),
                    service,
                    kind.verb()
                );
                return Ok(());
            }
        }

        let work = match action {
            DelayedAction::Lifecycle(_) => None,
            DelayedAction::Custom { work, .. } => Some(work),
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            service.to_string(),
            Entry {
                kind,
                work,
                priority,
                seq,
            },
        );

        Ok(())
    }

    /// Replay all pending actions, highest priority first, registration
    /// order within a priority. Runs at most once; later calls succeed
    /// trivially. The first failure stops the drain, leaving the remaining
    /// entries unexecuted.
    pub fn drain<F>(&mut self, mut apply: F) -> Result<()>
    where
        F: FnMut(&str, DelayedKind) -> anyhow::Result<()>,
    {
        if self.drained {
            return Ok(());
        }
        self.drained = true;

        let mut pending: Vec<(String, Entry)> = self.entries.drain().collect();
        pending.sort_by(|(_, a), (_, b)| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));

        let mut applied = Vec::new();
        for (service, entry) in pending {
            tracing::debug!(
                "draining {} for {} (priority {})",
                entry.kind.verb(),
                service,
                entry.priority
            );

            let outcome = match entry.work {
                Some(work) => work(),
                None => apply(&service, entry.kind),
            };

            if let Err(err) = outcome {
                return Err(Error::Drain {
                    service,
                    action: entry.kind.verb(),
                    applied,
                    cause: format!("{:#}", err),
                });
            }

            applied.push(service);
        }

        Ok(())
    }

    /// The action currently scheduled for a service.
    pub fn pending(&self, service: &str) -> Option<(DelayedKind, u32)> {
        self.entries
            .get(service)
            .map(|entry| (entry.kind, entry.priority))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move the queue out for execution, leaving this registry drained.
    pub(crate) fn take(&mut self) -> DelayedActions {
        let taken = DelayedActions {
            entries: std::mem::take(&mut self.entries),
            next_seq: self.next_seq,
            drained: self.drained,
        };
        self.drained = true;
        taken
    }
}
