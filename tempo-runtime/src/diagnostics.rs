use std::collections::VecDeque;

use crate::error::RoutineError;
use crate::handle::{CoroutineHandle, OwnerId};
use crate::lifecycle::PurgeSummary;

/// Non-fatal events worth surfacing to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A `WaitFor` would have closed a cycle and was treated as satisfied.
    CyclicWait {
        coroutine: CoroutineHandle,
        waiting_on: CoroutineHandle,
    },
    /// A coroutine body returned an error and was cancelled.
    RoutineFailed {
        owner: OwnerId,
        coroutine: CoroutineHandle,
        error: RoutineError,
    },
    /// A request issued from inside a tick could not be applied.
    CommandRejected { owner: OwnerId, reason: String },
    /// An owner was destroyed and its work dropped.
    OwnerPurged { owner: OwnerId, summary: PurgeSummary },
}

/// Bounded buffer; the oldest entry goes first when full.
#[derive(Debug)]
pub(crate) struct Diagnostics {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
}

impl Diagnostics {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }

    pub(crate) fn take(&mut self) -> Vec<Diagnostic> {
        self.entries.drain(..).collect()
    }
}
