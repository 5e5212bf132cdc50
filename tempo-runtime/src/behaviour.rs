use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RoutineError;
use crate::handle::CoroutineHandle;

/// The object model's side of an owner.
///
/// The scheduler only keeps a `Weak` reference to it. Dropping the last
/// strong reference is treated like destruction on the next poll.
pub trait Behaviour: Send + Sync {
    /// Whether work attached to this owner may run right now.
    fn is_active(&self) -> bool;

    fn is_destroyed(&self) -> bool {
        false
    }

    /// Error channel for coroutine bodies that fail mid-step.
    fn on_routine_error(&self, _handle: CoroutineHandle, _error: &RoutineError) {}
}

/// Ready-made [`Behaviour`] backed by two atomic flags.
#[derive(Debug)]
pub struct BehaviourFlags {
    active: AtomicBool,
    destroyed: AtomicBool,
}

impl Default for BehaviourFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviourFlags {
    /// A live, active owner.
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

impl Behaviour for BehaviourFlags {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
