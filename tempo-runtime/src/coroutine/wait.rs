use std::fmt;

use super::routine::Routine;
use crate::handle::CoroutineHandle;
use crate::time::TickTime;

/// Predicate polled once per tick by [`Wait::Until`].
pub type Predicate = Box<dyn FnMut(&TickTime) -> bool + Send>;

/// What a suspended coroutine is waiting for.
pub enum Wait {
    /// Resume on the following tick.
    NextTick,
    /// Resume once this many seconds of the owner's local time have passed.
    /// Zero or negative values behave like `NextTick`.
    Seconds(f64),
    /// Resume once the predicate returns `true`. Checked once per tick while
    /// the owner is eligible.
    Until(Predicate),
    /// Resume once the given coroutine completes or is cancelled.
    WaitFor(CoroutineHandle),
    /// Start a child coroutine on the same owner and wait for it.
    Child(Box<dyn Routine>),
}

impl Wait {
    pub fn seconds(seconds: f64) -> Self {
        Wait::Seconds(seconds)
    }

    pub fn until<F>(predicate: F) -> Self
    where
        F: FnMut(&TickTime) -> bool + Send + 'static,
    {
        Wait::Until(Box::new(predicate))
    }

    pub fn for_coroutine(handle: CoroutineHandle) -> Self {
        Wait::WaitFor(handle)
    }

    pub fn child<R>(routine: R) -> Self
    where
        R: Routine + 'static,
    {
        Wait::Child(Box::new(routine))
    }
}

impl fmt::Debug for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wait::NextTick => f.write_str("NextTick"),
            Wait::Seconds(s) => f.debug_tuple("Seconds").field(s).finish(),
            Wait::Until(_) => f.write_str("Until(..)"),
            Wait::WaitFor(handle) => f.debug_tuple("WaitFor").field(handle).finish(),
            Wait::Child(_) => f.write_str("Child(..)"),
        }
    }
}
