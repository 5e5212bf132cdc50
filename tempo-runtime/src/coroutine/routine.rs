use std::collections::VecDeque;

use super::wait::Wait;
use crate::error::RoutineError;
use crate::scheduler::Context;

/// Outcome of driving a routine one step.
#[derive(Debug)]
pub enum Step {
    /// Suspend until the wait condition is satisfied.
    Yield(Wait),
    /// The routine has finished.
    Done,
}

/// A coroutine body, written as an explicit resumable state machine.
///
/// Every call to `resume` runs the body up to its next yield point. State that
/// has to survive a yield lives in `self`.
///
/// Closures of the right shape are routines too:
///
/// ```rust
/// use tempo_runtime::{Context, RoutineError, Step, Wait};
///
/// let mut blinks = 0;
/// let _routine = move |_ctx: &mut Context<'_>| -> Result<Step, RoutineError> {
///     blinks += 1;
///     if blinks < 3 {
///         Ok(Step::Yield(Wait::seconds(0.5)))
///     } else {
///         Ok(Step::Done)
///     }
/// };
/// ```
pub trait Routine: Send {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Step, RoutineError>;
}

impl<F> Routine for F
where
    F: FnMut(&mut Context<'_>) -> Result<Step, RoutineError> + Send,
{
    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Step, RoutineError> {
        self(ctx)
    }
}

/// Wrap a closure as a routine.
///
/// Only needed to help closure type inference when the routine is passed
/// straight into `start_coroutine`.
pub fn from_fn<F>(f: F) -> F
where
    F: FnMut(&mut Context<'_>) -> Result<Step, RoutineError> + Send,
{
    f
}

type Stage = Box<dyn FnMut(&mut Context<'_>) -> Result<(), RoutineError> + Send>;

enum Segment {
    Run(Stage),
    Wait(Wait),
}

/// Linear routine assembled from stages and waits.
///
/// Consecutive stages run in the same step; each wait ends a step.
#[derive(Default)]
pub struct Steps {
    segments: VecDeque<Segment>,
}

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<F>(mut self, stage: F) -> Self
    where
        F: FnMut(&mut Context<'_>) -> Result<(), RoutineError> + Send + 'static,
    {
        self.segments.push_back(Segment::Run(Box::new(stage)));
        self
    }

    pub fn wait(mut self, wait: Wait) -> Self {
        self.segments.push_back(Segment::Wait(wait));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Routine for Steps {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Step, RoutineError> {
        while let Some(segment) = self.segments.pop_front() {
            match segment {
                Segment::Run(mut stage) => stage(ctx)?,
                Segment::Wait(wait) => return Ok(Step::Yield(wait)),
            }
        }
        Ok(Step::Done)
    }
}

impl std::fmt::Debug for Steps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Steps")
            .field("remaining", &self.segments.len())
            .finish()
    }
}
