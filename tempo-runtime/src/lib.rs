//! Tempo Runtime - per-owner behaviour scheduler
//!
//! This crate provides a single-threaded, tick-driven scheduler for delayed
//! and repeating invocations and for cooperative coroutines. Every piece of
//! work belongs to an owner; pausing the owner freezes its clock, destroying
//! it drops its work.
//!
//! ```rust
//! use tempo_runtime::{from_fn, Scheduler, Step, Wait};
//!
//! # fn main() -> Result<(), tempo_runtime::SchedulerError> {
//! let mut scheduler = Scheduler::new();
//! let owner = scheduler.bind_detached();
//!
//! scheduler.invoke(owner, "greet", 0.5, |ctx| {
//!     println!("hello at {:.1}s", ctx.local_time());
//! })?;
//!
//! let mut ticks = 0;
//! scheduler.start_coroutine(owner, from_fn(move |_ctx| {
//!     ticks += 1;
//!     Ok(if ticks < 3 { Step::Yield(Wait::NextTick) } else { Step::Done })
//! }))?;
//!
//! for frame in 1..=4 {
//!     scheduler.advance_all(frame as f64 * 0.25, 0.25)?;
//! }
//! assert_eq!(scheduler.pending_invocations(), 0);
//! assert_eq!(scheduler.running_coroutines(), 0);
//! # Ok(())
//! # }
//! ```

mod behaviour;
mod config;
mod coroutine;
mod diagnostics;
mod error;
mod handle;
mod lifecycle;
mod queue;
mod scheduler;
mod time;
mod time_unit;

// Re-export public API
pub use behaviour::{Behaviour, BehaviourFlags};
pub use config::{load_toml_config, load_yaml_config, SchedulerSettings};
pub use coroutine::{from_fn, CoroutineState, Predicate, Routine, Step, Steps, Wait};
pub use diagnostics::Diagnostic;
pub use error::{Result, RoutineError, SchedulerError};
pub use handle::{CoroutineHandle, InvokeHandle, OwnerId};
pub use lifecycle::{OwnerWorkSet, PurgeSummary};
pub use queue::Callback;
pub use scheduler::{
    Context, Driver, DriverHandle, Scheduler, SchedulerBuilder, SharedScheduler, TickReport,
};
pub use time::{FixedStep, SimClock, TickTime, TimeSource, WallClock};
pub use time_unit::TimeUnit;

/// Re-exported so hosts can build a `Config` without a direct dependency.
pub use ::config as settings;
