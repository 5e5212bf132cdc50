//! # Tempo - per-owner behaviour scheduling for game loops
//!
//! Tempo schedules work on behalf of owners (entities, components, scene
//! objects) and advances it once per host tick.
//!
//! ## Features
//!
//! - **Invokes**: run a callback once after a delay, or repeatedly on a fixed grid
//! - **Coroutines**: resumable routines that wait for ticks, seconds, predicates or other coroutines
//! - **Lifecycle binding**: pausing an owner freezes its clock, destroying it drops its work
//! - **Deterministic ordering**: equal due times run in registration order
//! - **Config support**: scheduler settings from TOML/YAML files with `TEMPO_` environment overrides
//! - **Tokio driver**: optional wall-clock tick loop for hosts without their own frame loop
//!
//! ## Quick Start
//!
//! ```rust
//! use tempo::prelude::*;
//!
//! # fn main() -> Result<(), tempo::SchedulerError> {
//! let mut scheduler = SchedulerBuilder::new().build()?;
//! let enemy = scheduler.bind_detached();
//!
//! scheduler.invoke_repeating(enemy, "regen", 1.0, 1.0, |ctx| {
//!     println!("regen at {:.2}s", ctx.local_time());
//! })?;
//!
//! scheduler.start_named_coroutine(
//!     enemy,
//!     "blink",
//!     Steps::new()
//!         .then(|_| Ok(()))
//!         .wait(Wait::seconds(0.5))
//!         .then(|ctx| {
//!             println!("blinked on frame {}", ctx.frame());
//!             Ok(())
//!         }),
//! )?;
//!
//! let mut clock = FixedStep::new(0.25);
//! for _ in 0..8 {
//!     scheduler.tick(&mut clock)?;
//! }
//! assert!(scheduler.is_invoking(enemy, "regen"));
//! assert_eq!(scheduler.running_coroutines(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Create `config/application.toml`:
//!
//! ```toml
//! [scheduler]
//! tick_rate = "16ms"
//! max_delta = "250ms"
//! poll_owner_state = true
//! max_diagnostics = 256
//! ```
//!
//! Or `config/application.yaml`:
//!
//! ```yaml
//! scheduler:
//!   tick_rate: 16ms
//!   max_delta: 250ms
//! ```
//!
//! You can also use environment variables with the `TEMPO_` prefix:
//!
//! ```bash
//! export TEMPO_SCHEDULER__TICK_RATE=8ms
//! ```

// Re-export core types
pub use tempo_runtime::{
    from_fn, load_toml_config, load_yaml_config, settings, Behaviour, BehaviourFlags, Callback,
    Context, CoroutineHandle, CoroutineState, Diagnostic, Driver, DriverHandle, FixedStep,
    InvokeHandle, OwnerId, OwnerWorkSet, Predicate, PurgeSummary, Result, Routine, RoutineError,
    Scheduler, SchedulerBuilder, SchedulerError, SchedulerSettings, SharedScheduler, SimClock,
    Step, Steps, TickReport, TickTime, TimeSource, TimeUnit, Wait, WallClock,
};

// Make tempo_runtime available to hosts that need the full surface
pub use tempo_runtime;

/// The types most hosts need.
pub mod prelude {
    pub use tempo_runtime::{
        from_fn, Behaviour, BehaviourFlags, Context, CoroutineHandle, Driver, FixedStep,
        InvokeHandle, OwnerId, Routine, RoutineError, Scheduler, SchedulerBuilder, Step, Steps,
        TimeSource, Wait,
    };
}
