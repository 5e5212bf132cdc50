mod builder;
mod command;
mod context;
mod driver;
mod handle;
#[allow(clippy::module_inception)]
mod scheduler;

pub(crate) use command::Command;

pub use builder::SchedulerBuilder;
pub use context::Context;
pub use driver::{Driver, SharedScheduler};
pub use handle::DriverHandle;
pub use scheduler::{Scheduler, TickReport};
