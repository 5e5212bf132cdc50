mod engine;
mod routine;
mod wait;

pub(crate) use engine::{CoroutineEngine, TickScope};
pub use engine::CoroutineState;
pub use routine::{from_fn, Routine, Step, Steps};
pub use wait::{Predicate, Wait};
