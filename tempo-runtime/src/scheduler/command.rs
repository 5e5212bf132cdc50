use crate::coroutine::Routine;
use crate::handle::{CoroutineHandle, InvokeHandle, OwnerId};
use crate::queue::Callback;

/// A request issued from inside a tick.
///
/// Registrations wait until the tick's drain and advance phases are over.
/// Cancels and stops are applied as soon as the callback or coroutine step
/// that issued them returns.
pub(crate) enum Command {
    Invoke {
        owner: OwnerId,
        handle: InvokeHandle,
        name: String,
        delay: f64,
        interval: Option<f64>,
        callback: Callback,
    },
    CancelInvocation(InvokeHandle),
    CancelNamed {
        owner: OwnerId,
        name: String,
    },
    CancelAll(OwnerId),
    StartCoroutine {
        owner: OwnerId,
        handle: CoroutineHandle,
        name: Option<String>,
        routine: Box<dyn Routine>,
    },
    StopCoroutine(CoroutineHandle),
    StopNamed {
        owner: OwnerId,
        name: String,
    },
    StopAll(OwnerId),
}

impl Command {
    pub(crate) fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Command::CancelInvocation(_)
                | Command::CancelNamed { .. }
                | Command::CancelAll(_)
                | Command::StopCoroutine(_)
                | Command::StopNamed { .. }
                | Command::StopAll(_)
        )
    }

    pub(crate) fn is_stop(&self) -> bool {
        matches!(
            self,
            Command::StopCoroutine(_) | Command::StopNamed { .. } | Command::StopAll(_)
        )
    }

    /// Whether this cancel or stop covers a registration still waiting to be
    /// applied.
    pub(crate) fn covers(&self, pending: &Command) -> bool {
        match (self, pending) {
            (Command::CancelInvocation(target), Command::Invoke { handle, .. }) => target == handle,
            (
                Command::CancelNamed { owner, name },
                Command::Invoke {
                    owner: pending_owner,
                    name: pending_name,
                    ..
                },
            ) => owner == pending_owner && name == pending_name,
            (Command::CancelAll(owner), Command::Invoke { owner: pending_owner, .. }) => {
                owner == pending_owner
            }
            (Command::StopCoroutine(target), Command::StartCoroutine { handle, .. }) => {
                target == handle
            }
            (
                Command::StopNamed { owner, name },
                Command::StartCoroutine {
                    owner: pending_owner,
                    name: Some(pending_name),
                    ..
                },
            ) => owner == pending_owner && name == pending_name,
            (Command::StopAll(owner), Command::StartCoroutine { owner: pending_owner, .. }) => {
                owner == pending_owner
            }
            _ => false,
        }
    }
}
