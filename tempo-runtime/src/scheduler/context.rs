use super::command::Command;
use crate::coroutine::Routine;
use crate::error::{check_delay, check_interval, Result};
use crate::handle::{CoroutineHandle, HandleAllocator, InvokeHandle, OwnerId};
use crate::lifecycle::LifecycleBinder;
use crate::time::TickTime;

/// What an invocation callback or coroutine body sees while it runs.
///
/// Registrations made through the context are validated immediately but
/// applied only after the current tick's drain and advance phases, so
/// nothing registered here can run before the next tick. Handles are issued
/// right away and can be used for `Wait::WaitFor` or later cancellation.
///
/// Cancels and stops take effect as soon as the running callback or
/// coroutine step returns: an invocation or coroutine they cover does not
/// run again, even if it was due later in the same tick. They also cover
/// registrations made earlier in the tick that are still waiting to be
/// applied.
pub struct Context<'a> {
    owner: OwnerId,
    time: TickTime,
    binder: &'a LifecycleBinder,
    ids: &'a mut HandleAllocator,
    commands: &'a mut Vec<Command>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        owner: OwnerId,
        time: TickTime,
        binder: &'a LifecycleBinder,
        ids: &'a mut HandleAllocator,
        commands: &'a mut Vec<Command>,
    ) -> Self {
        Self {
            owner,
            time,
            binder,
            ids,
            commands,
        }
    }

    /// Owner the running work belongs to.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn time(&self) -> &TickTime {
        &self.time
    }

    /// Global time of the current tick.
    pub fn now(&self) -> f64 {
        self.time.now
    }

    /// The owner's local clock, excluding time spent inactive.
    pub fn local_time(&self) -> f64 {
        self.time.local
    }

    pub fn delta(&self) -> f64 {
        self.time.delta
    }

    pub fn frame(&self) -> u64 {
        self.time.frame
    }

    pub fn invoke<F>(&mut self, name: impl Into<String>, delay: f64, callback: F) -> Result<InvokeHandle>
    where
        F: FnMut(&mut Context<'_>) + Send + 'static,
    {
        check_delay(delay)?;
        self.push_invoke(name.into(), delay, None, Box::new(callback))
    }

    pub fn invoke_repeating<F>(
        &mut self,
        name: impl Into<String>,
        delay: f64,
        interval: f64,
        callback: F,
    ) -> Result<InvokeHandle>
    where
        F: FnMut(&mut Context<'_>) + Send + 'static,
    {
        check_delay(delay)?;
        check_interval(interval)?;
        self.push_invoke(name.into(), delay, Some(interval), Box::new(callback))
    }

    fn push_invoke(
        &mut self,
        name: String,
        delay: f64,
        interval: Option<f64>,
        callback: crate::queue::Callback,
    ) -> Result<InvokeHandle> {
        self.binder.check_registration(self.owner)?;
        let handle = self.ids.invoke();
        self.commands.push(Command::Invoke {
            owner: self.owner,
            handle,
            name,
            delay,
            interval,
            callback,
        });
        Ok(handle)
    }

    /// Cancel every pending invocation of this owner with the given name.
    pub fn cancel_invoke(&mut self, name: impl Into<String>) {
        self.commands.push(Command::CancelNamed {
            owner: self.owner,
            name: name.into(),
        });
    }

    pub fn cancel_invocation(&mut self, handle: InvokeHandle) {
        self.commands.push(Command::CancelInvocation(handle));
    }

    pub fn cancel_all_invokes(&mut self) {
        self.commands.push(Command::CancelAll(self.owner));
    }

    pub fn start_coroutine<R>(&mut self, routine: R) -> Result<CoroutineHandle>
    where
        R: Routine + 'static,
    {
        self.push_start(None, Box::new(routine))
    }

    pub fn start_named_coroutine<R>(&mut self, name: impl Into<String>, routine: R) -> Result<CoroutineHandle>
    where
        R: Routine + 'static,
    {
        self.push_start(Some(name.into()), Box::new(routine))
    }

    fn push_start(&mut self, name: Option<String>, routine: Box<dyn Routine>) -> Result<CoroutineHandle> {
        self.binder.check_registration(self.owner)?;
        let handle = self.ids.coroutine();
        self.commands.push(Command::StartCoroutine {
            owner: self.owner,
            handle,
            name,
            routine,
        });
        Ok(handle)
    }

    pub fn stop_coroutine(&mut self, handle: CoroutineHandle) {
        self.commands.push(Command::StopCoroutine(handle));
    }

    /// Stop every coroutine of this owner started under the given name.
    pub fn stop_named_coroutine(&mut self, name: impl Into<String>) {
        self.commands.push(Command::StopNamed {
            owner: self.owner,
            name: name.into(),
        });
    }

    pub fn stop_all_coroutines(&mut self) {
        self.commands.push(Command::StopAll(self.owner));
    }
}
