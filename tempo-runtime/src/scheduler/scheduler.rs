use std::sync::{Arc, Weak};

use tracing::{debug, error, trace, warn};

use super::command::Command;
use super::context::Context;
use crate::behaviour::Behaviour;
use crate::config::SchedulerSettings;
use crate::coroutine::{CoroutineEngine, CoroutineState, Routine, TickScope};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{check_delay, check_interval, Result, SchedulerError};
use crate::handle::{CoroutineHandle, HandleAllocator, InvokeHandle, OwnerId};
use crate::lifecycle::{LifecycleBinder, OwnerEvent, OwnerWorkSet};
use crate::queue::{Callback, InvocationQueue, Job, Payload};
use crate::time::{SimClock, TimeSource};

/// What one call to [`Scheduler::advance_all`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub frame: u64,
    /// Invocation callbacks executed.
    pub invoked: usize,
    /// Coroutine steps driven.
    pub stepped: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Per-owner behaviour scheduler.
///
/// Owns every pending invocation and coroutine; owners are only referenced.
/// All calls are expected from one tick-driving context. Hosts that need to
/// share it across threads wrap it in a lock, see
/// [`SharedScheduler`](crate::SharedScheduler).
pub struct Scheduler {
    pub(crate) settings: SchedulerSettings,
    clock: SimClock,
    queue: InvocationQueue,
    engine: CoroutineEngine,
    binder: LifecycleBinder,
    ids: HandleAllocator,
    commands: Vec<Command>,
    diagnostics: Diagnostics,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Scheduler with default settings. See [`SchedulerBuilder`](crate::SchedulerBuilder)
    /// for configured ones.
    pub fn new() -> Self {
        Self::with_settings(SchedulerSettings::default())
    }

    pub(crate) fn with_settings(settings: SchedulerSettings) -> Self {
        let diagnostics = Diagnostics::new(settings.max_diagnostics);
        Self {
            settings,
            clock: SimClock::default(),
            queue: InvocationQueue::default(),
            engine: CoroutineEngine::default(),
            binder: LifecycleBinder::default(),
            ids: HandleAllocator::default(),
            commands: Vec::new(),
            diagnostics,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Time of the last processed tick.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Number of ticks processed so far.
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    // ----------------------------------------------------------------------
    // Owners
    // ----------------------------------------------------------------------

    /// Bind an owner backed by a collaborator. Only a weak reference is kept.
    pub fn bind<B>(&mut self, behaviour: &Arc<B>) -> OwnerId
    where
        B: Behaviour + 'static,
    {
        let active = behaviour.is_active();
        let weak: Weak<dyn Behaviour> = Arc::downgrade(behaviour) as Weak<dyn Behaviour>;
        let owner = self.ids.owner();
        self.binder.bind(owner, Some(weak), active, self.clock.now());
        owner
    }

    /// Bind an active owner with no collaborator. Its lifecycle is driven only
    /// by [`deactivate`](Self::deactivate), [`reactivate`](Self::reactivate)
    /// and [`destroy`](Self::destroy).
    pub fn bind_detached(&mut self) -> OwnerId {
        let owner = self.ids.owner();
        self.binder.bind(owner, None, true, self.clock.now());
        owner
    }

    /// Pause the owner: its work is held and its local clock stops.
    pub fn deactivate(&mut self, owner: OwnerId) -> bool {
        self.binder.on_owner_deactivated(owner, self.clock.now())
    }

    /// Resume a paused owner where it left off.
    pub fn reactivate(&mut self, owner: OwnerId) -> bool {
        self.binder
            .on_owner_reactivated(owner, self.clock.now(), &mut self.queue, &self.engine)
    }

    /// Cancel all of the owner's work. Later registrations fail with
    /// [`SchedulerError::OwnerDestroyed`].
    pub fn destroy(&mut self, owner: OwnerId) -> bool {
        match self
            .binder
            .on_owner_destroyed(owner, &mut self.queue, &mut self.engine)
        {
            Some(summary) => {
                self.diagnostics
                    .push(Diagnostic::OwnerPurged { owner, summary });
                true
            }
            None => false,
        }
    }

    pub fn is_eligible(&self, owner: OwnerId) -> bool {
        self.binder.eligible(owner)
    }

    pub fn is_bound(&self, owner: OwnerId) -> bool {
        self.binder.is_bound(owner)
    }

    pub fn is_destroyed(&self, owner: OwnerId) -> bool {
        self.binder.is_destroyed(owner)
    }

    /// The owner's local clock; `None` once it is unbound or destroyed.
    pub fn owner_local_time(&self, owner: OwnerId) -> Option<f64> {
        self.binder
            .is_bound(owner)
            .then(|| self.binder.local_time(owner, self.clock.now()))
    }

    pub fn work_set(&self, owner: OwnerId) -> Option<&OwnerWorkSet> {
        self.binder.work(owner)
    }

    // ----------------------------------------------------------------------
    // Invocations
    // ----------------------------------------------------------------------

    /// Run `callback` once, `delay` seconds of the owner's time from now.
    pub fn invoke<F>(
        &mut self,
        owner: OwnerId,
        name: impl Into<String>,
        delay: f64,
        callback: F,
    ) -> Result<InvokeHandle>
    where
        F: FnMut(&mut Context<'_>) + Send + 'static,
    {
        check_delay(delay)?;
        self.binder.check_registration(owner)?;
        let handle = self.ids.invoke();
        self.schedule_invoke(owner, handle, name.into(), delay, None, Box::new(callback));
        Ok(handle)
    }

    /// Run `callback` after `delay`, then every `interval` seconds.
    pub fn invoke_repeating<F>(
        &mut self,
        owner: OwnerId,
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
        self.binder.check_registration(owner)?;
        let handle = self.ids.invoke();
        self.schedule_invoke(
            owner,
            handle,
            name.into(),
            delay,
            Some(interval),
            Box::new(callback),
        );
        Ok(handle)
    }

    fn schedule_invoke(
        &mut self,
        owner: OwnerId,
        handle: InvokeHandle,
        name: String,
        delay: f64,
        interval: Option<f64>,
        callback: Callback,
    ) {
        let local = self.binder.local_time(owner, self.clock.now());
        debug!(%owner, %handle, name = %name, delay, ?interval, "invoke scheduled");
        self.queue.schedule(
            handle.into(),
            owner,
            Payload::Invoke {
                name,
                callback: Some(callback),
            },
            local + delay,
            interval,
            self.binder.offset(owner),
        );
        self.binder.track_invoke(owner, handle);
    }

    /// Cancel one invocation. Unknown or already-fired handles return `false`.
    pub fn cancel_invocation(&mut self, handle: InvokeHandle) -> bool {
        let Some(owner) = self.queue.owner_of(handle.into()) else {
            return false;
        };
        self.queue.cancel(handle.into());
        self.binder.forget_invoke(owner, handle);
        debug!(%owner, %handle, "invoke cancelled");
        true
    }

    /// Cancel the owner's pending invocations with this name. Returns how many
    /// were cancelled.
    pub fn cancel_invoke(&mut self, owner: OwnerId, name: &str) -> usize {
        let matching = self.invokes_named(owner, name);
        for handle in &matching {
            self.cancel_invocation(*handle);
        }
        matching.len()
    }

    /// Cancel every pending invocation of the owner.
    pub fn cancel_all_invokes(&mut self, owner: OwnerId) -> usize {
        let handles: Vec<InvokeHandle> = match self.binder.work(owner) {
            Some(work) => work.invokes().collect(),
            None => return 0,
        };
        for handle in &handles {
            self.cancel_invocation(*handle);
        }
        handles.len()
    }

    pub fn is_invoking(&self, owner: OwnerId, name: &str) -> bool {
        self.binder.work(owner).is_some_and(|work| {
            work.invokes()
                .any(|handle| self.queue.name_of(handle.into()) == Some(name))
        })
    }

    pub fn is_invoking_any(&self, owner: OwnerId) -> bool {
        self.binder
            .work(owner)
            .is_some_and(|work| work.invokes().next().is_some())
    }

    pub fn is_pending(&self, handle: InvokeHandle) -> bool {
        self.queue.contains(handle.into())
    }

    /// Next due time of an invocation, on its owner's local clock.
    pub fn next_due(&self, handle: InvokeHandle) -> Option<f64> {
        self.queue.due_of(handle.into())
    }

    pub fn pending_invocations(&self) -> usize {
        self.queue.invocation_count()
    }

    fn invokes_named(&self, owner: OwnerId, name: &str) -> Vec<InvokeHandle> {
        match self.binder.work(owner) {
            Some(work) => work
                .invokes()
                .filter(|handle| self.queue.name_of((*handle).into()) == Some(name))
                .collect(),
            None => Vec::new(),
        }
    }

    // ----------------------------------------------------------------------
    // Coroutines
    // ----------------------------------------------------------------------

    /// Start a coroutine. Its first step runs on the next tick.
    pub fn start_coroutine<R>(&mut self, owner: OwnerId, routine: R) -> Result<CoroutineHandle>
    where
        R: Routine + 'static,
    {
        self.binder.check_registration(owner)?;
        let handle = self.ids.coroutine();
        self.engine.start(handle, owner, None, Box::new(routine));
        self.binder.track_coroutine(owner, handle);
        Ok(handle)
    }

    /// Start a coroutine that can later be stopped by name.
    pub fn start_named_coroutine<R>(
        &mut self,
        owner: OwnerId,
        name: impl Into<String>,
        routine: R,
    ) -> Result<CoroutineHandle>
    where
        R: Routine + 'static,
    {
        self.binder.check_registration(owner)?;
        let handle = self.ids.coroutine();
        self.engine
            .start(handle, owner, Some(name.into()), Box::new(routine));
        self.binder.track_coroutine(owner, handle);
        Ok(handle)
    }

    /// Cancel a coroutine wherever it is suspended. Unknown or finished
    /// handles return `false`.
    pub fn stop_coroutine(&mut self, handle: CoroutineHandle) -> bool {
        match self.engine.stop(handle, &mut self.queue) {
            Some(owner) => {
                self.binder.forget_coroutine(owner, handle);
                true
            }
            None => false,
        }
    }

    /// Stop every coroutine of the owner started under this name.
    pub fn stop_named_coroutine(&mut self, owner: OwnerId, name: &str) -> usize {
        let matching: Vec<CoroutineHandle> = match self.binder.work(owner) {
            Some(work) => work
                .coroutines()
                .filter(|handle| self.engine.name_of(*handle) == Some(name))
                .collect(),
            None => return 0,
        };
        for handle in &matching {
            self.stop_coroutine(*handle);
        }
        matching.len()
    }

    pub fn stop_all_coroutines(&mut self, owner: OwnerId) -> usize {
        let handles: Vec<CoroutineHandle> = match self.binder.work(owner) {
            Some(work) => work.coroutines().collect(),
            None => return 0,
        };
        for handle in &handles {
            self.stop_coroutine(*handle);
        }
        handles.len()
    }

    pub fn is_coroutine_running(&self, handle: CoroutineHandle) -> bool {
        self.engine.contains(handle)
    }

    /// `None` once the coroutine has completed or been cancelled.
    pub fn coroutine_state(&self, handle: CoroutineHandle) -> Option<CoroutineState> {
        self.engine.state_of(handle)
    }

    pub fn running_coroutines(&self) -> usize {
        self.engine.len()
    }

    // ----------------------------------------------------------------------
    // Ticking
    // ----------------------------------------------------------------------

    /// Sample `source` and advance to the time it reports.
    pub fn tick(&mut self, source: &mut impl TimeSource) -> Result<TickReport> {
        let (now, delta) = source.sample();
        self.advance_all(now, delta)
    }

    /// Process one tick at global time `now`.
    ///
    /// Due invocations run first, in due-time order with ties broken by
    /// registration order. Coroutines are advanced afterwards. Work
    /// registered while the tick runs is applied at the end of it, while
    /// cancels and stops take effect as soon as the callback or coroutine
    /// step that issued them returns.
    ///
    /// With owner polling enabled, owners are polled before the clock moves
    /// to `now`. A pause or resume seen on this tick is therefore stamped
    /// with the previous tick's time: a pause is charged from the previous
    /// tick onward, and a resume ends the pause at the previous tick.
    pub fn advance_all(&mut self, now: f64, delta: f64) -> Result<TickReport> {
        if !now.is_finite() {
            return Err(SchedulerError::invalid("now", format!("{now} is not finite")));
        }
        if now < self.clock.now() {
            return Err(SchedulerError::NonMonotonicTime {
                last: self.clock.now(),
                requested: now,
            });
        }

        if self.settings.poll_owner_state {
            self.poll_owners();
        }
        self.clock.advance_to(now, delta);

        let mut report = TickReport {
            frame: self.clock.frame(),
            ..TickReport::default()
        };
        self.drain_due(&mut report);
        self.advance_coroutines(&mut report);
        self.apply_commands();

        trace!(
            frame = report.frame,
            now,
            invoked = report.invoked,
            stepped = report.stepped,
            "tick processed"
        );
        Ok(report)
    }

    /// Everything collected since the last call, oldest first.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    fn poll_owners(&mut self) {
        for event in self.binder.poll() {
            match event {
                OwnerEvent::Deactivated(owner) => {
                    self.deactivate(owner);
                }
                OwnerEvent::Reactivated(owner) => {
                    self.reactivate(owner);
                }
                OwnerEvent::Destroyed(owner) => {
                    self.destroy(owner);
                }
            }
        }
    }

    fn drain_due(&mut self, report: &mut TickReport) {
        let now = self.clock.now();
        loop {
            let binder = &self.binder;
            let Some(entry) = self.queue.pop_due(now, |owner| binder.eligible(owner)) else {
                break;
            };
            match self.queue.take_job(entry) {
                Some(Job::Resume(coroutine)) => self.engine.wake(coroutine),
                Some(Job::Invoke {
                    owner,
                    mut callback,
                }) => {
                    let time = self
                        .clock
                        .snapshot(self.binder.local_time(owner, now));
                    {
                        let mut ctx =
                            Context::new(owner, time, &self.binder, &mut self.ids, &mut self.commands);
                        callback(&mut ctx);
                    }
                    report.invoked += 1;

                    let requeued =
                        self.queue
                            .finish(entry, callback, time.local, self.binder.offset(owner));
                    if !requeued {
                        self.binder.forget_invoke(owner, InvokeHandle(entry.0));
                    }
                    self.apply_cancellations();
                }
                None => {}
            }
        }
    }

    /// Apply the cancels and stops issued by the callback that just returned,
    /// so they win over everything later in this tick. Registrations stay
    /// queued for the end of the tick, in the order they were made.
    fn apply_cancellations(&mut self) {
        if !self.commands.iter().any(Command::is_cancellation) {
            return;
        }
        for command in std::mem::take(&mut self.commands) {
            if command.is_cancellation() {
                self.apply_or_report(command);
            } else {
                self.commands.push(command);
            }
        }
    }

    fn advance_coroutines(&mut self, report: &mut TickReport) {
        let outcome = {
            let mut scope = TickScope {
                clock: &self.clock,
                binder: &self.binder,
                ids: &mut self.ids,
                commands: &mut self.commands,
            };
            self.engine.advance(&mut self.queue, &mut scope)
        };
        report.stepped = outcome.stepped;
        report.completed = outcome.completed.len();
        report.failed = outcome.failed.len();

        for (owner, child) in outcome.children {
            self.binder.track_coroutine(owner, child);
        }
        for (owner, handle) in outcome.stopped {
            self.binder.forget_coroutine(owner, handle);
        }
        for (owner, handle) in outcome.completed {
            self.binder.forget_coroutine(owner, handle);
        }
        for (coroutine, waiting_on) in outcome.cyclic {
            warn!(%coroutine, %waiting_on, "cyclic coroutine wait resolved as satisfied");
            self.diagnostics.push(Diagnostic::CyclicWait {
                coroutine,
                waiting_on,
            });
        }
        for (owner, coroutine, routine_error) in outcome.failed {
            error!(%owner, %coroutine, error = %routine_error, "coroutine failed and was cancelled");
            self.binder.forget_coroutine(owner, coroutine);
            if let Some(behaviour) = self.binder.behaviour(owner) {
                behaviour.on_routine_error(coroutine, &routine_error);
            }
            self.diagnostics.push(Diagnostic::RoutineFailed {
                owner,
                coroutine,
                error: routine_error,
            });
        }
    }

    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            self.apply_or_report(command);
        }
    }

    fn apply_or_report(&mut self, command: Command) {
        if let Err((owner, rejected)) = self.apply(command) {
            warn!(%owner, error = %rejected, "deferred request rejected");
            self.diagnostics.push(Diagnostic::CommandRejected {
                owner,
                reason: rejected.to_string(),
            });
        }
    }

    fn apply(&mut self, command: Command) -> std::result::Result<(), (OwnerId, SchedulerError)> {
        if command.is_cancellation() {
            // Registrations issued earlier in this tick are covered as well.
            self.commands.retain(|pending| !command.covers(pending));
        }
        match command {
            Command::Invoke {
                owner,
                handle,
                name,
                delay,
                interval,
                callback,
            } => {
                self.binder
                    .check_registration(owner)
                    .map_err(|e| (owner, e))?;
                self.schedule_invoke(owner, handle, name, delay, interval, callback);
            }
            Command::CancelInvocation(handle) => {
                self.cancel_invocation(handle);
            }
            Command::CancelNamed { owner, name } => {
                self.cancel_invoke(owner, &name);
            }
            Command::CancelAll(owner) => {
                self.cancel_all_invokes(owner);
            }
            Command::StartCoroutine {
                owner,
                handle,
                name,
                routine,
            } => {
                self.binder
                    .check_registration(owner)
                    .map_err(|e| (owner, e))?;
                self.engine.start(handle, owner, name, routine);
                self.binder.track_coroutine(owner, handle);
            }
            Command::StopCoroutine(handle) => {
                self.stop_coroutine(handle);
            }
            Command::StopNamed { owner, name } => {
                self.stop_named_coroutine(owner, &name);
            }
            Command::StopAll(owner) => {
                self.stop_all_coroutines(owner);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn timer_of(&self, handle: CoroutineHandle) -> Option<crate::queue::EntryId> {
        self.engine.timer_of(handle)
    }

    #[cfg(test)]
    pub(crate) fn queue_contains(&self, entry: crate::queue::EntryId) -> bool {
        self.queue.contains(entry)
    }
}
