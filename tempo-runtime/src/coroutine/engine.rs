use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use super::routine::{Routine, Step};
use super::wait::{Predicate, Wait};
use crate::error::RoutineError;
use crate::handle::{CoroutineHandle, HandleAllocator, OwnerId};
use crate::lifecycle::LifecycleBinder;
use crate::queue::{EntryId, InvocationQueue, Payload};
use crate::scheduler::{Command, Context};
use crate::time::{SimClock, TickTime};

/// Observable state of a coroutine.
///
/// `Completed` and `Cancelled` are terminal: a coroutine reaching them is
/// removed from the engine in the same operation, so lookups by handle only
/// ever report `Runnable` or `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    Runnable,
    Waiting,
    Completed,
    Cancelled,
}

enum Pending {
    Ready,
    Timer(EntryId),
    Until(Predicate),
    Join(CoroutineHandle),
}

struct CoroutineRecord {
    owner: OwnerId,
    name: Option<String>,
    routine: Option<Box<dyn Routine>>,
    pending: Pending,
}

/// Borrowed scheduler state a tick phase needs to build a [`Context`].
pub(crate) struct TickScope<'a> {
    pub(crate) clock: &'a SimClock,
    pub(crate) binder: &'a LifecycleBinder,
    pub(crate) ids: &'a mut HandleAllocator,
    pub(crate) commands: &'a mut Vec<Command>,
}

impl TickScope<'_> {
    pub(crate) fn time_for(&self, owner: OwnerId) -> TickTime {
        self.clock
            .snapshot(self.binder.local_time(owner, self.clock.now()))
    }

    /// Whether a coroutine with this handle was started during this tick and
    /// is waiting for the apply phase.
    pub(crate) fn is_starting(&self, handle: CoroutineHandle) -> bool {
        self.commands.iter().any(|command| {
            matches!(command, Command::StartCoroutine { handle: started, .. } if *started == handle)
        })
    }
}

/// What happened during one advance pass.
#[derive(Default)]
pub(crate) struct AdvanceReport {
    pub(crate) stepped: usize,
    pub(crate) completed: Vec<(OwnerId, CoroutineHandle)>,
    pub(crate) failed: Vec<(OwnerId, CoroutineHandle, RoutineError)>,
    pub(crate) children: Vec<(OwnerId, CoroutineHandle)>,
    /// Coroutines stopped by other coroutines during the pass.
    pub(crate) stopped: Vec<(OwnerId, CoroutineHandle)>,
    /// `(waiter, target)` pairs whose wait was forced because it closed a cycle.
    pub(crate) cyclic: Vec<(CoroutineHandle, CoroutineHandle)>,
}

#[derive(Default)]
pub(crate) struct CoroutineEngine {
    records: BTreeMap<CoroutineHandle, CoroutineRecord>,
}

impl CoroutineEngine {
    pub(crate) fn start(
        &mut self,
        handle: CoroutineHandle,
        owner: OwnerId,
        name: Option<String>,
        routine: Box<dyn Routine>,
    ) {
        debug!(%handle, %owner, name = name.as_deref().unwrap_or("<anonymous>"), "coroutine started");
        self.records.insert(
            handle,
            CoroutineRecord {
                owner,
                name,
                routine: Some(routine),
                pending: Pending::Ready,
            },
        );
    }

    pub(crate) fn contains(&self, handle: CoroutineHandle) -> bool {
        self.records.contains_key(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn owner_of(&self, handle: CoroutineHandle) -> Option<OwnerId> {
        self.records.get(&handle).map(|record| record.owner)
    }

    pub(crate) fn name_of(&self, handle: CoroutineHandle) -> Option<&str> {
        self.records.get(&handle)?.name.as_deref()
    }

    pub(crate) fn state_of(&self, handle: CoroutineHandle) -> Option<CoroutineState> {
        self.records.get(&handle).map(|record| match record.pending {
            Pending::Ready => CoroutineState::Runnable,
            _ => CoroutineState::Waiting,
        })
    }

    /// Queue entry backing a `Seconds` wait, if one is pending.
    pub(crate) fn timer_of(&self, handle: CoroutineHandle) -> Option<EntryId> {
        match self.records.get(&handle)?.pending {
            Pending::Timer(entry) => Some(entry),
            _ => None,
        }
    }

    /// Called when a coroutine's timer entry is drained.
    pub(crate) fn wake(&mut self, handle: CoroutineHandle) {
        if let Some(record) = self.records.get_mut(&handle) {
            if matches!(record.pending, Pending::Timer(_)) {
                record.pending = Pending::Ready;
            }
        }
    }

    /// Cancel a coroutine along with its pending timer entry.
    pub(crate) fn stop(
        &mut self,
        handle: CoroutineHandle,
        queue: &mut InvocationQueue,
    ) -> Option<OwnerId> {
        let record = self.records.remove(&handle)?;
        if let Pending::Timer(entry) = record.pending {
            queue.cancel(entry);
        }
        debug!(%handle, owner = %record.owner, state = ?CoroutineState::Cancelled, "coroutine stopped");
        Some(record.owner)
    }

    /// Drive every ready coroutine of an eligible owner one step.
    ///
    /// The set of coroutines is snapshotted up front, so children started in
    /// this pass and routines that yield `NextTick` run on the next tick.
    pub(crate) fn advance(
        &mut self,
        queue: &mut InvocationQueue,
        scope: &mut TickScope<'_>,
    ) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        let handles: Vec<CoroutineHandle> = self.records.keys().copied().collect();

        for handle in handles {
            let Some(owner) = self.owner_of(handle) else {
                continue;
            };
            if !scope.binder.eligible(owner) {
                continue;
            }
            let time = scope.time_for(owner);
            if !self.is_ready(handle, &time) {
                continue;
            }

            let Some(mut routine) = self
                .records
                .get_mut(&handle)
                .and_then(|record| record.routine.take())
            else {
                continue;
            };

            let outcome = {
                let mut ctx = Context::new(owner, time, scope.binder, scope.ids, scope.commands);
                routine.resume(&mut ctx)
            };
            report.stepped += 1;

            match outcome {
                Ok(Step::Yield(wait)) => {
                    trace!(%handle, ?wait, "coroutine yielded");
                    if let Some(record) = self.records.get_mut(&handle) {
                        record.routine = Some(routine);
                    }
                    self.install_wait(handle, owner, wait, &time, queue, scope, &mut report);
                }
                Ok(Step::Done) => {
                    self.records.remove(&handle);
                    debug!(%handle, %owner, state = ?CoroutineState::Completed, "coroutine finished");
                    report.completed.push((owner, handle));
                }
                Err(error) => {
                    self.records.remove(&handle);
                    report.failed.push((owner, handle, error));
                }
            }
            self.apply_stops(queue, scope, &mut report);
        }

        report
    }

    /// Apply the stops issued by the step that just returned, before any
    /// later coroutine of the pass runs. Other requests stay queued.
    fn apply_stops(
        &mut self,
        queue: &mut InvocationQueue,
        scope: &mut TickScope<'_>,
        report: &mut AdvanceReport,
    ) {
        if !scope.commands.iter().any(Command::is_stop) {
            return;
        }
        for command in std::mem::take(scope.commands) {
            if !command.is_stop() {
                scope.commands.push(command);
                continue;
            }
            let targets: Vec<CoroutineHandle> = match &command {
                Command::StopCoroutine(handle) => vec![*handle],
                Command::StopNamed { owner, name } => self
                    .records
                    .iter()
                    .filter(|(_, record)| {
                        record.owner == *owner && record.name.as_deref() == Some(name.as_str())
                    })
                    .map(|(handle, _)| *handle)
                    .collect(),
                Command::StopAll(owner) => self
                    .records
                    .iter()
                    .filter(|(_, record)| record.owner == *owner)
                    .map(|(handle, _)| *handle)
                    .collect(),
                _ => Vec::new(),
            };
            scope.commands.retain(|pending| !command.covers(pending));
            for handle in targets {
                if let Some(owner) = self.stop(handle, queue) {
                    report.stopped.push((owner, handle));
                }
            }
        }
    }

    fn is_ready(&mut self, handle: CoroutineHandle, time: &TickTime) -> bool {
        let join = match self.records.get_mut(&handle).map(|record| &mut record.pending) {
            None => return false,
            Some(Pending::Ready) => return true,
            Some(Pending::Timer(_)) => return false,
            Some(Pending::Until(predicate)) => {
                if !predicate(time) {
                    return false;
                }
                None
            }
            Some(Pending::Join(target)) => Some(*target),
        };

        if let Some(target) = join {
            if self.records.contains_key(&target) {
                return false;
            }
        }
        if let Some(record) = self.records.get_mut(&handle) {
            record.pending = Pending::Ready;
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn install_wait(
        &mut self,
        handle: CoroutineHandle,
        owner: OwnerId,
        wait: Wait,
        time: &TickTime,
        queue: &mut InvocationQueue,
        scope: &mut TickScope<'_>,
        report: &mut AdvanceReport,
    ) {
        let pending = match wait {
            Wait::NextTick => Pending::Ready,
            Wait::Seconds(seconds) if !(seconds > 0.0) => Pending::Ready,
            Wait::Seconds(seconds) => {
                let entry = EntryId(scope.ids.next_raw());
                queue.schedule(
                    entry,
                    owner,
                    Payload::Resume(handle),
                    time.local + seconds,
                    None,
                    scope.binder.offset(owner),
                );
                Pending::Timer(entry)
            }
            Wait::Until(predicate) => Pending::Until(predicate),
            Wait::WaitFor(target) => {
                if !self.records.contains_key(&target) && !scope.is_starting(target) {
                    Pending::Ready
                } else if self.closes_cycle(handle, target) {
                    report.cyclic.push((handle, target));
                    Pending::Ready
                } else {
                    Pending::Join(target)
                }
            }
            Wait::Child(routine) => {
                let child = scope.ids.coroutine();
                self.start(child, owner, None, routine);
                report.children.push((owner, child));
                Pending::Join(child)
            }
        };

        if let Some(record) = self.records.get_mut(&handle) {
            record.pending = pending;
        }
    }

    /// Whether `waiter` waiting on `target` would close a chain of joins.
    fn closes_cycle(&self, waiter: CoroutineHandle, target: CoroutineHandle) -> bool {
        let mut seen = HashSet::new();
        let mut current = target;
        loop {
            if current == waiter {
                return true;
            }
            if !seen.insert(current) {
                return false;
            }
            match self.records.get(&current).map(|record| &record.pending) {
                Some(Pending::Join(next)) => current = *next,
                _ => return false,
            }
        }
    }
}
