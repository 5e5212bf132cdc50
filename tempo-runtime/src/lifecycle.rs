//! Owner lifecycle: activity, pausing and destruction.
//!
//! Every owner carries a local clock, `global - paused_total`. While the owner
//! is inactive its local clock is frozen at the moment it was deactivated, so
//! delays and timed waits only count time the owner spent active.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::behaviour::Behaviour;
use crate::coroutine::CoroutineEngine;
use crate::error::{Result, SchedulerError};
use crate::handle::{CoroutineHandle, InvokeHandle, OwnerId};
use crate::queue::{EntryId, InvocationQueue};

/// Every invocation and coroutine handle registered against one owner.
#[derive(Debug, Default, Clone)]
pub struct OwnerWorkSet {
    invokes: BTreeSet<InvokeHandle>,
    coroutines: BTreeSet<CoroutineHandle>,
}

impl OwnerWorkSet {
    pub fn invokes(&self) -> impl Iterator<Item = InvokeHandle> + '_ {
        self.invokes.iter().copied()
    }

    pub fn coroutines(&self) -> impl Iterator<Item = CoroutineHandle> + '_ {
        self.coroutines.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.invokes.is_empty() && self.coroutines.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Activity {
    Active,
    Inactive { since: f64 },
}

struct OwnerRecord {
    behaviour: Option<Weak<dyn Behaviour>>,
    activity: Activity,
    paused_total: f64,
    // Last value reported by the collaborator; polling reacts to changes only.
    observed_active: bool,
    work: OwnerWorkSet,
}

/// A change noticed while polling collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnerEvent {
    Deactivated(OwnerId),
    Reactivated(OwnerId),
    Destroyed(OwnerId),
}

/// Counts of work dropped when an owner was destroyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub invokes: usize,
    pub coroutines: usize,
}

#[derive(Default)]
pub(crate) struct LifecycleBinder {
    owners: HashMap<OwnerId, OwnerRecord>,
    destroyed: HashSet<OwnerId>,
}

impl LifecycleBinder {
    pub(crate) fn bind(
        &mut self,
        owner: OwnerId,
        behaviour: Option<Weak<dyn Behaviour>>,
        active: bool,
        now: f64,
    ) {
        let activity = if active {
            Activity::Active
        } else {
            Activity::Inactive { since: now }
        };
        self.owners.insert(
            owner,
            OwnerRecord {
                behaviour,
                activity,
                paused_total: 0.0,
                observed_active: active,
                work: OwnerWorkSet::default(),
            },
        );
        debug!(%owner, active, "owner bound");
    }

    /// O(1): the predicate consulted for every pending item on every tick.
    pub(crate) fn eligible(&self, owner: OwnerId) -> bool {
        matches!(
            self.owners.get(&owner).map(|record| record.activity),
            Some(Activity::Active)
        )
    }

    pub(crate) fn is_bound(&self, owner: OwnerId) -> bool {
        self.owners.contains_key(&owner)
    }

    pub(crate) fn is_destroyed(&self, owner: OwnerId) -> bool {
        self.destroyed.contains(&owner)
    }

    pub(crate) fn check_registration(&self, owner: OwnerId) -> Result<()> {
        if self.owners.contains_key(&owner) {
            Ok(())
        } else if self.destroyed.contains(&owner) {
            Err(SchedulerError::OwnerDestroyed(owner))
        } else {
            Err(SchedulerError::UnknownOwner(owner))
        }
    }

    /// Total time the owner has spent inactive, excluding a pause in progress.
    pub(crate) fn offset(&self, owner: OwnerId) -> f64 {
        self.owners
            .get(&owner)
            .map_or(0.0, |record| record.paused_total)
    }

    /// The owner's local clock at global time `now`.
    pub(crate) fn local_time(&self, owner: OwnerId, now: f64) -> f64 {
        match self.owners.get(&owner) {
            Some(OwnerRecord {
                activity: Activity::Active,
                paused_total,
                ..
            }) => now - paused_total,
            Some(OwnerRecord {
                activity: Activity::Inactive { since },
                paused_total,
                ..
            }) => since - paused_total,
            None => now,
        }
    }

    pub(crate) fn work(&self, owner: OwnerId) -> Option<&OwnerWorkSet> {
        self.owners.get(&owner).map(|record| &record.work)
    }

    pub(crate) fn behaviour(&self, owner: OwnerId) -> Option<Arc<dyn Behaviour>> {
        self.owners
            .get(&owner)?
            .behaviour
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub(crate) fn track_invoke(&mut self, owner: OwnerId, handle: InvokeHandle) {
        if let Some(record) = self.owners.get_mut(&owner) {
            record.work.invokes.insert(handle);
        }
    }

    pub(crate) fn forget_invoke(&mut self, owner: OwnerId, handle: InvokeHandle) {
        if let Some(record) = self.owners.get_mut(&owner) {
            record.work.invokes.remove(&handle);
        }
    }

    pub(crate) fn track_coroutine(&mut self, owner: OwnerId, handle: CoroutineHandle) {
        if let Some(record) = self.owners.get_mut(&owner) {
            record.work.coroutines.insert(handle);
        }
    }

    pub(crate) fn forget_coroutine(&mut self, owner: OwnerId, handle: CoroutineHandle) {
        if let Some(record) = self.owners.get_mut(&owner) {
            record.work.coroutines.remove(&handle);
        }
    }

    /// Freeze the owner's local clock at `now`. Returns `false` if the owner
    /// is unknown or already inactive.
    pub(crate) fn on_owner_deactivated(&mut self, owner: OwnerId, now: f64) -> bool {
        let Some(record) = self.owners.get_mut(&owner) else {
            return false;
        };
        if record.activity != Activity::Active {
            return false;
        }
        record.activity = Activity::Inactive { since: now };
        debug!(%owner, at = now, "owner deactivated");
        true
    }

    /// Resume the owner's local clock and re-arm its queue entries at their
    /// preserved local due times.
    pub(crate) fn on_owner_reactivated(
        &mut self,
        owner: OwnerId,
        now: f64,
        queue: &mut InvocationQueue,
        engine: &CoroutineEngine,
    ) -> bool {
        let Some(record) = self.owners.get_mut(&owner) else {
            return false;
        };
        let Activity::Inactive { since } = record.activity else {
            return false;
        };
        record.paused_total += (now - since).max(0.0);
        record.activity = Activity::Active;

        let entries = record
            .work
            .invokes
            .iter()
            .map(|handle| EntryId::from(*handle))
            .chain(
                record
                    .work
                    .coroutines
                    .iter()
                    .filter_map(|handle| engine.timer_of(*handle)),
            );
        queue.rearm(entries, record.paused_total);
        debug!(%owner, at = now, paused_total = record.paused_total, "owner reactivated");
        true
    }

    /// Cancel everything the owner has pending, release its work set and
    /// refuse further registrations against it.
    pub(crate) fn on_owner_destroyed(
        &mut self,
        owner: OwnerId,
        queue: &mut InvocationQueue,
        engine: &mut CoroutineEngine,
    ) -> Option<PurgeSummary> {
        let record = self.owners.remove(&owner)?;
        self.destroyed.insert(owner);

        let mut summary = PurgeSummary::default();
        for handle in record.work.invokes {
            if queue.cancel(handle.into()) {
                summary.invokes += 1;
            }
        }
        for handle in record.work.coroutines {
            if engine.stop(handle, queue).is_some() {
                summary.coroutines += 1;
            }
        }
        debug!(%owner, invokes = summary.invokes, coroutines = summary.coroutines, "owner destroyed");
        Some(summary)
    }

    /// Ask every collaborator for its current state.
    ///
    /// Dropped or destroyed collaborators yield `Destroyed`; a change in the
    /// reported activity since the previous poll yields `Deactivated` or
    /// `Reactivated`. Owners bound without a collaborator are skipped.
    pub(crate) fn poll(&mut self) -> Vec<OwnerEvent> {
        let mut events = Vec::new();
        for (owner, record) in self.owners.iter_mut() {
            let Some(weak) = &record.behaviour else {
                continue;
            };
            let Some(behaviour) = weak.upgrade() else {
                events.push(OwnerEvent::Destroyed(*owner));
                continue;
            };
            if behaviour.is_destroyed() {
                events.push(OwnerEvent::Destroyed(*owner));
                continue;
            }
            let active = behaviour.is_active();
            if active != record.observed_active {
                record.observed_active = active;
                events.push(if active {
                    OwnerEvent::Reactivated(*owner)
                } else {
                    OwnerEvent::Deactivated(*owner)
                });
            }
        }
        // HashMap order is arbitrary; keep ticks reproducible.
        events.sort_by_key(|event| match event {
            OwnerEvent::Deactivated(owner)
            | OwnerEvent::Reactivated(owner)
            | OwnerEvent::Destroyed(owner) => *owner,
        });
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::BehaviourFlags;
    use crate::queue::Payload;

    const OWNER: OwnerId = OwnerId(1);

    fn bound() -> LifecycleBinder {
        let mut binder = LifecycleBinder::default();
        binder.bind(OWNER, None, true, 0.0);
        binder
    }

    #[test]
    fn local_clock_freezes_while_inactive() {
        let mut binder = bound();
        assert_eq!(binder.local_time(OWNER, 2.0), 2.0);

        assert!(binder.on_owner_deactivated(OWNER, 2.0));
        assert!(!binder.eligible(OWNER));
        assert_eq!(binder.local_time(OWNER, 9.0), 2.0);

        let mut queue = InvocationQueue::default();
        let engine = CoroutineEngine::default();
        assert!(binder.on_owner_reactivated(OWNER, 9.0, &mut queue, &engine));
        assert!(binder.eligible(OWNER));
        assert_eq!(binder.offset(OWNER), 7.0);
        assert_eq!(binder.local_time(OWNER, 10.0), 3.0);
    }

    #[test]
    fn repeated_notifications_are_ignored() {
        let mut binder = bound();
        let mut queue = InvocationQueue::default();
        let engine = CoroutineEngine::default();
        assert!(!binder.on_owner_reactivated(OWNER, 1.0, &mut queue, &engine));
        assert!(binder.on_owner_deactivated(OWNER, 1.0));
        assert!(!binder.on_owner_deactivated(OWNER, 2.0));
        assert_eq!(binder.local_time(OWNER, 5.0), 1.0);
    }

    #[test]
    fn reactivation_rearms_invocations() {
        let mut binder = bound();
        let mut queue = InvocationQueue::default();
        let engine = CoroutineEngine::default();
        let handle = InvokeHandle(7);
        queue.schedule(
            handle.into(),
            OWNER,
            Payload::Invoke {
                name: "x".into(),
                callback: Some(Box::new(|_| {})),
            },
            3.0,
            None,
            0.0,
        );
        binder.track_invoke(OWNER, handle);

        binder.on_owner_deactivated(OWNER, 1.0);
        assert_eq!(queue.pop_due(3.0, |owner| binder.eligible(owner)), None);
        binder.on_owner_reactivated(OWNER, 5.0, &mut queue, &engine);

        assert_eq!(queue.pop_due(6.9, |owner| binder.eligible(owner)), None);
        assert_eq!(
            queue.pop_due(7.0, |owner| binder.eligible(owner)),
            Some(handle.into())
        );
    }

    #[test]
    fn destruction_purges_and_tombstones() {
        let mut binder = bound();
        let mut queue = InvocationQueue::default();
        let mut engine = CoroutineEngine::default();
        let handle = InvokeHandle(3);
        queue.schedule(
            handle.into(),
            OWNER,
            Payload::Invoke {
                name: "x".into(),
                callback: Some(Box::new(|_| {})),
            },
            1.0,
            None,
            0.0,
        );
        binder.track_invoke(OWNER, handle);

        let summary = binder.on_owner_destroyed(OWNER, &mut queue, &mut engine);
        assert_eq!(
            summary,
            Some(PurgeSummary {
                invokes: 1,
                coroutines: 0
            })
        );
        assert!(!queue.contains(handle.into()));
        assert!(matches!(
            binder.check_registration(OWNER),
            Err(SchedulerError::OwnerDestroyed(_))
        ));
        assert!(binder.on_owner_destroyed(OWNER, &mut queue, &mut engine).is_none());
    }

    #[test]
    fn unknown_owner_is_distinguished_from_destroyed() {
        let binder = LifecycleBinder::default();
        assert!(matches!(
            binder.check_registration(OwnerId(42)),
            Err(SchedulerError::UnknownOwner(_))
        ));
    }

    #[test]
    fn poll_reports_edges_only() {
        let flags = Arc::new(BehaviourFlags::new());
        let weak: Weak<dyn Behaviour> = Arc::downgrade(&flags) as Weak<dyn Behaviour>;
        let mut binder = LifecycleBinder::default();
        binder.bind(OWNER, Some(weak), true, 0.0);

        assert!(binder.poll().is_empty());
        flags.set_active(false);
        assert_eq!(binder.poll(), vec![OwnerEvent::Deactivated(OWNER)]);
        assert!(binder.poll().is_empty());
        flags.set_active(true);
        assert_eq!(binder.poll(), vec![OwnerEvent::Reactivated(OWNER)]);
    }

    #[test]
    fn poll_reports_dropped_collaborator_as_destroyed() {
        let flags = Arc::new(BehaviourFlags::new());
        let weak: Weak<dyn Behaviour> = Arc::downgrade(&flags) as Weak<dyn Behaviour>;
        let mut binder = LifecycleBinder::default();
        binder.bind(OWNER, Some(weak), true, 0.0);

        drop(flags);
        assert_eq!(binder.poll(), vec![OwnerEvent::Destroyed(OWNER)]);
    }
}
