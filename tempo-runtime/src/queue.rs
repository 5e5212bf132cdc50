//! Due-time ordered queue of invocations and coroutine timers.
//!
//! Records store their due time on the owner's local clock. The heap is keyed
//! by global time (`local + offset`, where the offset is the owner's total
//! paused span), so an owner's entries have to be re-armed whenever its
//! offset changes. Re-arming bumps the record's generation and leaves the old
//! heap entries behind to be skipped on pop. Once stale entries make up more
//! than half of the heap it is rebuilt from the live records.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::handle::{CoroutineHandle, InvokeHandle, OwnerId};
use crate::scheduler::Context;

// Below this many stale keys the heap is left alone.
const COMPACT_MIN_STALE: usize = 64;

/// Callable run by an invocation.
pub type Callback = Box<dyn FnMut(&mut Context<'_>) + Send>;

/// Raw key of a queue record. Invocations reuse their handle's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EntryId(pub(crate) u64);

impl From<InvokeHandle> for EntryId {
    fn from(handle: InvokeHandle) -> Self {
        EntryId(handle.0)
    }
}

pub(crate) enum Payload {
    Invoke {
        name: String,
        // Taken out while the callback runs.
        callback: Option<Callback>,
    },
    Resume(CoroutineHandle),
}

/// What `take_job` hands back for a due entry.
pub(crate) enum Job {
    Invoke { owner: OwnerId, callback: Callback },
    Resume(CoroutineHandle),
}

pub(crate) struct ScheduledCall {
    owner: OwnerId,
    payload: Payload,
    first_due: f64,
    interval: Option<f64>,
    periods: u64,
    generation: u64,
}

impl ScheduledCall {
    /// Due time of the current period, on the owner's clock.
    fn due(&self) -> f64 {
        match self.interval {
            Some(interval) => self.first_due + self.periods as f64 * interval,
            None => self.first_due,
        }
    }

    /// Smallest period whose due time lies strictly after `local_now`.
    fn next_period_after(&self, local_now: f64, interval: f64) -> u64 {
        let floor = self.periods + 1;
        let elapsed = ((local_now - self.first_due) / interval).floor();
        let mut period = if elapsed.is_finite() && elapsed >= 0.0 {
            (elapsed as u64 + 1).max(floor)
        } else {
            floor
        };
        while self.first_due + period as f64 * interval <= local_now {
            period += 1;
        }
        while period > floor && self.first_due + (period - 1) as f64 * interval > local_now {
            period -= 1;
        }
        period
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapKey {
    due: f64,
    id: EntryId,
    generation: u64,
}

impl PartialEq for HeapKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapKey {}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapKey {
    // Reversed so `BinaryHeap` pops the earliest due time, then the oldest id.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.id.cmp(&self.id))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

#[derive(Default)]
pub(crate) struct InvocationQueue {
    heap: BinaryHeap<HeapKey>,
    records: HashMap<EntryId, ScheduledCall>,
    // Upper bound on heap keys that no longer match a live record.
    stale: usize,
}

impl InvocationQueue {
    pub(crate) fn schedule(
        &mut self,
        id: EntryId,
        owner: OwnerId,
        payload: Payload,
        first_due: f64,
        interval: Option<f64>,
        offset: f64,
    ) {
        debug_assert!(interval.map_or(true, |i| i > 0.0));
        let call = ScheduledCall {
            owner,
            payload,
            first_due,
            interval,
            periods: 0,
            generation: 0,
        };
        self.heap.push(HeapKey {
            due: first_due + offset,
            id,
            generation: 0,
        });
        self.records.insert(id, call);
    }

    /// Remove a record. Its heap entry becomes stale.
    pub(crate) fn cancel(&mut self, id: EntryId) -> bool {
        if self.records.remove(&id).is_none() {
            return false;
        }
        self.mark_stale(1);
        true
    }

    fn mark_stale(&mut self, count: usize) {
        self.stale += count;
        if self.stale > COMPACT_MIN_STALE && self.stale * 2 > self.heap.len() {
            self.compact();
        }
    }

    /// Rebuild the heap from the keys that still match a live record.
    fn compact(&mut self) {
        let records = &self.records;
        self.heap.retain(|key| {
            records
                .get(&key.id)
                .is_some_and(|call| call.generation == key.generation)
        });
        self.stale = 0;
    }

    pub(crate) fn contains(&self, id: EntryId) -> bool {
        self.records.contains_key(&id)
    }

    pub(crate) fn owner_of(&self, id: EntryId) -> Option<OwnerId> {
        self.records.get(&id).map(|call| call.owner)
    }

    /// Label of an invocation; `None` for unknown ids and coroutine timers.
    pub(crate) fn name_of(&self, id: EntryId) -> Option<&str> {
        match &self.records.get(&id)?.payload {
            Payload::Invoke { name, .. } => Some(name.as_str()),
            Payload::Resume(_) => None,
        }
    }

    /// Due time of the record's current period on the owner's clock.
    pub(crate) fn due_of(&self, id: EntryId) -> Option<f64> {
        self.records.get(&id).map(ScheduledCall::due)
    }

    /// Number of pending invocations, coroutine timers excluded.
    pub(crate) fn invocation_count(&self) -> usize {
        self.records
            .values()
            .filter(|call| matches!(call.payload, Payload::Invoke { .. }))
            .count()
    }

    /// Pop the next entry due at or before `now` whose owner is eligible.
    ///
    /// Due entries of ineligible owners lose their heap entry but keep their
    /// record; they come back through `rearm`.
    pub(crate) fn pop_due(
        &mut self,
        now: f64,
        eligible: impl Fn(OwnerId) -> bool,
    ) -> Option<EntryId> {
        while let Some(top) = self.heap.peek() {
            if top.due > now {
                return None;
            }
            let key = *top;
            self.heap.pop();

            let Some(call) = self.records.get(&key.id) else {
                self.stale = self.stale.saturating_sub(1);
                continue;
            };
            if call.generation != key.generation {
                self.stale = self.stale.saturating_sub(1);
                continue;
            }
            if !eligible(call.owner) {
                continue;
            }
            return Some(key.id);
        }
        None
    }

    /// Take the work out of a popped entry.
    ///
    /// Coroutine timers are removed outright. Invocations keep their record
    /// until `finish` decides between requeueing and removal.
    pub(crate) fn take_job(&mut self, id: EntryId) -> Option<Job> {
        let call = self.records.get_mut(&id)?;
        match &mut call.payload {
            Payload::Resume(coroutine) => {
                let coroutine = *coroutine;
                self.records.remove(&id);
                Some(Job::Resume(coroutine))
            }
            Payload::Invoke { callback, .. } => {
                let callback = callback.take()?;
                Some(Job::Invoke {
                    owner: call.owner,
                    callback,
                })
            }
        }
    }

    /// Settle an invocation after its callback ran.
    ///
    /// Repeating records are pushed to their next period after `local_now`
    /// and keep the callback; one-shots are removed. Returns `true` when the
    /// record is still pending.
    pub(crate) fn finish(
        &mut self,
        id: EntryId,
        callback: Callback,
        local_now: f64,
        offset: f64,
    ) -> bool {
        let Some(call) = self.records.get_mut(&id) else {
            return false;
        };
        let Some(interval) = call.interval else {
            self.records.remove(&id);
            return false;
        };

        call.periods = call.next_period_after(local_now, interval);
        if let Payload::Invoke { callback: slot, .. } = &mut call.payload {
            *slot = Some(callback);
        }
        self.heap.push(HeapKey {
            due: call.due() + offset,
            id,
            generation: call.generation,
        });
        true
    }

    /// Re-key records after their owner's offset changed.
    pub(crate) fn rearm(&mut self, ids: impl IntoIterator<Item = EntryId>, offset: f64) {
        let mut replaced = 0;
        for id in ids {
            let Some(call) = self.records.get_mut(&id) else {
                continue;
            };
            call.generation += 1;
            self.heap.push(HeapKey {
                due: call.due() + offset,
                id,
                generation: call.generation,
            });
            replaced += 1;
        }
        if replaced > 0 {
            self.mark_stale(replaced);
        }
    }

    #[cfg(test)]
    pub(crate) fn heap_len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const OWNER: OwnerId = OwnerId(1);

    fn invoke(name: &str) -> Payload {
        Payload::Invoke {
            name: name.to_string(),
            callback: Some(Box::new(|_| {})),
        }
    }

    fn drain(queue: &mut InvocationQueue, now: f64) -> Vec<EntryId> {
        let mut out = Vec::new();
        while let Some(id) = queue.pop_due(now, |_| true) {
            if let Some(Job::Invoke { callback, .. }) = queue.take_job(id) {
                queue.finish(id, callback, now, 0.0);
            }
            out.push(id);
        }
        out
    }

    #[test]
    fn pops_in_due_order_then_registration_order() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("c"), 3.0, None, 0.0);
        queue.schedule(EntryId(2), OWNER, invoke("a"), 1.0, None, 0.0);
        queue.schedule(EntryId(3), OWNER, invoke("b"), 2.0, None, 0.0);
        queue.schedule(EntryId(4), OWNER, invoke("b2"), 2.0, None, 0.0);

        assert_eq!(
            drain(&mut queue, 3.0),
            vec![EntryId(2), EntryId(3), EntryId(4), EntryId(1)]
        );
        assert_eq!(queue.invocation_count(), 0);
    }

    #[test]
    fn entries_not_yet_due_stay_queued() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("later"), 5.0, None, 0.0);
        assert!(drain(&mut queue, 4.999).is_empty());
        assert_eq!(drain(&mut queue, 5.0), vec![EntryId(1)]);
    }

    #[test]
    fn cancelled_entry_is_skipped() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("x"), 1.0, None, 0.0);
        assert!(queue.cancel(EntryId(1)));
        assert!(!queue.cancel(EntryId(1)));
        assert!(drain(&mut queue, 1.0).is_empty());
    }

    #[test]
    fn repeating_entry_advances_from_anchor() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("tick"), 1.0, Some(0.5), 0.0);
        drain(&mut queue, 1.0);
        assert_eq!(queue.due_of(EntryId(1)), Some(1.5));
        drain(&mut queue, 1.5);
        assert_eq!(queue.due_of(EntryId(1)), Some(2.0));
    }

    #[test]
    fn late_tick_fires_once_and_skips_missed_periods() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("tick"), 1.0, Some(1.0), 0.0);
        assert_eq!(drain(&mut queue, 5.5), vec![EntryId(1)]);
        assert_eq!(queue.due_of(EntryId(1)), Some(6.0));
    }

    #[test]
    fn late_tick_landing_on_boundary_moves_past_it() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("tick"), 1.0, Some(1.0), 0.0);
        assert_eq!(drain(&mut queue, 5.0), vec![EntryId(1)]);
        assert_eq!(queue.due_of(EntryId(1)), Some(6.0));
    }

    #[test]
    fn ineligible_owner_entries_are_held_until_rearmed() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("held"), 1.0, None, 0.0);
        assert_eq!(queue.pop_due(2.0, |_| false), None);
        assert_eq!(queue.heap_len(), 0);
        assert!(queue.contains(EntryId(1)));

        queue.rearm([EntryId(1)], 3.0);
        assert_eq!(queue.pop_due(3.5, |_| true), None);
        assert_eq!(queue.pop_due(4.0, |_| true), Some(EntryId(1)));
    }

    #[test]
    fn rearm_invalidates_older_heap_entries() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("x"), 1.0, None, 0.0);
        queue.rearm([EntryId(1)], 2.0);
        assert_eq!(queue.pop_due(1.0, |_| true), None);
        assert_eq!(queue.pop_due(3.0, |_| true), Some(EntryId(1)));
    }

    #[test]
    fn cancelled_far_future_entries_do_not_pile_up() {
        let mut queue = InvocationQueue::default();
        for id in 0..10_000 {
            queue.schedule(EntryId(id), OWNER, invoke("later"), 1_000.0, None, 0.0);
            assert!(queue.cancel(EntryId(id)));
            assert!(queue.heap_len() <= 2 * COMPACT_MIN_STALE);
        }
        assert_eq!(queue.invocation_count(), 0);
    }

    #[test]
    fn compaction_keeps_live_entries_in_order() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(0), OWNER, invoke("keep-late"), 900.0, None, 0.0);
        queue.schedule(EntryId(1), OWNER, invoke("keep-early"), 10.0, None, 0.0);
        for id in 2..1_000 {
            queue.schedule(EntryId(id), OWNER, invoke("drop"), 500.0, None, 0.0);
            queue.cancel(EntryId(id));
        }
        assert!(queue.heap_len() < 200);
        assert_eq!(drain(&mut queue, 1_000.0), vec![EntryId(1), EntryId(0)]);
    }

    #[test]
    fn repeated_rearm_keeps_heap_bounded() {
        let mut queue = InvocationQueue::default();
        queue.schedule(EntryId(1), OWNER, invoke("paused"), 5.0, Some(1.0), 0.0);
        for pause in 1..=1_000 {
            queue.rearm([EntryId(1)], pause as f64);
            assert!(queue.heap_len() <= 2 * COMPACT_MIN_STALE);
        }
        assert_eq!(queue.pop_due(1_004.9, |_| true), None);
        assert_eq!(queue.pop_due(1_005.0, |_| true), Some(EntryId(1)));
    }

    #[test]
    fn resume_entries_are_not_invocations() {
        let mut queue = InvocationQueue::default();
        queue.schedule(
            EntryId(9),
            OWNER,
            Payload::Resume(CoroutineHandle(4)),
            1.0,
            None,
            0.0,
        );
        assert_eq!(queue.invocation_count(), 0);
        assert_eq!(queue.name_of(EntryId(9)), None);
        let id = queue.pop_due(1.0, |_| true);
        assert!(matches!(
            id.and_then(|id| queue.take_job(id)),
            Some(Job::Resume(CoroutineHandle(4)))
        ));
        assert!(!queue.contains(EntryId(9)));
    }

    #[test]
    fn finish_restores_callback_for_repeats() {
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let mut queue = InvocationQueue::default();
        queue.schedule(
            EntryId(1),
            OWNER,
            Payload::Invoke {
                name: "count".into(),
                callback: Some(Box::new(move |_| *counter.lock().unwrap() += 1)),
            },
            0.0,
            Some(1.0),
            0.0,
        );
        assert_eq!(queue.pop_due(0.0, |_| true), Some(EntryId(1)));
        let Some(Job::Invoke { callback, owner }) = queue.take_job(EntryId(1)) else {
            panic!("expected an invocation");
        };
        assert_eq!(owner, OWNER);
        assert!(queue.finish(EntryId(1), callback, 0.0, 0.0));
        assert!(matches!(queue.take_job(EntryId(1)), Some(Job::Invoke { .. })));
        assert_eq!(*hits.lock().unwrap(), 0);
    }
}
