//! The event scheduler: a time-indexed registry of pending events.
//!
//! Events are bucketed by scheduled tick in a sorted map and executed
//! one simulated tick at a time, in registration order. Execution is
//! resumable: a tick that was stopped partway (to inject new events, a
//! scenario that occurs naturally when schedules are recomputed) picks
//! up after the last executed event instead of re-firing side effects.
//! Reversal walks the executed prefix backwards applying inverse
//! effects, and detaches anything a reversed event spawned.
//!
//! Conceptually every tick moves through `not-yet-executed → executing
//! → fully-executed` and symmetrically back through reversal; the
//! `exec_time`/`exec_index` pair is the concrete encoding of that state
//! machine.
//!
//! Recurrence chains are kept in an arena keyed by event id plus an
//! `origin → latest` map, so "newest occurrence of this event" is an
//! O(1) lookup and undoing a recurrence pops the latest id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{PlannerError, Result};
use crate::event::{Effect, Event, EventId, GroupId};
use crate::event_group::EventGroup;
use crate::time::{Fixed, SimTime};

/// Applies one effect against the domain state.
///
/// This is the seam between the generic scheduler and the build-order
/// world: the sink interprets effects (mutating banks, pools and sites)
/// and may call back into the scheduler to register, unregister or
/// reschedule events mid-tick. Sinks must not call `execute_events` or
/// `reverse_events` re-entrantly.
pub trait EffectSink {
    /// Apply a single effect at the given tick.
    ///
    /// Reversal passes the inverse effect; the sink does not need to
    /// know which direction it is applying.
    fn apply_effect(
        &mut self,
        now: SimTime,
        effect: &Effect,
        scheduler: &mut EventHandler,
    ) -> Result<()>;
}

/// Time-indexed registry and driver of pending events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventHandler {
    /// Arena of all registered events, executed ones included (they are
    /// kept for reversal until explicitly unregistered).
    events: HashMap<EventId, Event>,
    /// Event ids bucketed by scheduled tick, in registration order.
    buckets: BTreeMap<SimTime, Vec<EventId>>,
    /// Registered event groups.
    groups: HashMap<GroupId, EventGroup>,
    /// Chain origin id to its newest occurrence.
    latest: HashMap<EventId, EventId>,
    /// Event to the successor its execution spawned (recurrence undo).
    successor: HashMap<EventId, EventId>,
    /// Occurrence to its predecessor in the chain.
    predecessor: HashMap<EventId, EventId>,
    /// Group-trigger event to the group occurrence its execution spawned.
    spawned_group: HashMap<EventId, GroupId>,
    /// Next event id to allocate. Never reused, never rolled back.
    next_event_id: EventId,
    /// Next group id to allocate.
    next_group_id: GroupId,
    /// The tick execution has most recently begun.
    exec_time: Option<SimTime>,
    /// Number of events executed at `exec_time`.
    exec_index: usize,
}

impl EventHandler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
            buckets: BTreeMap::new(),
            groups: HashMap::new(),
            latest: HashMap::new(),
            successor: HashMap::new(),
            predecessor: HashMap::new(),
            spawned_group: HashMap::new(),
            next_event_id: 1,
            next_group_id: 1,
            exec_time: None,
            exec_index: 0,
        }
    }

    /// Allocate a fresh event id.
    pub fn allocate_id(&mut self) -> EventId {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    /// Allocate a fresh group id.
    pub fn allocate_group_id(&mut self) -> GroupId {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    /// Look up an event by id.
    #[must_use]
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    /// Look up a group by id.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&EventGroup> {
        self.groups.get(&id)
    }

    /// Newest occurrence of a recurrence chain.
    #[must_use]
    pub fn latest_occurrence(&self, origin: EventId) -> Option<EventId> {
        self.latest.get(&origin).copied()
    }

    /// Number of events currently registered (executed ones included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Insert an event into its tick bucket, appended at the end
    /// (stable order), and record it as the newest of its chain.
    pub fn register_event(&mut self, event: Event) {
        self.latest.insert(event.origin(), event.id());
        self.buckets.entry(event.tick()).or_default().push(event.id());
        self.events.insert(event.id(), event);
    }

    /// Register an ordered set of events as a group.
    ///
    /// Members must be in temporal order; the gap is the exact time
    /// between the last member of one occurrence and the first member
    /// of the next (zero disables recurrence).
    pub fn register_group(&mut self, mut events: Vec<Event>, gap: Fixed) -> Result<GroupId> {
        for pair in events.windows(2) {
            if pair[1].true_time() < pair[0].true_time() {
                return Err(PlannerError::InvalidState(
                    "group members must be in temporal order".into(),
                ));
            }
        }
        let group_id = self.allocate_group_id();
        let ids: Vec<EventId> = events.iter().map(Event::id).collect();
        let group = EventGroup::new(group_id, ids, gap)?;
        for event in &mut events {
            event.set_group(Some(group_id));
        }
        for event in events {
            self.register_event(event);
        }
        self.groups.insert(group_id, group);
        Ok(group_id)
    }

    /// Execute all events pending at tick `t`, in registration order.
    ///
    /// A fully executed tick is a true no-op. A partially executed tick
    /// resumes immediately after the last executed event, so revisiting
    /// a tick never double-fires side effects. Events appended to this
    /// tick's bucket *during* execution (by the sink, or by a rescale
    /// that lands an event on the current tick) still run before the
    /// tick is considered complete. Each recurring event that fires
    /// registers its successor immediately; the last member of a
    /// recurring group firing recurs the whole group.
    pub fn execute_events<S: EffectSink>(&mut self, t: SimTime, sink: &mut S) -> Result<()> {
        match self.exec_time {
            Some(done) if done > t => return Ok(()),
            Some(done) if done == t => {}
            _ => {
                self.exec_time = Some(t);
                self.exec_index = 0;
            }
        }

        loop {
            let id = {
                let Some(bucket) = self.buckets.get(&t) else { break };
                match bucket.get(self.exec_index) {
                    Some(&id) => id,
                    None => break,
                }
            };
            let Some(event) = self.events.get(&id).cloned() else {
                tracing::warn!(event = id, tick = t, "stale id in bucket, skipping");
                self.exec_index += 1;
                continue;
            };
            if matches!(event.effect(), Effect::Noop) {
                tracing::debug!(event = id, tick = t, "event has no effect to execute");
            }
            sink.apply_effect(t, event.effect(), self)?;

            // The sink may have unregistered events in this bucket;
            // re-locate the executed event instead of trusting the index.
            if let Some(pos) = self
                .buckets
                .get(&t)
                .and_then(|b| b.iter().position(|&e| e == id))
            {
                self.exec_index = pos + 1;
            }

            if event.is_recurring() {
                self.spawn_successor(&event)?;
            }
            if let Some(group_id) = event.group() {
                let triggers_recurrence = self
                    .groups
                    .get(&group_id)
                    .is_some_and(|g| g.is_recurring() && g.last() == Some(id));
                if triggers_recurrence {
                    self.spawn_group_successor(group_id, id)?;
                }
            }
        }
        Ok(())
    }

    /// Execute every tick in `[start, end]`, inclusive.
    pub fn execute_events_in_range<S: EffectSink>(
        &mut self,
        start: SimTime,
        end: SimTime,
        sink: &mut S,
    ) -> Result<()> {
        for t in start..=end {
            self.execute_events(t, sink)?;
        }
        Ok(())
    }

    /// Reverse the events executed at tick `t`, newest first.
    ///
    /// Each reversed event has its inverse effect applied; successors
    /// (and group occurrences) spawned by a reversed execution are
    /// detached and unregistered so forward execution cannot
    /// double-produce them. Afterwards the tick's bookkeeping is reset,
    /// so a later `execute_events(t)` starts fresh. Reversal must
    /// proceed from the newest executed tick backwards.
    pub fn reverse_events<S: EffectSink>(&mut self, t: SimTime, sink: &mut S) -> Result<()> {
        let executed = match self.exec_time {
            Some(done) if done > t => self.buckets.get(&t).map_or(0, Vec::len),
            Some(done) if done == t => self.exec_index,
            _ => 0,
        };
        if executed == 0 {
            // Nothing to undo here. Collapse the bookkeeping onto `t`
            // only if execution had reached this tick or beyond.
            if matches!(self.exec_time, Some(done) if done >= t) {
                self.exec_time = Some(t);
                self.exec_index = 0;
            }
            return Ok(());
        }

        let mut remaining = executed;
        while remaining > 0 {
            remaining -= 1;
            let id = {
                let Some(bucket) = self.buckets.get(&t) else { break };
                match bucket.get(remaining) {
                    Some(&id) => id,
                    None => continue,
                }
            };
            let Some(event) = self.events.get(&id).cloned() else {
                tracing::warn!(event = id, tick = t, "stale id in bucket during reversal");
                continue;
            };
            if matches!(event.effect(), Effect::Noop) {
                tracing::debug!(event = id, tick = t, "event has no effect to reverse");
            }
            sink.apply_effect(t, &event.effect().inverse(), self)?;

            // Undo a recurrence this execution spawned.
            if let Some(next) = self.successor.remove(&id) {
                self.predecessor.remove(&next);
                self.remove_registered(next);
                self.latest.insert(event.origin(), id);
            }
            // Undo a group occurrence this execution spawned.
            if let Some(group_id) = self.spawned_group.remove(&id) {
                self.unregister_spawned_group(group_id);
            }
        }

        self.exec_time = Some(t);
        self.exec_index = 0;
        Ok(())
    }

    /// Remove and return the event with the given id from tick `t`.
    ///
    /// A miss is logged and returns `None`; callers performing
    /// idempotent cleanup must not be punished for it.
    pub fn unregister_event(&mut self, t: SimTime, id: EventId) -> Option<Event> {
        let bucket = self.buckets.get_mut(&t)?;
        let Some(pos) = bucket.iter().position(|&e| e == id) else {
            tracing::debug!(event = id, tick = t, "unregister: event not found");
            return None;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&t);
        }
        let event = self.events.remove(&id);
        if event.is_none() {
            tracing::debug!(event = id, tick = t, "unregister: event missing from arena");
        }
        if let Some(ref ev) = event {
            self.prune_group_record(ev);
        }
        event
    }

    /// Cancel the newest still-pending occurrence of a recurrence chain.
    ///
    /// Used when the activity a chain models stops (a worker re-tasked
    /// away from a resource site). Returns the cancelled id, or `None`
    /// if the chain has no pending occurrence.
    pub fn cancel_chain(&mut self, origin: EventId) -> Option<EventId> {
        let newest = self.latest_occurrence(origin)?;
        if !self.is_pending(newest) {
            tracing::debug!(origin, newest, "cancel: no pending occurrence");
            return None;
        }
        self.remove_registered(newest);
        match self.predecessor.remove(&newest) {
            Some(prev) => {
                self.successor.remove(&prev);
                self.latest.insert(origin, prev);
            }
            None => {
                self.latest.remove(&origin);
            }
        }
        Some(newest)
    }

    /// Move a pending event to a new exact time and period.
    ///
    /// The proportional resource-site rescaling goes through here: the
    /// shared credit event keeps its identity and chain but shifts to
    /// the rescaled schedule.
    pub fn reschedule(&mut self, id: EventId, true_time: Fixed, period: Fixed) -> Result<()> {
        if !self.is_pending(id) {
            return Err(PlannerError::InvalidState(format!(
                "cannot reschedule event {} (not pending)",
                id
            )));
        }
        let Some(mut event) = self.events.remove(&id) else {
            return Err(PlannerError::EventNotFound { event: id });
        };
        self.remove_from_bucket(event.tick(), id);
        event.retime(true_time, period);
        self.buckets.entry(event.tick()).or_default().push(id);
        self.events.insert(id, event);
        Ok(())
    }

    /// Delay a group's members from the given event onwards.
    ///
    /// Members strictly before `from` keep their schedule; `from` and
    /// every member after it shift later by the same exact amount. All
    /// affected members must still be pending.
    pub fn delay_group_from(&mut self, group_id: GroupId, from: EventId, by: Fixed) -> Result<()> {
        let group = self
            .groups
            .get(&group_id)
            .ok_or(PlannerError::GroupNotFound { group: group_id })?;
        let tail: Vec<EventId> = group
            .remaining_events(from)
            .ok_or(PlannerError::EventNotFound { event: from })?
            .to_vec();
        for id in &tail {
            if !self.is_pending(*id) {
                return Err(PlannerError::InvalidState(format!(
                    "cannot delay executed group member {}",
                    id
                )));
            }
        }
        for id in tail {
            let Some(mut event) = self.events.remove(&id) else {
                return Err(PlannerError::EventNotFound { event: id });
            };
            self.remove_from_bucket(event.tick(), id);
            event.shift(by);
            self.buckets.entry(event.tick()).or_default().push(id);
            self.events.insert(id, event);
        }
        Ok(())
    }

    /// Whether an event is registered and not yet executed.
    #[must_use]
    pub fn is_pending(&self, id: EventId) -> bool {
        let Some(event) = self.events.get(&id) else {
            return false;
        };
        let Some(bucket) = self.buckets.get(&event.tick()) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|&e| e == id) else {
            return false;
        };
        match self.exec_time {
            Some(done) if done > event.tick() => false,
            Some(done) if done == event.tick() => pos >= self.exec_index,
            _ => true,
        }
    }

    /// Spawn and register the successor of a recurring event.
    fn spawn_successor(&mut self, event: &Event) -> Result<()> {
        let new_id = self.allocate_id();
        let next = event.recur(new_id)?;
        self.successor.insert(event.id(), new_id);
        self.predecessor.insert(new_id, event.id());
        self.register_event(next);
        Ok(())
    }

    /// Spawn and register the next occurrence of a recurring group.
    fn spawn_group_successor(&mut self, group_id: GroupId, trigger: EventId) -> Result<()> {
        let group = self
            .groups
            .get(&group_id)
            .cloned()
            .ok_or(PlannerError::GroupNotFound { group: group_id })?;
        let new_group_id = self.allocate_group_id();
        let new_ids: Vec<EventId> = (0..group.len()).map(|_| self.allocate_id()).collect();
        let (successor, spawned) = group.recur(new_group_id, &new_ids, &self.events)?;
        for (&old_member, event) in group.events().iter().zip(spawned) {
            self.predecessor.insert(event.id(), old_member);
            self.register_event(event);
        }
        self.groups.insert(new_group_id, successor);
        self.spawned_group.insert(trigger, new_group_id);
        Ok(())
    }

    /// Unregister every member of a spawned group occurrence and restore
    /// the member chains to their predecessors.
    fn unregister_spawned_group(&mut self, group_id: GroupId) {
        let Some(group) = self.groups.remove(&group_id) else {
            tracing::warn!(group = group_id, "spawned group record missing");
            return;
        };
        for &member in group.events() {
            let origin = self.events.get(&member).map(Event::origin);
            if let Some(prev) = self.predecessor.remove(&member) {
                if let Some(origin) = origin {
                    self.latest.insert(origin, prev);
                }
            }
            self.remove_registered(member);
        }
    }

    /// Remove an event from both the arena and its bucket.
    fn remove_registered(&mut self, id: EventId) {
        match self.events.remove(&id) {
            Some(event) => {
                self.remove_from_bucket(event.tick(), id);
                self.prune_group_record(&event);
            }
            None => tracing::debug!(event = id, "remove: event not registered"),
        }
    }

    /// Remove an id from the bucket at the given tick, if present.
    fn remove_from_bucket(&mut self, tick: SimTime, id: EventId) {
        if let Some(bucket) = self.buckets.get_mut(&tick) {
            if let Some(pos) = bucket.iter().position(|&e| e == id) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.buckets.remove(&tick);
            }
        }
    }

    /// Drop a group record once none of its members remain registered.
    fn prune_group_record(&mut self, event: &Event) {
        if let Some(group_id) = event.group() {
            let any_left = self
                .groups
                .get(&group_id)
                .is_some_and(|g| g.events().iter().any(|id| self.events.contains_key(id)));
            if !any_left {
                self.groups.remove(&group_id);
            }
        }
    }
}
