//! Ordered bundles of events that delay and recur as a unit.
//!
//! A group ties events together temporally: travel-then-gather pairs,
//! for example, must keep their relative spacing when delayed and must
//! be rescheduled together when the cycle repeats. Only the *last*
//! member of a group firing causes the whole group to recur; individual
//! members never self-recur outside the group mechanism.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PlannerError, Result};
use crate::event::{Event, EventId, GroupId, MIN_PERIOD};
use crate::time::{fixed_serde, Fixed};

/// An ordered sequence of events that must delay and recur together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventGroup {
    /// Unique group id.
    id: GroupId,
    /// Member event ids, in temporal order.
    events: Vec<EventId>,
    /// Exact time between the last event of one occurrence and the
    /// first event of the next. Zero means non-recurring.
    #[serde(with = "fixed_serde")]
    gap: Fixed,
    /// First occurrence of this group's recurrence chain.
    origin: GroupId,
}

impl EventGroup {
    /// Create a group over the given member ids.
    ///
    /// Members must already be in temporal order; the gap must be
    /// non-negative (zero disables recurrence).
    pub fn new(id: GroupId, events: Vec<EventId>, gap: Fixed) -> Result<Self> {
        if events.is_empty() {
            return Err(PlannerError::InvalidState(
                "event group must have at least one member".into(),
            ));
        }
        if gap < Fixed::ZERO {
            return Err(PlannerError::InvalidState(format!(
                "event group gap must be non-negative, got {}",
                gap
            )));
        }
        Ok(Self {
            id,
            events,
            gap,
            origin: id,
        })
    }

    /// Unique group id.
    #[must_use]
    pub const fn id(&self) -> GroupId {
        self.id
    }

    /// Member event ids in temporal order.
    #[must_use]
    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    /// Number of member events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the group has no members (never true for a constructed group).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The recurrence gap.
    #[must_use]
    pub const fn gap(&self) -> Fixed {
        self.gap
    }

    /// Whether the group recurs after its last member executes.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.gap > Fixed::ZERO
    }

    /// First occurrence of this group's recurrence chain.
    #[must_use]
    pub const fn origin(&self) -> GroupId {
        self.origin
    }

    /// The last member, the one whose execution triggers recurrence.
    #[must_use]
    pub fn last(&self) -> Option<EventId> {
        self.events.last().copied()
    }

    /// The suffix of the member order starting at the given event.
    ///
    /// Delaying one member delays exactly the members at and after it,
    /// so this is the set a delay applies to. `None` if the event is
    /// not a member.
    #[must_use]
    pub fn remaining_events(&self, event: EventId) -> Option<&[EventId]> {
        let pos = self.events.iter().position(|&e| e == event)?;
        Some(&self.events[pos..])
    }

    /// Build the next occurrence of this group.
    ///
    /// Requires exactly one replacement id per member and a positive
    /// recurrence gap. The group period is `(last.true − first.true) +
    /// gap`; it is imposed on each member one at a time to derive its
    /// successor, and successor periods are reset to zero so members
    /// never self-recur. On any failure nothing is mutated and no
    /// result is produced.
    ///
    /// Returns the successor group and its member events, ready for
    /// registration.
    pub fn recur(
        &self,
        new_group: GroupId,
        new_ids: &[EventId],
        arena: &HashMap<EventId, Event>,
    ) -> Result<(Self, Vec<Event>)> {
        if !self.is_recurring() {
            return Err(PlannerError::GroupNotRecurring { group: self.id });
        }
        if new_ids.len() != self.events.len() {
            return Err(PlannerError::GroupIdCountMismatch {
                expected: self.events.len(),
                got: new_ids.len(),
            });
        }
        let first = self.member(self.events[0], arena)?;
        let last = self.member(*self.events.last().expect("group is non-empty"), arena)?;
        let period = (last.true_time() - first.true_time()) + self.gap;
        if period < MIN_PERIOD {
            return Err(PlannerError::PeriodTooShort {
                period: period.to_string(),
            });
        }

        let mut spawned = Vec::with_capacity(self.events.len());
        for (&member_id, &new_id) in self.events.iter().zip(new_ids) {
            let mut member = self.member(member_id, arena)?.clone();
            member.set_period(period);
            let mut next = member.recur(new_id)?;
            next.set_period(Fixed::ZERO);
            next.set_group(Some(new_group));
            spawned.push(next);
        }

        let successor = Self {
            id: new_group,
            events: new_ids.to_vec(),
            gap: self.gap,
            origin: self.origin,
        };
        Ok((successor, spawned))
    }

    fn member<'a>(&self, id: EventId, arena: &'a HashMap<EventId, Event>) -> Result<&'a Event> {
        arena
            .get(&id)
            .ok_or(PlannerError::EventNotFound { event: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Effect;
    use crate::time::tick_to_fixed;

    fn arena_with(events: &[Event]) -> HashMap<EventId, Event> {
        events.iter().map(|e| (e.id(), e.clone())).collect()
    }

    fn pair(gap: Fixed) -> (EventGroup, HashMap<EventId, Event>) {
        let travel = Event::once(1, Effect::Noop, tick_to_fixed(10));
        let credit = Event::once(2, Effect::CreditLumber { amount: 10 }, tick_to_fixed(30));
        let group = EventGroup::new(100, vec![1, 2], gap).unwrap();
        (group, arena_with(&[travel, credit]))
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(EventGroup::new(1, vec![], Fixed::ZERO).is_err());
    }

    #[test]
    fn test_zero_gap_means_non_recurring() {
        let (group, arena) = pair(Fixed::ZERO);
        assert!(!group.is_recurring());
        assert!(matches!(
            group.recur(101, &[3, 4], &arena),
            Err(PlannerError::GroupNotRecurring { group: 100 })
        ));
    }

    #[test]
    fn test_recur_rejects_mismatched_ids() {
        let (group, arena) = pair(Fixed::from_num(5));
        let result = group.recur(101, &[3], &arena);
        assert!(matches!(
            result,
            Err(PlannerError::GroupIdCountMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_recur_spaces_next_occurrence_by_period() {
        let (group, arena) = pair(Fixed::from_num(5));
        let (successor, spawned) = group.recur(101, &[3, 4], &arena).unwrap();

        // Period = (30 − 10) + 5 = 25 ticks.
        assert_eq!(successor.events(), &[3, 4]);
        assert_eq!(successor.origin(), 100);
        assert_eq!(spawned[0].tick(), 35);
        assert_eq!(spawned[1].tick(), 55);
        // Members of the new occurrence never self-recur.
        assert!(spawned.iter().all(|e| !e.is_recurring()));
        assert!(spawned.iter().all(|e| e.group() == Some(101)));
        // Chains link member-wise.
        assert_eq!(spawned[0].origin(), 1);
        assert_eq!(spawned[1].origin(), 2);
    }

    #[test]
    fn test_remaining_events_is_order_suffix() {
        let (group, _) = pair(Fixed::from_num(5));
        assert_eq!(group.remaining_events(1), Some(&[1, 2][..]));
        assert_eq!(group.remaining_events(2), Some(&[2][..]));
        assert_eq!(group.remaining_events(99), None);
    }
}
