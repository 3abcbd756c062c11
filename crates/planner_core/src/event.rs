//! Schedulable events and their effect descriptors.
//!
//! An event is a unit of work placed on the simulated clock. Instead of
//! opaque callbacks, every event carries an [`Effect`]: a closed tagged
//! union of state changes, each with a statically paired inverse. This
//! makes reversal correct by construction - undoing an event applies
//! [`Effect::inverse`], and the pairing is checked in tests rather than
//! left to caller discipline.
//!
//! Events schedule at an integer tick but remember their exact ("true")
//! time and the rounding error between the two. Recurrence always
//! advances the true time by the true period and re-rounds, so the
//! scheduled tick never drifts more than half a tick from the
//! mathematically exact schedule.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::resources::SiteId;
use crate::time::{fixed_serde, round_ticks, Fixed, SimTime, ONE_TICK};
use crate::timeline::TimelineKind;

/// Unique identifier for events. Monotonically increasing, never reused.
pub type EventId = u64;

/// Unique identifier for event groups.
pub type GroupId = u64;

/// The state change an event performs when executed.
///
/// Every variant has an exact inverse so that reversing an executed
/// event restores the state it touched. The interpreter lives with the
/// orchestrator; the scheduler itself never looks inside an effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// No observable state change. Executing or reversing it is logged,
    /// not an error.
    Noop,
    /// Add gold to the bank.
    CreditGold {
        /// Amount credited.
        amount: u32,
    },
    /// Remove gold from the bank.
    DebitGold {
        /// Amount debited.
        amount: u32,
    },
    /// Add lumber to the bank.
    CreditLumber {
        /// Amount credited.
        amount: u32,
    },
    /// Remove lumber from the bank.
    DebitLumber {
        /// Amount debited.
        amount: u32,
    },
    /// Raise the food cap (e.g. a farm finishing construction).
    RaiseFoodCap {
        /// Capacity added.
        amount: u32,
    },
    /// Lower the food cap.
    LowerFoodCap {
        /// Capacity removed.
        amount: u32,
    },
    /// Occupy food supply (a unit entering production).
    ConsumeFood {
        /// Food consumed.
        amount: u32,
    },
    /// Release food supply.
    ReleaseFood {
        /// Food released.
        amount: u32,
    },
    /// Create a new inactive timeline (production finished).
    SpawnTimeline {
        /// Kind of timeline to create.
        kind: TimelineKind,
    },
    /// Remove the most recently spawned timeline of a kind.
    DespawnTimeline {
        /// Kind of timeline to remove.
        kind: TimelineKind,
    },
    /// A worker arrives at a resource site and starts gathering.
    JoinSite {
        /// The site being joined.
        site: SiteId,
    },
    /// A worker stops gathering at a resource site.
    LeaveSite {
        /// The site being left.
        site: SiteId,
    },
}

impl Effect {
    /// The statically paired inverse of this effect.
    ///
    /// `e.inverse().inverse() == e` for every effect.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match *self {
            Self::Noop => Self::Noop,
            Self::CreditGold { amount } => Self::DebitGold { amount },
            Self::DebitGold { amount } => Self::CreditGold { amount },
            Self::CreditLumber { amount } => Self::DebitLumber { amount },
            Self::DebitLumber { amount } => Self::CreditLumber { amount },
            Self::RaiseFoodCap { amount } => Self::LowerFoodCap { amount },
            Self::LowerFoodCap { amount } => Self::RaiseFoodCap { amount },
            Self::ConsumeFood { amount } => Self::ReleaseFood { amount },
            Self::ReleaseFood { amount } => Self::ConsumeFood { amount },
            Self::SpawnTimeline { kind } => Self::DespawnTimeline { kind },
            Self::DespawnTimeline { kind } => Self::SpawnTimeline { kind },
            Self::JoinSite { site } => Self::LeaveSite { site },
            Self::LeaveSite { site } => Self::JoinSite { site },
        }
    }
}

/// The shortest recurrence period a recurring event may carry: one tick.
///
/// Shorter periods would let a successor round back into the tick that
/// spawned it and spin the scheduler.
pub const MIN_PERIOD: Fixed = ONE_TICK;

/// A schedulable unit of work.
///
/// The scheduled `tick` is always the rounded true time; the invariant
/// `|tick − true_time| ≤ 0.5` holds at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id, allocated by the scheduler.
    id: EventId,
    /// The state change performed on execution.
    effect: Effect,
    /// Scheduled tick (rounded from the true time).
    tick: SimTime,
    /// Exact time in ticks.
    #[serde(with = "fixed_serde")]
    true_time: Fixed,
    /// `tick − true_time`, retained so repeated rounding never biases
    /// the schedule.
    #[serde(with = "fixed_serde")]
    error: Fixed,
    /// Exact recurrence period in ticks. Zero means one-shot.
    #[serde(with = "fixed_serde")]
    period: Fixed,
    /// First event of this event's recurrence chain (itself, if first).
    origin: EventId,
    /// Owning event group, if any.
    group: Option<GroupId>,
}

impl Event {
    /// Create a one-shot event at the given exact time.
    #[must_use]
    pub fn once(id: EventId, effect: Effect, true_time: Fixed) -> Self {
        let rounded = round_ticks(true_time);
        Self {
            id,
            effect,
            tick: rounded.tick,
            true_time,
            error: rounded.error,
            period: Fixed::ZERO,
            origin: id,
            group: None,
        }
    }

    /// Create a recurring event at the given exact time.
    ///
    /// The period must be at least [`MIN_PERIOD`].
    pub fn recurring(id: EventId, effect: Effect, true_time: Fixed, period: Fixed) -> Result<Self> {
        if period < MIN_PERIOD {
            return Err(PlannerError::PeriodTooShort {
                period: period.to_string(),
            });
        }
        let mut event = Self::once(id, effect, true_time);
        event.period = period;
        Ok(event)
    }

    /// Unique event id.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// The effect performed on execution.
    #[must_use]
    pub const fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Scheduled tick.
    #[must_use]
    pub const fn tick(&self) -> SimTime {
        self.tick
    }

    /// Exact (unrounded) time in ticks.
    #[must_use]
    pub const fn true_time(&self) -> Fixed {
        self.true_time
    }

    /// Current rounding error, `tick − true_time`.
    #[must_use]
    pub const fn rounding_error(&self) -> Fixed {
        self.error
    }

    /// Exact recurrence period; zero for one-shot events.
    #[must_use]
    pub const fn period(&self) -> Fixed {
        self.period
    }

    /// Whether this event recurs after executing.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.period > Fixed::ZERO
    }

    /// First event of this event's recurrence chain.
    #[must_use]
    pub const fn origin(&self) -> EventId {
        self.origin
    }

    /// Owning event group, if any.
    #[must_use]
    pub const fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Create the next occurrence of this event.
    ///
    /// The successor's true time is this event's true time plus the true
    /// period, re-rounded; the rounding error is carried on the value so
    /// it never accumulates. Fails on a non-recurring event.
    pub fn recur(&self, new_id: EventId) -> Result<Self> {
        if !self.is_recurring() {
            return Err(PlannerError::NotRecurring { event: self.id });
        }
        let true_time = self.true_time + self.period;
        let rounded = round_ticks(true_time);
        Ok(Self {
            id: new_id,
            effect: self.effect.clone(),
            tick: rounded.tick,
            true_time,
            error: rounded.error,
            period: self.period,
            origin: self.origin,
            group: None,
        })
    }

    /// Shift this event later by an exact amount, re-rounding.
    pub(crate) fn shift(&mut self, by: Fixed) {
        debug_assert!(by >= Fixed::ZERO, "shifting an event earlier: {}", by);
        self.retime(self.true_time + by, self.period);
    }

    /// Replace this event's exact time and period, re-rounding.
    pub(crate) fn retime(&mut self, true_time: Fixed, period: Fixed) {
        let rounded = round_ticks(true_time);
        self.tick = rounded.tick;
        self.true_time = true_time;
        self.error = rounded.error;
        self.period = period;
    }

    /// Impose a recurrence period (used by the group mechanism).
    pub(crate) fn set_period(&mut self, period: Fixed) {
        self.period = period;
    }

    /// Assign the owning group.
    pub(crate) fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
    }
}
