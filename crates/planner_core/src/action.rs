//! Player intents: actions, their kinds, and their triggers.
//!
//! An action is one entry of the submitted build order: build a unit,
//! construct a structure, re-task a worker. Kinds are a closed tagged
//! union; serialization is plain tag dispatch, with no runtime type
//! lookup by name.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::event::EventId;
use crate::resources::SiteId;
use crate::time::{fixed_serde, option_fixed_serde, round_ticks, secs_to_ticks, Fixed, SimTime};
use crate::timeline::{TimelineKind, WorkerTask};

/// Caller-supplied action identifier.
pub type ActionId = u32;

/// Resource cost of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Gold cost.
    pub gold: u32,
    /// Lumber cost.
    pub lumber: u32,
    /// Food (supply) cost.
    pub food: u32,
}

impl Cost {
    /// A zero cost.
    pub const FREE: Self = Self {
        gold: 0,
        lumber: 0,
        food: 0,
    };

    /// Create a new cost.
    #[must_use]
    pub const fn new(gold: u32, lumber: u32, food: u32) -> Self {
        Self { gold, lumber, food }
    }
}

/// How a worker-movement action selects its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerSource {
    /// Any idle worker, oldest first.
    Idle,
    /// A worker currently gathering at the given site.
    OnSite(SiteId),
    /// The worker most recently produced.
    MostRecentlyProduced,
}

/// Precondition gating when a submitted action may begin.
///
/// The engine advances simulated time until the condition holds (and
/// the action's own cost is affordable) before resolving a start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trigger {
    /// Start as soon as a timeline is available.
    #[default]
    Immediate,
    /// Wait until the bank holds at least this much gold.
    GoldAtLeast(u32),
    /// Wait until the bank holds at least this much lumber.
    LumberAtLeast(u32),
    /// Wait until at least this much food headroom exists.
    FoodHeadroom(u32),
    /// Wait until the next timeline of this kind completes production.
    WorkerReady(TimelineKind),
    /// Wait until another action reaches a completion percentage.
    ///
    /// Not implemented: resolving this trigger is an explicit
    /// `Unsupported` error rather than inferred behavior.
    PercentComplete {
        /// The watched action.
        action: ActionId,
        /// Completion percentage (0-100).
        percent: u32,
    },
}

/// The kind-specific payload of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Produce a unit on a production timeline.
    BuildUnit {
        /// Timeline kind spawned when production completes (workers
        /// spawn worker timelines; army units spawn nothing).
        spawns: Option<TimelineKind>,
        /// Food capacity this unit provides once complete.
        food_provided: u32,
        /// Whether this unit is a hero.
        hero: bool,
    },
    /// Construct a structure.
    BuildStructure {
        /// Timeline kind spawned when construction completes.
        spawns: Option<TimelineKind>,
        /// Food capacity this structure provides once complete.
        food_provided: u32,
    },
    /// Research an upgrade. Not implemented: dispatch is an explicit
    /// `Unsupported` error.
    BuildUpgrade,
    /// Buy an item. Not implemented: dispatch is an explicit
    /// `Unsupported` error.
    Shop,
    /// Re-task a worker.
    WorkerMove {
        /// How to select the worker.
        source: WorkerSource,
        /// The task to assign.
        task: WorkerTask,
    },
}

/// A unit of player intent with resolved scheduling state.
///
/// `start` is set exactly once, at the moment the engine commits to a
/// schedule; an action with `start` unset has not consumed resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Caller-supplied identifier.
    pub id: ActionId,
    /// Display name.
    pub name: String,
    /// Resource cost, paid when the start time is committed.
    pub cost: Cost,
    /// Exact travel time in ticks before the action's effect begins.
    #[serde(with = "fixed_serde")]
    pub travel: Fixed,
    /// Exact duration in ticks; `None` runs indefinitely.
    #[serde(with = "option_fixed_serde")]
    pub duration: Option<Fixed>,
    /// Kind of timeline this action occupies.
    pub timeline: TimelineKind,
    /// Kind-specific payload.
    pub kind: ActionKind,
    /// Precondition for starting.
    pub trigger: Trigger,
    /// Whether a later action may cut this one short (indefinite tasks).
    pub interruptable: bool,
    /// Hidden from user-facing output (engine-internal bookkeeping).
    pub invisible: bool,
    /// Resolved start tick; unset until the engine commits.
    start: Option<SimTime>,
    /// Events this action scheduled (chain origin ids).
    events: Vec<EventId>,
}

impl Action {
    /// Create an unscheduled action.
    #[must_use]
    pub fn new(
        id: ActionId,
        name: impl Into<String>,
        cost: Cost,
        timeline: TimelineKind,
        kind: ActionKind,
        trigger: Trigger,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            cost,
            travel: Fixed::ZERO,
            duration: None,
            timeline,
            kind,
            trigger,
            interruptable: false,
            invisible: false,
            start: None,
            events: Vec::new(),
        }
    }

    /// Set the exact travel time.
    #[must_use]
    pub fn with_travel(mut self, travel: Fixed) -> Self {
        self.travel = travel;
        self
    }

    /// Set the exact duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Fixed) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Resolved start tick, if committed.
    #[must_use]
    pub const fn start(&self) -> Option<SimTime> {
        self.start
    }

    /// Commit the start tick. Fails if already committed.
    pub fn set_start(&mut self, start: SimTime) -> Result<()> {
        if self.start.is_some() {
            return Err(PlannerError::StartAlreadySet { action: self.id });
        }
        self.start = Some(start);
        Ok(())
    }

    /// Ticks this action occupies its timeline: travel plus duration,
    /// rounded. `None` for indefinite actions.
    #[must_use]
    pub fn occupancy(&self) -> Option<SimTime> {
        self.duration
            .map(|duration| round_ticks(self.travel + duration).tick)
    }

    /// Tick at which this action's timeline window ends.
    ///
    /// `None` if unscheduled or indefinite.
    #[must_use]
    pub fn end(&self) -> Option<SimTime> {
        Some(self.start? + self.occupancy()?)
    }

    /// Chain origin ids of the events this action scheduled.
    #[must_use]
    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    /// Record an event scheduled for this action.
    pub fn push_event(&mut self, id: EventId) {
        self.events.push(id);
    }

    /// Bare action for timeline tests.
    #[cfg(test)]
    pub(crate) fn test_stub(id: ActionId, timeline: TimelineKind) -> Self {
        Self::new(
            id,
            format!("action-{id}"),
            Cost::FREE,
            timeline,
            ActionKind::BuildUnit {
                spawns: None,
                food_provided: 0,
                hero: false,
            },
            Trigger::Immediate,
        )
    }
}

fn default_fixed() -> Fixed {
    Fixed::ZERO
}

/// The JSON-serializable submission form of an action.
///
/// This is what the external shell hands to the engine: costs, trigger
/// and kind payload, with travel and duration expressed in seconds.
/// After a run the record can carry the resolved start tick as an
/// annotation; replaying a document ignores the annotation and
/// recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Caller-supplied identifier.
    pub id: ActionId,
    /// Display name.
    pub name: String,
    /// Gold cost.
    #[serde(default)]
    pub gold: u32,
    /// Lumber cost.
    #[serde(default)]
    pub lumber: u32,
    /// Food cost.
    #[serde(default)]
    pub food: u32,
    /// Travel time in seconds (exact fixed-point).
    #[serde(default = "default_fixed", with = "fixed_serde")]
    pub travel_secs: Fixed,
    /// Duration in seconds; `None` runs indefinitely.
    #[serde(default, with = "option_fixed_serde")]
    pub duration_secs: Option<Fixed>,
    /// Kind of timeline this action occupies.
    pub timeline: TimelineKind,
    /// Kind-specific payload.
    pub kind: ActionKind,
    /// Precondition for starting.
    #[serde(default)]
    pub trigger: Trigger,
    /// Whether a later action may cut this one short.
    #[serde(default)]
    pub interruptable: bool,
    /// Hidden from user-facing output.
    #[serde(default)]
    pub invisible: bool,
    /// Resolved start tick from a previous run, if annotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_tick: Option<SimTime>,
}

impl ActionRecord {
    /// Convert this record into a fresh, unscheduled action.
    #[must_use]
    pub fn to_action(&self) -> Action {
        let mut action = Action::new(
            self.id,
            self.name.clone(),
            Cost::new(self.gold, self.lumber, self.food),
            self.timeline,
            self.kind,
            self.trigger,
        );
        action.travel = secs_to_ticks(self.travel_secs);
        action.duration = self.duration_secs.map(secs_to_ticks);
        action.interruptable = self.interruptable;
        action.invisible = self.invisible;
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_action() -> Action {
        Action::new(
            1,
            "Footman",
            Cost::new(135, 0, 2),
            TimelineKind(2),
            ActionKind::BuildUnit {
                spawns: None,
                food_provided: 0,
                hero: false,
            },
            Trigger::GoldAtLeast(135),
        )
        .with_duration(secs_to_ticks(Fixed::from_num(20)))
    }

    #[test]
    fn test_start_is_set_once() {
        let mut action = unit_action();
        assert_eq!(action.start(), None);
        action.set_start(42).unwrap();
        assert_eq!(action.start(), Some(42));
        assert!(matches!(
            action.set_start(50),
            Err(PlannerError::StartAlreadySet { action: 1 })
        ));
        assert_eq!(action.start(), Some(42));
    }

    #[test]
    fn test_occupancy_includes_travel() {
        let mut action = unit_action().with_travel(secs_to_ticks(Fixed::from_num(1.2)));
        action.set_start(10).unwrap();
        // 12 ticks travel + 200 ticks duration.
        assert_eq!(action.occupancy(), Some(212));
        assert_eq!(action.end(), Some(222));
    }

    #[test]
    fn test_indefinite_action_has_no_end() {
        let mut action = unit_action();
        action.duration = None;
        action.set_start(5).unwrap();
        assert_eq!(action.occupancy(), None);
        assert_eq!(action.end(), None);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = ActionRecord {
            id: 7,
            name: "Peasant".into(),
            gold: 75,
            lumber: 0,
            food: 1,
            travel_secs: Fixed::ZERO,
            duration_secs: Some(Fixed::from_num(15)),
            timeline: TimelineKind(1),
            kind: ActionKind::BuildUnit {
                spawns: Some(TimelineKind(5)),
                food_provided: 0,
                hero: false,
            },
            trigger: Trigger::GoldAtLeast(75),
            interruptable: false,
            invisible: false,
            start_tick: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ActionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_to_action_converts_seconds() {
        let record = ActionRecord {
            id: 7,
            name: "Peasant".into(),
            gold: 75,
            lumber: 0,
            food: 1,
            travel_secs: Fixed::from_num(0.5),
            duration_secs: Some(Fixed::from_num(15)),
            timeline: TimelineKind(1),
            kind: ActionKind::Shop,
            trigger: Trigger::Immediate,
            interruptable: false,
            invisible: false,
            start_tick: Some(99),
        };
        let action = record.to_action();
        assert_eq!(action.travel, Fixed::from_num(5));
        assert_eq!(action.duration, Some(Fixed::from_num(150)));
        // Annotations never leak into a fresh action.
        assert_eq!(action.start(), None);
    }
}
