//! Timelines: ordered, non-overlapping action queues.
//!
//! Each timeline models one production or resource facility (a town
//! hall, a barracks, a single worker). Actions on a timeline never
//! overlap: for every adjacent pair, the earlier action's window ends
//! at or before the later one starts.
//!
//! This is a planning structure, not a live history. Inserting an
//! action in front of existing ones discards everything after the
//! insertion point - later actions were scheduled assuming a different
//! future and must be recomputed by the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::action::Action;
use crate::resources::SiteId;
use crate::time::SimTime;

/// Kind of timeline: one entry per facility type in the domain data
/// (town hall, barracks, worker, ...). The engine treats kinds as
/// opaque configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineKind(pub u32);

impl TimelineKind {
    /// Create a new timeline kind.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Identity of a timeline: its kind plus a per-kind index in spawn
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId {
    /// The timeline's kind.
    pub kind: TimelineKind,
    /// Spawn index within the kind, starting at 0.
    pub index: u32,
}

/// What a worker timeline is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerTask {
    /// Waiting for orders.
    #[default]
    Idle,
    /// Gathering at a resource site.
    Harvest(SiteId),
}

/// Errors from timeline insertion. Local and recoverable: the caller
/// may log and retry with a later start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineError {
    /// The action's window overlaps its predecessor.
    Overlap {
        /// Tick at which the predecessor's window ends.
        predecessor_end: SimTime,
    },
    /// The predecessor runs indefinitely and cannot be interrupted.
    Blocked,
    /// The action has no resolved start time.
    StartUnset,
}

impl std::fmt::Display for TimelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overlap { predecessor_end } => {
                write!(f, "window overlaps predecessor ending at {}", predecessor_end)
            }
            Self::Blocked => write!(f, "predecessor runs indefinitely"),
            Self::StartUnset => write!(f, "action has no resolved start time"),
        }
    }
}

impl std::error::Error for TimelineError {}

/// An ordered, non-overlapping sequence of scheduled actions for one
/// facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// This timeline's identity.
    id: TimelineId,
    /// Scheduled actions, sorted by start tick.
    actions: Vec<Action>,
    /// Current task (meaningful for worker timelines).
    task: WorkerTask,
}

impl Timeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new(id: TimelineId) -> Self {
        Self {
            id,
            actions: Vec::new(),
            task: WorkerTask::Idle,
        }
    }

    /// This timeline's identity.
    #[must_use]
    pub const fn id(&self) -> TimelineId {
        self.id
    }

    /// The scheduled actions, sorted by start tick.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Whether this timeline has received any action yet.
    ///
    /// Timelines begin inactive and are promoted to active by their
    /// first action.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Current worker task.
    #[must_use]
    pub const fn task(&self) -> WorkerTask {
        self.task
    }

    /// Update the worker task.
    pub fn set_task(&mut self, task: WorkerTask) {
        self.task = task;
    }

    /// Insert an action at its sorted position.
    ///
    /// Fails if the action's window overlaps the action immediately
    /// preceding the insertion point. On success every action *after*
    /// the insertion point is discarded (they assumed a different
    /// future); the number discarded is returned.
    pub fn add_action(&mut self, action: Action) -> Result<usize, TimelineError> {
        let Some(start) = action.start() else {
            return Err(TimelineError::StartUnset);
        };
        let pos = self
            .actions
            .iter()
            .position(|a| a.start().is_some_and(|s| s > start))
            .unwrap_or(self.actions.len());

        if pos > 0 {
            let prev = &self.actions[pos - 1];
            match prev.end() {
                Some(end) if end > start => {
                    return Err(TimelineError::Overlap {
                        predecessor_end: end,
                    })
                }
                Some(_) => {}
                None if prev.interruptable => {}
                None => return Err(TimelineError::Blocked),
            }
        }

        let discarded = self.actions.len() - pos;
        self.actions.truncate(pos);
        self.actions.push(action);
        Ok(discarded)
    }

    /// The earliest tick at or after `desired` where an action could
    /// start without violating the no-overlap invariant.
    ///
    /// Does not mutate the timeline. `None` if the preceding action
    /// runs indefinitely and cannot be interrupted.
    #[must_use]
    pub fn next_possible_start(&self, desired: SimTime) -> Option<SimTime> {
        let Some(prev) = self
            .actions
            .iter()
            .rev()
            .find(|a| a.start().is_some_and(|s| s <= desired))
        else {
            return Some(desired);
        };
        match prev.end() {
            Some(end) => Some(desired.max(end)),
            None if prev.interruptable => Some(desired),
            None => None,
        }
    }

    /// The action starting exactly at `t`, if any.
    #[must_use]
    pub fn current_action(&self, t: SimTime) -> Option<&Action> {
        self.actions.iter().find(|a| a.start() == Some(t))
    }

    /// The last action starting strictly before `t`.
    ///
    /// An action starting exactly at `t` is not its own predecessor.
    #[must_use]
    pub fn prev_action(&self, t: SimTime) -> Option<&Action> {
        self.actions
            .iter()
            .rev()
            .find(|a| a.start().is_some_and(|s| s < t))
    }

    /// The action at `t`, or failing that its strict predecessor.
    ///
    /// This finds the action whose associated events must be touched
    /// when mid-flight state changes at `t`.
    #[must_use]
    pub fn current_or_prev_action(&self, t: SimTime) -> Option<&Action> {
        self.current_action(t).or_else(|| self.prev_action(t))
    }

    /// The most recent action at or before `t`, mutably.
    pub fn current_or_prev_action_mut(&mut self, t: SimTime) -> Option<&mut Action> {
        self.actions
            .iter_mut()
            .rev()
            .find(|a| a.start().is_some_and(|s| s <= t))
    }
}

/// The set of all timelines, active and inactive.
///
/// Spawn counts per kind double as spawn indices and as the completion
/// counters worker-ready triggers wait on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelinePool {
    /// All timelines, in creation order.
    timelines: Vec<Timeline>,
    /// Number of timelines ever spawned, per kind.
    counts: HashMap<u32, u32>,
}

impl TimelinePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new (inactive) timeline of the given kind.
    pub fn spawn(&mut self, kind: TimelineKind) -> TimelineId {
        let count = self.counts.entry(kind.0).or_insert(0);
        let id = TimelineId {
            kind,
            index: *count,
        };
        *count += 1;
        self.timelines.push(Timeline::new(id));
        id
    }

    /// Remove the most recently spawned timeline of a kind.
    ///
    /// Only meaningful as the inverse of a spawn during reversal; a
    /// timeline that already received actions is logged.
    pub fn despawn_latest(&mut self, kind: TimelineKind) -> Option<TimelineId> {
        let pos = self
            .timelines
            .iter()
            .rposition(|tl| tl.id().kind == kind)?;
        let timeline = self.timelines.remove(pos);
        if timeline.is_active() {
            tracing::warn!(
                kind = kind.0,
                index = timeline.id().index,
                "despawning a timeline that already has actions"
            );
        }
        if let Some(count) = self.counts.get_mut(&kind.0) {
            *count = count.saturating_sub(1);
        }
        Some(timeline.id())
    }

    /// Number of timelines of a kind ever spawned.
    #[must_use]
    pub fn spawned(&self, kind: TimelineKind) -> u32 {
        self.counts.get(&kind.0).copied().unwrap_or(0)
    }

    /// All timelines in creation order.
    #[must_use]
    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    /// Timeline at a raw pool position.
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<&Timeline> {
        self.timelines.get(pos)
    }

    /// Timeline at a raw pool position, mutably.
    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Timeline> {
        self.timelines.get_mut(pos)
    }

    /// Pool positions of all timelines of a kind, in creation order.
    pub fn positions_of_kind(&self, kind: TimelineKind) -> impl Iterator<Item = usize> + '_ {
        self.timelines
            .iter()
            .enumerate()
            .filter(move |(_, tl)| tl.id().kind == kind)
            .map(|(pos, _)| pos)
    }

    /// Pool position of the most recently spawned timeline of a kind.
    #[must_use]
    pub fn most_recent_of_kind(&self, kind: TimelineKind) -> Option<usize> {
        self.timelines.iter().rposition(|tl| tl.id().kind == kind)
    }
}
