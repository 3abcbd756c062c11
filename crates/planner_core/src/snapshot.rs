//! Serializable views of a simulated build order.
//!
//! Two JSON documents form the engine's output boundary: a
//! [`BuildSnapshot`] of every timeline with resolved start ticks plus
//! the final bank state, and a [`BuildDoc`] holding the configuration
//! and the ordered action records annotated with their resolved timing.
//! A document saved after a run can be reloaded and re-simulated to a
//! byte-identical snapshot.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionRecord};
use crate::build_order::{BuildOrder, BuildOrderConfig};
use crate::error::{PlannerError, Result};
use crate::resources::ResourceBank;
use crate::time::SimTime;
use crate::timeline::{Timeline, TimelineId};

/// Document format version for compatibility checks.
pub const DOC_VERSION: u32 = 1;

/// One scheduled action as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    /// Caller-supplied action id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Resolved start tick.
    pub start: SimTime,
    /// Tick the action's window ends; `None` runs indefinitely.
    pub end: Option<SimTime>,
}

/// One timeline with its resolved schedule.
///
/// Engine-internal (invisible) actions are omitted; they are
/// bookkeeping, not part of the plan the caller asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    /// The timeline's identity.
    pub id: TimelineId,
    /// Scheduled actions in start order.
    pub actions: Vec<ActionSnapshot>,
}

impl TimelineSnapshot {
    fn capture(timeline: &Timeline) -> Self {
        let actions = timeline
            .actions()
            .iter()
            .filter(|a| !a.invisible)
            .filter_map(|a| {
                Some(ActionSnapshot {
                    id: a.id,
                    name: a.name.clone(),
                    start: a.start()?,
                    end: a.end(),
                })
            })
            .collect();
        Self {
            id: timeline.id(),
            actions,
        }
    }
}

/// Full output snapshot: every timeline plus the final bank state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSnapshot {
    /// Tick at which the snapshot was taken.
    pub time: SimTime,
    /// Final resource bank state.
    pub bank: ResourceBank,
    /// All timelines in creation order.
    pub timelines: Vec<TimelineSnapshot>,
}

impl BuildSnapshot {
    /// Capture the current state of a simulation.
    #[must_use]
    pub fn capture(order: &BuildOrder) -> Self {
        Self {
            time: order.now(),
            bank: *order.bank(),
            timelines: order
                .pool()
                .timelines()
                .iter()
                .map(TimelineSnapshot::capture)
                .collect(),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlannerError::Serialization(e.to_string()))
    }
}

/// A complete, replayable build order: configuration plus the ordered
/// action records, optionally annotated with resolved start ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDoc {
    /// Document format version.
    pub version: u32,
    /// Domain parameters the order runs against.
    pub config: BuildOrderConfig,
    /// Ordered action records.
    pub actions: Vec<ActionRecord>,
}

impl BuildDoc {
    /// Create a document from a configuration and action records.
    #[must_use]
    pub fn new(config: BuildOrderConfig, actions: Vec<ActionRecord>) -> Self {
        Self {
            version: DOC_VERSION,
            config,
            actions,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlannerError::Serialization(e.to_string()))
    }

    /// Deserialize from a JSON string, checking the format version.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Self =
            serde_json::from_str(json).map_err(|e| PlannerError::Serialization(e.to_string()))?;
        if doc.version != DOC_VERSION {
            return Err(PlannerError::InvalidState(format!(
                "document version mismatch: expected {}, got {}",
                DOC_VERSION, doc.version
            )));
        }
        Ok(doc)
    }

    /// Simulate this document from scratch.
    ///
    /// Start-tick annotations from a previous run are ignored; every
    /// action is re-resolved. Returns the finished simulation.
    pub fn replay(&self) -> Result<BuildOrder> {
        let mut order = BuildOrder::new(self.config.clone());
        let actions: Vec<Action> = self.actions.iter().map(ActionRecord::to_action).collect();
        order.run(actions)?;
        Ok(order)
    }

    /// Copy resolved start ticks from a finished simulation onto the
    /// action records.
    pub fn annotate(&mut self, order: &BuildOrder) {
        for record in &mut self.actions {
            record.start_tick = order.resolved_start(record.id);
        }
    }
}
