//! # Planner Core
//!
//! Deterministic build-order simulation core for real-time strategy
//! planning.
//!
//! Given an ordered list of player intents (build a unit, construct a
//! structure, re-task a worker), the engine computes the exact timing
//! of every resulting resource change and production output. This
//! crate contains **only** deterministic logic:
//! - No rendering
//! - No IO (callers consume serde documents)
//! - No system randomness
//! - No floating-point math (exact times use fixed-point)
//!
//! This separation enables:
//! - Reproducible plans (same inputs always produce the same timeline)
//! - Replay of saved build documents
//! - Headless analysis tooling
//!
//! ## Crate Structure
//!
//! - [`time`] - Tick quantum and exact-time rounding
//! - [`event`] - Schedulable events and reversible effects
//! - [`event_group`] - Bundles of events that delay and recur together
//! - [`event_handler`] - The resumable, reversible scheduler
//! - [`timeline`] - Non-overlapping action queues per facility
//! - [`action`] - Player intents and their triggers
//! - [`resources`] - The bank and shared resource sites
//! - [`build_order`] - The orchestrator
//! - [`snapshot`] - Serializable output documents

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod action;
pub mod build_order;
pub mod error;
pub mod event;
pub mod event_group;
pub mod event_handler;
pub mod resources;
pub mod snapshot;
pub mod time;
pub mod timeline;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::action::{Action, ActionId, ActionKind, ActionRecord, Cost, Trigger, WorkerSource};
    pub use crate::build_order::{BuildOrder, BuildOrderConfig};
    pub use crate::error::{PlannerError, Result};
    pub use crate::event::{Effect, Event, EventId};
    pub use crate::event_handler::{EffectSink, EventHandler};
    pub use crate::resources::{ResourceBank, ResourceKind, ResourceSite, SiteId};
    pub use crate::snapshot::{BuildDoc, BuildSnapshot};
    pub use crate::time::{secs_to_ticks, Fixed, SimTime, TICKS_PER_SECOND};
    pub use crate::timeline::{Timeline, TimelineId, TimelineKind, WorkerTask};
}
