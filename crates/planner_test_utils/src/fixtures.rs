//! Test fixtures and helpers.
//!
//! Pre-built configurations and action builders for consistent
//! testing across crates.

use fixed::types::I32F32;
use planner_core::prelude::*;

/// Worker timeline kind in the standard fixture.
pub const WORKER: TimelineKind = TimelineKind(1);
/// Town-hall timeline kind in the standard fixture.
pub const TOWN_HALL: TimelineKind = TimelineKind(2);
/// Barracks timeline kind in the standard fixture.
pub const BARRACKS: TimelineKind = TimelineKind(3);
/// Gold mine site id in the standard fixture.
pub const GOLD_MINE: SiteId = 1;
/// Lumber camp site id in the standard fixture.
pub const LUMBER_CAMP: SiteId = 2;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// A standard configuration: one town hall, `workers` idle workers, a
/// gold mine (10 gold per 5 s cycle, 5 slots) and a lumber camp
/// (10 lumber per 8 s trip plus 2 s walk-back).
#[must_use]
pub fn standard_config(workers: usize) -> BuildOrderConfig {
    let mut initial = vec![TOWN_HALL];
    initial.extend(std::iter::repeat(WORKER).take(workers));
    BuildOrderConfig {
        starting_gold: 0,
        starting_lumber: 0,
        starting_food_cap: 10,
        initial_timelines: initial,
        sites: vec![
            ResourceSite::new(GOLD_MINE, ResourceKind::Gold, 10, secs_to_ticks(fixed(5)), 5),
            ResourceSite::new(LUMBER_CAMP, ResourceKind::Lumber, 10, secs_to_ticks(fixed(8)), 8)
                .with_gap(secs_to_ticks(fixed(2))),
        ],
        hero_limit: 3,
        wait_ceiling: 36_000,
    }
}

/// A worker-movement action sending an idle worker to a site.
#[must_use]
pub fn send_idle_worker(id: ActionId, site: SiteId, travel_secs: f64) -> Action {
    Action::new(
        id,
        format!("worker-{id}-gather"),
        Cost::FREE,
        WORKER,
        ActionKind::WorkerMove {
            source: WorkerSource::Idle,
            task: WorkerTask::Harvest(site),
        },
        Trigger::Immediate,
    )
    .with_travel(secs_to_ticks(fixed_f(travel_secs)))
}

/// A unit production action on the town hall.
#[must_use]
pub fn train_worker(id: ActionId, gold: u32) -> Action {
    Action::new(
        id,
        format!("train-worker-{id}"),
        Cost::new(gold, 0, 1),
        TOWN_HALL,
        ActionKind::BuildUnit {
            spawns: Some(WORKER),
            food_provided: 0,
            hero: false,
        },
        Trigger::GoldAtLeast(gold),
    )
    .with_duration(secs_to_ticks(fixed(15)))
}

/// A structure construction action occupying a worker.
#[must_use]
pub fn build_barracks(id: ActionId, gold: u32, lumber: u32) -> Action {
    Action::new(
        id,
        format!("build-barracks-{id}"),
        Cost::new(gold, lumber, 0),
        WORKER,
        ActionKind::BuildStructure {
            spawns: Some(BARRACKS),
            food_provided: 0,
        },
        Trigger::LumberAtLeast(lumber),
    )
    .with_travel(secs_to_ticks(fixed(2)))
    .with_duration(secs_to_ticks(fixed(50)))
}
