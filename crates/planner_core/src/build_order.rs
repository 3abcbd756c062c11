//! The build-order orchestrator.
//!
//! Owns the resource bank, the timeline pool, the resource sites and
//! the event scheduler, and drives the simulation forward in response
//! to each submitted action: resolve the trigger by advancing simulated
//! time, find the timeline with the earliest feasible slot, commit the
//! start, pay the cost, and register the events that later mutate the
//! bank or spawn new timelines.
//!
//! Execution is single-threaded and deterministic. All waiting is
//! expressed as advancing simulated time one tick at a time, bounded by
//! a configurable ceiling so that an unsatisfiable condition fails the
//! action instead of looping forever.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::{Action, ActionId, ActionKind, Cost, Trigger, WorkerSource};
use crate::error::{PlannerError, Result};
use crate::event::{Effect, Event, EventId};
use crate::event_handler::{EffectSink, EventHandler};
use crate::resources::{rescaled_schedule, ResourceBank, ResourceKind, ResourceSite, SiteId};
use crate::time::{tick_to_fixed, SimTime};
use crate::timeline::{TimelineKind, TimelinePool, WorkerTask};

/// Domain parameters for a simulation run.
///
/// Game balance lives here as data; the engine's behavior does not
/// depend on any particular set of numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOrderConfig {
    /// Gold at simulation start.
    pub starting_gold: u32,
    /// Lumber at simulation start.
    pub starting_lumber: u32,
    /// Food capacity at simulation start.
    pub starting_food_cap: u32,
    /// Timelines that exist at simulation start (initial workers and
    /// production facilities).
    pub initial_timelines: Vec<TimelineKind>,
    /// Resource sites available to workers.
    pub sites: Vec<ResourceSite>,
    /// Most heroes a build order may produce.
    pub hero_limit: u32,
    /// Longest a trigger or timeline wait may advance the clock before
    /// the action is failed.
    pub wait_ceiling: SimTime,
}

impl Default for BuildOrderConfig {
    fn default() -> Self {
        Self {
            starting_gold: 0,
            starting_lumber: 0,
            starting_food_cap: 0,
            initial_timelines: Vec::new(),
            sites: Vec::new(),
            hero_limit: 3,
            // One simulated hour.
            wait_ceiling: 36_000,
        }
    }
}

/// The domain state events apply against: bank, timelines, sites and
/// the hero counter. Kept separate from the scheduler so the two can be
/// borrowed independently while a tick executes.
#[derive(Debug)]
struct World {
    bank: ResourceBank,
    pool: TimelinePool,
    sites: BTreeMap<SiteId, ResourceSite>,
    heroes: u32,
}

impl EffectSink for World {
    fn apply_effect(
        &mut self,
        now: SimTime,
        effect: &Effect,
        scheduler: &mut EventHandler,
    ) -> Result<()> {
        match *effect {
            Effect::Noop => tracing::trace!(tick = now, "no-op effect"),
            Effect::CreditGold { amount } => self.bank.credit_gold(amount),
            Effect::DebitGold { amount } => self.bank.debit_gold(amount),
            Effect::CreditLumber { amount } => self.bank.credit_lumber(amount),
            Effect::DebitLumber { amount } => self.bank.debit_lumber(amount),
            Effect::RaiseFoodCap { amount } => self.bank.raise_food_cap(amount),
            Effect::LowerFoodCap { amount } => self.bank.lower_food_cap(amount),
            Effect::ConsumeFood { amount } => self.bank.consume_food(amount),
            Effect::ReleaseFood { amount } => self.bank.release_food(amount),
            Effect::SpawnTimeline { kind } => {
                self.pool.spawn(kind);
            }
            Effect::DespawnTimeline { kind } => {
                self.pool.despawn_latest(kind);
            }
            Effect::JoinSite { site } => self.join_site(now, site, scheduler)?,
            Effect::LeaveSite { site } => self.leave_site(now, site, scheduler)?,
        }
        Ok(())
    }
}

impl World {
    /// A worker arrives at a site.
    ///
    /// The first worker at a gold site registers the shared recurring
    /// credit event; every further worker rescales its remaining time
    /// and period by `old / new`, preserving worker-seconds progress.
    fn join_site(
        &mut self,
        now: SimTime,
        site_id: SiteId,
        scheduler: &mut EventHandler,
    ) -> Result<()> {
        let site = self
            .sites
            .get_mut(&site_id)
            .ok_or(PlannerError::SiteNotFound { site: site_id })?;
        if !site.has_capacity() {
            tracing::warn!(site = site_id, "site at capacity, join has no effect");
            return Ok(());
        }
        let before = site.add_worker();
        if site.resource != ResourceKind::Gold {
            return Ok(());
        }
        if before == 0 {
            let id = scheduler.allocate_id();
            let event = Event::recurring(
                id,
                Effect::CreditGold {
                    amount: site.payout,
                },
                tick_to_fixed(now) + site.period,
                site.period,
            )?;
            scheduler.register_event(event);
            site.set_credit_event(Some(id));
        } else {
            let origin = site.credit_event().ok_or_else(|| {
                PlannerError::InvalidState(format!(
                    "site {site_id} has workers but no credit event"
                ))
            })?;
            let newest = scheduler
                .latest_occurrence(origin)
                .ok_or(PlannerError::EventNotFound { event: origin })?;
            let event = scheduler
                .event(newest)
                .ok_or(PlannerError::EventNotFound { event: newest })?;
            let (true_time, period) =
                rescaled_schedule(now, event.true_time(), event.period(), before, before + 1);
            scheduler.reschedule(newest, true_time, period)?;
        }
        Ok(())
    }

    /// A worker stops gathering at a site.
    ///
    /// The last worker leaving a gold site cancels the credit event
    /// outright: no worker-seconds persist across an empty period.
    fn leave_site(
        &mut self,
        now: SimTime,
        site_id: SiteId,
        scheduler: &mut EventHandler,
    ) -> Result<()> {
        let site = self
            .sites
            .get_mut(&site_id)
            .ok_or(PlannerError::SiteNotFound { site: site_id })?;
        let before = site.remove_worker();
        if before == 0 || site.resource != ResourceKind::Gold {
            return Ok(());
        }
        if before == 1 {
            if let Some(origin) = site.credit_event() {
                scheduler.cancel_chain(origin);
            }
            site.set_credit_event(None);
        } else {
            let origin = site.credit_event().ok_or_else(|| {
                PlannerError::InvalidState(format!(
                    "site {site_id} has workers but no credit event"
                ))
            })?;
            let newest = scheduler
                .latest_occurrence(origin)
                .ok_or(PlannerError::EventNotFound { event: origin })?;
            let event = scheduler
                .event(newest)
                .ok_or(PlannerError::EventNotFound { event: newest })?;
            let (true_time, period) =
                rescaled_schedule(now, event.true_time(), event.period(), before, before - 1);
            scheduler.reschedule(newest, true_time, period)?;
        }
        Ok(())
    }
}

/// The build-order simulation: submit actions in order, read back the
/// scheduled timelines and final resources.
#[derive(Debug)]
pub struct BuildOrder {
    config: BuildOrderConfig,
    world: World,
    scheduler: EventHandler,
    now: SimTime,
}

impl BuildOrder {
    /// Create a simulation from domain parameters.
    #[must_use]
    pub fn new(config: BuildOrderConfig) -> Self {
        let mut pool = TimelinePool::new();
        for &kind in &config.initial_timelines {
            pool.spawn(kind);
        }
        let sites = config.sites.iter().map(|s| (s.id, s.clone())).collect();
        let bank = ResourceBank::new(
            config.starting_gold,
            config.starting_lumber,
            config.starting_food_cap,
        );
        Self {
            world: World {
                bank,
                pool,
                sites,
                heroes: 0,
            },
            scheduler: EventHandler::new(),
            now: 0,
            config,
        }
    }

    /// Current simulated tick.
    #[must_use]
    pub const fn now(&self) -> SimTime {
        self.now
    }

    /// The resource bank.
    #[must_use]
    pub fn bank(&self) -> &ResourceBank {
        &self.world.bank
    }

    /// The timeline pool.
    #[must_use]
    pub fn pool(&self) -> &TimelinePool {
        &self.world.pool
    }

    /// The event scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &EventHandler {
        &self.scheduler
    }

    /// A resource site by id.
    #[must_use]
    pub fn site(&self, id: SiteId) -> Option<&ResourceSite> {
        self.world.sites.get(&id)
    }

    /// Heroes produced so far.
    #[must_use]
    pub const fn heroes(&self) -> u32 {
        self.world.heroes
    }

    /// The configuration this simulation runs with.
    #[must_use]
    pub fn config(&self) -> &BuildOrderConfig {
        &self.config
    }

    /// Resolved start tick of a processed action, if scheduled.
    #[must_use]
    pub fn resolved_start(&self, id: ActionId) -> Option<SimTime> {
        self.world
            .pool
            .timelines()
            .iter()
            .flat_map(|tl| tl.actions())
            .find(|a| a.id == id)
            .and_then(Action::start)
    }

    /// Advance simulated time to `t`, executing every due event.
    pub fn advance_to(&mut self, t: SimTime) -> Result<()> {
        if t < self.now {
            return Err(PlannerError::InvalidState(format!(
                "cannot advance backwards from {} to {}",
                self.now, t
            )));
        }
        self.scheduler
            .execute_events_in_range(self.now, t, &mut self.world)?;
        self.now = t;
        Ok(())
    }

    /// Roll simulated time back to `t`, reversing every event executed
    /// after it (newest first).
    ///
    /// Event-driven state (bank balances, site workers, recurrence
    /// chains, spawned timelines) is restored exactly. Orchestrator
    /// commitments made outside events - action start times already on
    /// timelines, the hero counter - are not; re-planning after a
    /// rewind means re-simulating the affected actions, which is the
    /// caller's job.
    pub fn rewind_to(&mut self, t: SimTime) -> Result<()> {
        if t > self.now {
            return Err(PlannerError::InvalidState(format!(
                "cannot rewind forwards from {} to {}",
                self.now, t
            )));
        }
        let mut tick = self.now;
        while tick > t {
            self.scheduler.reverse_events(tick, &mut self.world)?;
            tick -= 1;
        }
        self.now = t;
        Ok(())
    }

    /// Process an ordered list of actions.
    ///
    /// Stops at the first action that cannot be scheduled and reports
    /// its index and identity.
    pub fn run(&mut self, actions: Vec<Action>) -> Result<()> {
        for (index, action) in actions.into_iter().enumerate() {
            let name = action.name.clone();
            self.process(action)
                .map_err(|source| PlannerError::ActionFailed {
                    index,
                    name,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    /// Process a single action: resolve its trigger, dispatch by kind,
    /// then re-run the current tick so events registered at this very
    /// instant fire before the next action is considered.
    pub fn process(&mut self, action: Action) -> Result<()> {
        tracing::debug!(
            action = action.id,
            name = %action.name,
            tick = self.now,
            "processing action"
        );
        let mut cost = action.cost;
        if let ActionKind::BuildUnit { hero: true, .. } = action.kind {
            if self.world.heroes >= self.config.hero_limit {
                return Err(PlannerError::HeroLimitReached {
                    limit: self.config.hero_limit,
                });
            }
            // The first hero is free regardless of its nominal cost.
            if self.world.heroes == 0 {
                cost = Cost::FREE;
            }
        }
        self.resolve_trigger(&action.trigger, &cost)?;
        match action.kind {
            ActionKind::BuildUpgrade => {
                return Err(PlannerError::Unsupported(
                    "upgrade actions are not implemented",
                ))
            }
            ActionKind::Shop => {
                return Err(PlannerError::Unsupported("shop actions are not implemented"))
            }
            ActionKind::WorkerMove { .. } => self.dispatch_worker_move(action)?,
            ActionKind::BuildUnit { .. } | ActionKind::BuildStructure { .. } => {
                self.dispatch_build(action, cost)?;
            }
        }
        self.scheduler.execute_events(self.now, &mut self.world)?;
        Ok(())
    }

    /// Advance the clock one tick at a time until the trigger holds and
    /// the action's own cost is affordable, bounded by the wait ceiling.
    fn resolve_trigger(&mut self, trigger: &Trigger, cost: &Cost) -> Result<()> {
        if let Trigger::PercentComplete { .. } = trigger {
            return Err(PlannerError::Unsupported(
                "percent-of-ongoing-action triggers are not implemented",
            ));
        }
        let baseline = match *trigger {
            Trigger::WorkerReady(kind) => self.world.pool.spawned(kind),
            _ => 0,
        };
        let started = self.now;
        let deadline = started + self.config.wait_ceiling;
        loop {
            self.scheduler.execute_events(self.now, &mut self.world)?;
            if self.trigger_holds(trigger, baseline)
                && self.world.bank.can_afford(cost.gold, cost.lumber)
            {
                return Ok(());
            }
            if self.now >= deadline {
                return Err(PlannerError::UnsatisfiableTrigger {
                    waited: self.now - started,
                });
            }
            self.now += 1;
        }
    }

    fn trigger_holds(&self, trigger: &Trigger, baseline: u32) -> bool {
        match *trigger {
            Trigger::Immediate => true,
            Trigger::GoldAtLeast(n) => self.world.bank.gold >= n,
            Trigger::LumberAtLeast(n) => self.world.bank.lumber >= n,
            Trigger::FoodHeadroom(n) => self.world.bank.food_headroom() >= n,
            Trigger::WorkerReady(kind) => self.world.pool.spawned(kind) > baseline,
            Trigger::PercentComplete { .. } => false,
        }
    }

    /// Schedule a unit or structure build on the timeline with the
    /// earliest feasible slot.
    fn dispatch_build(&mut self, mut action: Action, cost: Cost) -> Result<()> {
        let started = self.now;
        let deadline = started + self.config.wait_ceiling;
        let (pos, start) = loop {
            if let Some(found) = self.best_slot(action.timeline) {
                break found;
            }
            if self.now >= deadline {
                return Err(PlannerError::NoMatchingTimeline {
                    kind: action.timeline.0,
                    waited: self.now - started,
                });
            }
            self.now += 1;
            self.scheduler.execute_events(self.now, &mut self.world)?;
        };
        self.advance_to(start)?;

        // A worker mid-harvest stops gathering to carry out the build.
        self.interrupt_worker_task(pos)?;

        if let ActionKind::BuildUnit { hero: true, .. } = action.kind {
            self.world.heroes += 1;
        }

        action.set_start(start)?;
        self.schedule_payment(&mut action, &cost);
        self.schedule_completion(&mut action);

        let action_id = action.id;
        let timeline = self
            .world
            .pool
            .get_mut(pos)
            .ok_or_else(|| PlannerError::InvalidState("candidate timeline vanished".into()))?;
        timeline.add_action(action).map_err(|err| {
            tracing::warn!(action = action_id, %err, "timeline insertion failed");
            PlannerError::TimelineConflict {
                action: action_id,
                start,
            }
        })?;
        Ok(())
    }

    /// The timeline of the given kind with the earliest feasible start,
    /// active timelines first on ties.
    fn best_slot(&self, kind: TimelineKind) -> Option<(usize, SimTime)> {
        let mut best: Option<(SimTime, bool, usize)> = None;
        for pos in self.world.pool.positions_of_kind(kind) {
            let Some(timeline) = self.world.pool.get(pos) else {
                continue;
            };
            let Some(start) = timeline.next_possible_start(self.now) else {
                continue;
            };
            let key = (start, !timeline.is_active(), pos);
            if best.map_or(true, |b| key < b) {
                best = Some(key);
            }
        }
        best.map(|(start, _, pos)| (pos, start))
    }

    /// Pay an action's cost through bookkeeping events at the start
    /// tick. Routing payment through events keeps it reversible.
    fn schedule_payment(&mut self, action: &mut Action, cost: &Cost) {
        let at = tick_to_fixed(self.now);
        let effects = [
            (cost.gold > 0).then_some(Effect::DebitGold { amount: cost.gold }),
            (cost.lumber > 0).then_some(Effect::DebitLumber {
                amount: cost.lumber,
            }),
            (cost.food > 0).then_some(Effect::ConsumeFood { amount: cost.food }),
        ];
        for effect in effects.into_iter().flatten() {
            let id = self.scheduler.allocate_id();
            self.scheduler.register_event(Event::once(id, effect, at));
            action.push_event(id);
        }
    }

    /// Register the completion events of a finite build: spawning the
    /// produced timeline and providing food capacity.
    fn schedule_completion(&mut self, action: &mut Action) {
        let Some(duration) = action.duration else {
            return;
        };
        let finish = tick_to_fixed(self.now) + action.travel + duration;
        let (spawns, food_provided) = match action.kind {
            ActionKind::BuildUnit {
                spawns,
                food_provided,
                ..
            }
            | ActionKind::BuildStructure {
                spawns,
                food_provided,
            } => (spawns, food_provided),
            _ => (None, 0),
        };
        if let Some(kind) = spawns {
            let id = self.scheduler.allocate_id();
            self.scheduler
                .register_event(Event::once(id, Effect::SpawnTimeline { kind }, finish));
            action.push_event(id);
        }
        if food_provided > 0 {
            let id = self.scheduler.allocate_id();
            self.scheduler.register_event(Event::once(
                id,
                Effect::RaiseFoodCap {
                    amount: food_provided,
                },
                finish,
            ));
            action.push_event(id);
        }
    }

    /// Re-task a worker: leave the old site immediately, cancel its
    /// pending gather events, then register the travel-then-join chain
    /// for the new task.
    fn dispatch_worker_move(&mut self, mut action: Action) -> Result<()> {
        let ActionKind::WorkerMove { source, task } = action.kind else {
            return Err(PlannerError::InvalidState(
                "worker dispatch on a non-movement action".into(),
            ));
        };
        let started = self.now;
        let deadline = started + self.config.wait_ceiling;
        let pos = loop {
            if let Some(pos) = self.find_worker(action.timeline, source) {
                break pos;
            }
            if self.now >= deadline {
                return Err(PlannerError::NoMatchingWorker {
                    kind: action.timeline.0,
                    waited: self.now - started,
                });
            }
            self.now += 1;
            self.scheduler.execute_events(self.now, &mut self.world)?;
        };

        self.interrupt_worker_task(pos)?;

        if let WorkerTask::Harvest(site_id) = task {
            let site = self
                .world
                .sites
                .get(&site_id)
                .ok_or(PlannerError::SiteNotFound { site: site_id })?
                .clone();
            let arrival = tick_to_fixed(self.now) + action.travel;
            let join = self.scheduler.allocate_id();
            self.scheduler.register_event(Event::once(
                join,
                Effect::JoinSite { site: site_id },
                arrival,
            ));
            action.push_event(join);

            if site.resource == ResourceKind::Lumber {
                // Per-worker trip group: reach the trees, then deliver;
                // the gap is the walk back before the next trip.
                let trip = self.scheduler.allocate_id();
                let credit = self.scheduler.allocate_id();
                let members = vec![
                    Event::once(trip, Effect::Noop, arrival),
                    Event::once(
                        credit,
                        Effect::CreditLumber {
                            amount: site.payout,
                        },
                        arrival + site.period,
                    ),
                ];
                self.scheduler.register_group(members, site.gap)?;
                action.push_event(trip);
                action.push_event(credit);
            }
        }

        // Worker tasks run until the worker is re-tasked.
        action.duration = None;
        action.interruptable = true;
        action.set_start(self.now)?;
        let action_id = action.id;
        let start = self.now;
        let timeline = self
            .world
            .pool
            .get_mut(pos)
            .ok_or_else(|| PlannerError::InvalidState("worker timeline vanished".into()))?;
        timeline.set_task(task);
        timeline.add_action(action).map_err(|err| {
            tracing::warn!(action = action_id, %err, "worker timeline insertion failed");
            PlannerError::TimelineConflict {
                action: action_id,
                start,
            }
        })?;
        Ok(())
    }

    /// Pull a mid-harvest worker off its site: cancel the pending
    /// gather chains of its current action and apply the leave rescale.
    /// A no-op for idle workers and production timelines.
    fn interrupt_worker_task(&mut self, pos: usize) -> Result<()> {
        let task = self
            .world
            .pool
            .get(pos)
            .map(|tl| tl.task())
            .unwrap_or_default();
        let WorkerTask::Harvest(site) = task else {
            return Ok(());
        };
        let previous_events: Vec<EventId> = self
            .world
            .pool
            .get(pos)
            .and_then(|tl| tl.current_or_prev_action(self.now))
            .map(|a| a.events().to_vec())
            .unwrap_or_default();
        // A still-pending join means the worker is mid-travel and never
        // reached the site; cancelling it leaves nothing to rescale.
        let mut arrived = true;
        for origin in previous_events {
            let pending_join = self
                .scheduler
                .latest_occurrence(origin)
                .and_then(|latest| self.scheduler.event(latest))
                .is_some_and(|e| {
                    matches!(e.effect(), Effect::JoinSite { .. })
                        && self.scheduler.is_pending(e.id())
                });
            if self.scheduler.cancel_chain(origin).is_some() && pending_join {
                arrived = false;
            }
        }
        if arrived {
            self.world.apply_effect(
                self.now,
                &Effect::LeaveSite { site },
                &mut self.scheduler,
            )?;
        }
        if let Some(timeline) = self.world.pool.get_mut(pos) {
            timeline.set_task(WorkerTask::Idle);
        }
        Ok(())
    }

    /// Locate a worker timeline by the movement's source criterion.
    fn find_worker(&self, kind: TimelineKind, source: WorkerSource) -> Option<usize> {
        match source {
            WorkerSource::Idle => self.world.pool.positions_of_kind(kind).find(|&pos| {
                self.world
                    .pool
                    .get(pos)
                    .is_some_and(|tl| tl.task() == WorkerTask::Idle)
            }),
            WorkerSource::OnSite(site) => self.world.pool.positions_of_kind(kind).find(|&pos| {
                self.world
                    .pool
                    .get(pos)
                    .is_some_and(|tl| tl.task() == WorkerTask::Harvest(site))
            }),
            WorkerSource::MostRecentlyProduced => self.world.pool.most_recent_of_kind(kind),
        }
    }
}
