//! Resource bank and shared resource sites.
//!
//! The bank holds the mutable gold/lumber/food counters every timeline
//! competes for. Sites model shared resource nodes (a gold mine, a
//! stand of trees): partial progress toward a payout is measured in
//! worker-seconds and must survive worker-count changes exactly, which
//! is what the proportional rescaling below implements.

use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::time::{fixed_serde, tick_to_fixed, Fixed, SimTime};

/// Unique identifier for resource sites.
pub type SiteId = u32;

/// The resource a site yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Gold: one shared recurring credit event per non-empty site,
    /// rescaled as workers come and go.
    Gold,
    /// Lumber: one recurring trip group per worker.
    Lumber,
}

/// Mutable gold/lumber/food counters.
///
/// Gold and lumber never intentionally go negative: trigger resolution
/// waits until an action is affordable before it is authorized. A debit
/// beyond the balance is a caller contract violation; it is clamped and
/// reported loudly rather than corrupting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceBank {
    /// Current gold.
    pub gold: u32,
    /// Current lumber.
    pub lumber: u32,
    /// Food currently occupied.
    pub food_used: u32,
    /// Food capacity.
    pub food_cap: u32,
}

impl ResourceBank {
    /// Create a bank with starting balances.
    #[must_use]
    pub const fn new(gold: u32, lumber: u32, food_cap: u32) -> Self {
        Self {
            gold,
            lumber,
            food_used: 0,
            food_cap,
        }
    }

    /// Add gold.
    pub fn credit_gold(&mut self, amount: u32) {
        self.gold += amount;
    }

    /// Remove gold, clamping at zero on underflow.
    pub fn debit_gold(&mut self, amount: u32) {
        if amount > self.gold {
            tracing::error!(
                have = self.gold,
                want = amount,
                "gold underflow, clamping to zero"
            );
        }
        self.gold = self.gold.saturating_sub(amount);
    }

    /// Add lumber.
    pub fn credit_lumber(&mut self, amount: u32) {
        self.lumber += amount;
    }

    /// Remove lumber, clamping at zero on underflow.
    pub fn debit_lumber(&mut self, amount: u32) {
        if amount > self.lumber {
            tracing::error!(
                have = self.lumber,
                want = amount,
                "lumber underflow, clamping to zero"
            );
        }
        self.lumber = self.lumber.saturating_sub(amount);
    }

    /// Occupy food supply.
    ///
    /// Usage may exceed the cap transiently while an action that nets
    /// future capacity is pending; that state is logged, not rejected.
    pub fn consume_food(&mut self, amount: u32) {
        self.food_used += amount;
        if self.food_used > self.food_cap {
            tracing::debug!(
                used = self.food_used,
                cap = self.food_cap,
                "food over cap while capacity is pending"
            );
        }
    }

    /// Release food supply, clamping at zero.
    pub fn release_food(&mut self, amount: u32) {
        if amount > self.food_used {
            tracing::error!(
                used = self.food_used,
                want = amount,
                "food release underflow, clamping to zero"
            );
        }
        self.food_used = self.food_used.saturating_sub(amount);
    }

    /// Raise the food cap.
    pub fn raise_food_cap(&mut self, amount: u32) {
        self.food_cap += amount;
    }

    /// Lower the food cap, clamping at zero.
    pub fn lower_food_cap(&mut self, amount: u32) {
        if amount > self.food_cap {
            tracing::error!(
                cap = self.food_cap,
                want = amount,
                "food cap underflow, clamping to zero"
            );
        }
        self.food_cap = self.food_cap.saturating_sub(amount);
    }

    /// Unoccupied food supply.
    #[must_use]
    pub const fn food_headroom(&self) -> u32 {
        self.food_cap.saturating_sub(self.food_used)
    }

    /// Whether the bank covers a cost's gold and lumber.
    ///
    /// Food is gated separately, through headroom triggers: production
    /// may legitimately overshoot the cap while capacity is pending.
    #[must_use]
    pub const fn can_afford(&self, gold: u32, lumber: u32) -> bool {
        self.gold >= gold && self.lumber >= lumber
    }
}

/// A shared resource node.
///
/// For gold-style sites a single recurring credit event exists whenever
/// the site is non-empty; its schedule is rescaled when the worker
/// count changes. Lumber-style sites give each worker its own recurring
/// trip group (`period` is the gathering phase, `gap` the walk-back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSite {
    /// Unique site id.
    pub id: SiteId,
    /// The resource this site yields.
    pub resource: ResourceKind,
    /// Amount credited per payout.
    pub payout: u32,
    /// Exact base period in ticks for a single worker's cycle.
    #[serde(with = "fixed_serde")]
    pub period: Fixed,
    /// Exact walk-back gap in ticks between cycles (lumber only).
    #[serde(with = "fixed_serde")]
    pub gap: Fixed,
    /// Most workers the site supports at once.
    pub max_workers: u32,
    /// Workers currently gathering here.
    #[serde(skip)]
    workers: u32,
    /// Chain origin of the shared credit event (gold sites, non-empty).
    #[serde(skip)]
    credit_event: Option<EventId>,
}

impl ResourceSite {
    /// Create a site with no gap (gold-style).
    #[must_use]
    pub fn new(
        id: SiteId,
        resource: ResourceKind,
        payout: u32,
        period: Fixed,
        max_workers: u32,
    ) -> Self {
        Self {
            id,
            resource,
            payout,
            period,
            gap: Fixed::ZERO,
            max_workers,
            workers: 0,
            credit_event: None,
        }
    }

    /// Set the walk-back gap (lumber-style sites).
    #[must_use]
    pub fn with_gap(mut self, gap: Fixed) -> Self {
        self.gap = gap;
        self
    }

    /// Workers currently gathering here.
    #[must_use]
    pub const fn workers(&self) -> u32 {
        self.workers
    }

    /// Whether another worker fits.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.workers < self.max_workers
    }

    /// Record a worker joining. Returns the previous count.
    pub fn add_worker(&mut self) -> u32 {
        let before = self.workers;
        self.workers += 1;
        before
    }

    /// Record a worker leaving. Returns the previous count, clamping
    /// at zero with a loud report.
    pub fn remove_worker(&mut self) -> u32 {
        let before = self.workers;
        if before == 0 {
            tracing::error!(site = self.id, "removing worker from empty site");
        }
        self.workers = self.workers.saturating_sub(1);
        before
    }

    /// Chain origin of the shared credit event.
    #[must_use]
    pub const fn credit_event(&self) -> Option<EventId> {
        self.credit_event
    }

    /// Track the shared credit event chain.
    pub fn set_credit_event(&mut self, event: Option<EventId>) {
        self.credit_event = event;
    }
}

/// Rescale a shared credit event for a worker-count change.
///
/// Progress toward the next payout is measured in worker-seconds, so
/// the remaining time scales by `old_count / new_count` and the period
/// by the same ratio:
///
/// `new_true = now + max(old_true − now, 0) × old / new`
///
/// A site that ran with 2 workers for 1 second keeps exactly 2
/// worker-seconds of progress across the change. Progress is lost only
/// when the site empties entirely, which is handled by cancelling the
/// event rather than rescaling it.
#[must_use]
pub fn rescaled_schedule(
    now: SimTime,
    old_true: Fixed,
    old_period: Fixed,
    old_count: u32,
    new_count: u32,
) -> (Fixed, Fixed) {
    debug_assert!(old_count > 0 && new_count > 0, "rescale needs workers");
    let ratio = Fixed::from_num(old_count) / Fixed::from_num(new_count);
    let now_fixed = tick_to_fixed(now);
    let remaining = (old_true - now_fixed).max(Fixed::ZERO);
    (now_fixed + remaining * ratio, old_period * ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_credit_debit() {
        let mut bank = ResourceBank::new(100, 50, 10);
        bank.credit_gold(30);
        bank.debit_gold(50);
        assert_eq!(bank.gold, 80);

        bank.credit_lumber(10);
        bank.debit_lumber(20);
        assert_eq!(bank.lumber, 40);
    }

    #[test]
    fn test_bank_underflow_clamps() {
        let mut bank = ResourceBank::new(10, 5, 10);
        bank.debit_gold(100);
        bank.debit_lumber(100);
        assert_eq!(bank.gold, 0);
        assert_eq!(bank.lumber, 0);
    }

    #[test]
    fn test_bank_affordability() {
        let bank = ResourceBank::new(100, 20, 10);
        assert!(bank.can_afford(100, 20));
        assert!(!bank.can_afford(101, 0));
        assert!(!bank.can_afford(0, 21));
    }

    #[test]
    fn test_food_may_transiently_exceed_cap() {
        let mut bank = ResourceBank::new(0, 0, 10);
        bank.consume_food(8);
        assert_eq!(bank.food_headroom(), 2);
        bank.consume_food(4); // over cap while a farm is pending
        assert_eq!(bank.food_used, 12);
        assert_eq!(bank.food_headroom(), 0);
        bank.raise_food_cap(6);
        assert_eq!(bank.food_headroom(), 4);
        bank.release_food(12);
        assert_eq!(bank.food_used, 0);
    }

    #[test]
    fn test_site_worker_counting() {
        let mut site = ResourceSite::new(1, ResourceKind::Gold, 10, Fixed::from_num(50), 5);
        assert!(site.has_capacity());
        assert_eq!(site.add_worker(), 0);
        assert_eq!(site.add_worker(), 1);
        assert_eq!(site.remove_worker(), 2);
        assert_eq!(site.workers(), 1);
        // Removing from empty clamps.
        site.remove_worker();
        assert_eq!(site.remove_worker(), 0);
        assert_eq!(site.workers(), 0);
    }

    #[test]
    fn test_rescale_preserves_worker_seconds() {
        // Base period 5 s (50 ticks), payout pending at tick 50. One
        // worker mines alone for 1 s; a second joins at tick 10.
        let (new_true, new_period) =
            rescaled_schedule(10, Fixed::from_num(50), Fixed::from_num(50), 1, 2);
        // Remaining 40 ticks are halved: completion at tick 30, which
        // is 3 s from the start rather than 5.
        assert_eq!(new_true, Fixed::from_num(30));
        assert_eq!(new_period, Fixed::from_num(25));
    }

    #[test]
    fn test_rescale_round_trips() {
        let (true_2, period_2) =
            rescaled_schedule(10, Fixed::from_num(50), Fixed::from_num(50), 1, 2);
        // The second worker leaves immediately: schedule is restored.
        let (true_1, period_1) = rescaled_schedule(10, true_2, period_2, 2, 1);
        assert_eq!(true_1, Fixed::from_num(50));
        assert_eq!(period_1, Fixed::from_num(50));
    }

    #[test]
    fn test_rescale_past_due_stays_at_now() {
        // A payout already due does not move backwards.
        let (new_true, _) =
            rescaled_schedule(60, Fixed::from_num(50), Fixed::from_num(50), 1, 2);
        assert_eq!(new_true, Fixed::from_num(60));
    }
}
