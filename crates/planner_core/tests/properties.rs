//! Property-based tests for the engine's core correctness claims.

use planner_core::event::{Effect, Event};
use planner_core::prelude::*;
use planner_core::time::{tick_to_fixed, Fixed, HALF_TICK};
use planner_test_utils::determinism::strategies::{
    arb_period, arb_start_time, arb_window_sequence,
};
use proptest::prelude::*;

proptest! {
    /// For any non-integer period, the scheduled tick never deviates
    /// from the mathematically exact schedule by more than half a tick,
    /// no matter how many recurrences have elapsed.
    #[test]
    fn prop_recurrence_error_is_bounded(
        start in arb_start_time(),
        period in arb_period(),
    ) {
        let mut event = Event::recurring(0, Effect::Noop, start, period).unwrap();
        let mut exact = start;
        for id in 1..=500u64 {
            event = event.recur(id).unwrap();
            exact += period;
            let drift = (tick_to_fixed(event.tick()) - exact).abs();
            prop_assert!(
                drift <= HALF_TICK,
                "drift {} after {} recurrences of period {}",
                drift,
                id,
                period
            );
        }
    }

    /// However actions are inserted, the timeline never holds an
    /// overlapping pair, and every successful insertion truncates
    /// everything after its position.
    #[test]
    fn prop_timeline_never_overlaps(windows in arb_window_sequence(24)) {
        let kind = TimelineKind(1);
        let mut timeline = Timeline::new(TimelineId { kind, index: 0 });
        for (i, &(start, duration)) in windows.iter().enumerate() {
            let mut action = Action::new(
                u32::try_from(i).unwrap(),
                format!("window-{i}"),
                Cost::FREE,
                kind,
                ActionKind::BuildUnit {
                    spawns: None,
                    food_provided: 0,
                    hero: false,
                },
                Trigger::Immediate,
            )
            .with_duration(Fixed::from_num(duration));
            action.set_start(start).unwrap();

            let len_before = timeline.actions().len();
            if let Ok(discarded) = timeline.add_action(action) {
                // Truncation: the new action is last, at insertion_index.
                let len_after = timeline.actions().len();
                prop_assert_eq!(len_after, len_before - discarded + 1);
                prop_assert_eq!(
                    timeline.actions().last().unwrap().start(),
                    Some(start)
                );
            }

            // The invariant holds after every attempt.
            for pair in timeline.actions().windows(2) {
                let end = pair[0].end().unwrap();
                let next_start = pair[1].start().unwrap();
                prop_assert!(
                    end <= next_start,
                    "overlap: [{:?}) then {}",
                    end,
                    next_start
                );
            }
        }
    }

    /// Rolling the clock back and forward again reproduces the exact
    /// same economy: reversal is symmetric at the whole-engine level.
    #[test]
    fn prop_rewind_and_replay_reproduces_economy(
        travels in proptest::collection::vec(0u8..40, 1..4),
        horizon in 100u64..2_000,
    ) {
        let site = SiteId::from(1u8);
        let config = BuildOrderConfig {
            starting_food_cap: 10,
            initial_timelines: std::iter::once(TimelineKind(2))
                .chain(travels.iter().map(|_| TimelineKind(1)))
                .collect(),
            sites: vec![ResourceSite::new(
                site,
                ResourceKind::Gold,
                10,
                secs_to_ticks(Fixed::from_num(5)),
                8,
            )],
            ..BuildOrderConfig::default()
        };
        let mut order = BuildOrder::new(config);
        for (i, &travel_tenths) in travels.iter().enumerate() {
            let action = Action::new(
                u32::try_from(i).unwrap(),
                format!("miner-{i}"),
                Cost::FREE,
                TimelineKind(1),
                ActionKind::WorkerMove {
                    source: WorkerSource::Idle,
                    task: WorkerTask::Harvest(site),
                },
                Trigger::Immediate,
            )
            .with_travel(Fixed::from_num(travel_tenths));
            order.process(action).unwrap();
        }

        order.advance_to(horizon).unwrap();
        let gold_forward = order.bank().gold;
        let workers_forward = order.site(site).unwrap().workers();

        order.rewind_to(0).unwrap();
        prop_assert_eq!(order.bank().gold, 0);

        order.advance_to(horizon).unwrap();
        prop_assert_eq!(order.bank().gold, gold_forward);
        prop_assert_eq!(order.site(site).unwrap().workers(), workers_forward);
    }
}
