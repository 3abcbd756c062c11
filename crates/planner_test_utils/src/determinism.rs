//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Build-order plans must be 100% reproducible: the same action list
//! against the same configuration has to yield byte-identical
//! timelines. Sources of non-determinism the engine guards against:
//!
//! - **Floating-point math**: different CPUs can produce different
//!   results. Exact times use fixed-point arithmetic via
//!   [`planner_core::time::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Anything order-sensitive iterates sorted structures (tick buckets
//!   are a `BTreeMap`, sites a sorted map, timelines a creation-order
//!   vector).
//!
//! - **System randomness**: the engine takes no random input at all.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a scenario multiple times and compare observed hashes.
///
/// `setup` builds a fresh state, `run` drives it, `observe` projects
/// the externally visible outcome to something hashable (typically a
/// serialized snapshot).
pub fn verify_determinism<State, Obs>(
    runs: usize,
    setup: impl Fn() -> State,
    run: impl Fn(&mut State),
    observe: impl Fn(&State) -> Obs,
) -> DeterminismResult
where
    Obs: Hash,
{
    let mut hashes = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        run(&mut state);
        hashes.push(compute_hash(&observe(&state)));
    }
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
    }
}

/// Compute a hash of any hashable value.
#[must_use]
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for engine inputs.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the scheduler and timelines.
pub mod strategies {
    use planner_core::time::Fixed;
    use proptest::prelude::*;

    /// Generate a non-integer recurrence period between 1 and 50 ticks.
    ///
    /// Built from raw fixed-point bits so fractional parts exercise the
    /// full precision range, not just neat decimals.
    pub fn arb_period() -> impl Strategy<Value = Fixed> {
        (1i64..50, 1i64..u32::MAX as i64).prop_map(|(whole, frac_bits)| {
            Fixed::from_bits((whole << 32) | frac_bits)
        })
    }

    /// Generate an exact event time within the first minute.
    pub fn arb_start_time() -> impl Strategy<Value = Fixed> {
        (0i64..600, 0i64..=u32::MAX as i64)
            .prop_map(|(whole, frac_bits)| Fixed::from_bits((whole << 32) | frac_bits))
    }

    /// Generate an action window: start tick and duration in ticks.
    pub fn arb_window() -> impl Strategy<Value = (u64, u32)> {
        (0u64..10_000, 1u32..600)
    }

    /// Generate a sequence of action windows.
    pub fn arb_window_sequence(max_len: usize) -> impl Strategy<Value = Vec<(u64, u32)>> {
        proptest::collection::vec(arb_window(), 1..max_len)
    }

    /// Generate a worker travel time between 0 and 10 seconds.
    pub fn arb_travel_secs() -> impl Strategy<Value = Fixed> {
        (0i64..100).prop_map(|tenths| Fixed::from_num(tenths) / Fixed::from_num(10))
    }

    /// Generate a payout amount.
    pub fn arb_payout() -> impl Strategy<Value = u32> {
        1u32..100
    }
}
