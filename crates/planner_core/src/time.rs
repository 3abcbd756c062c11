//! Simulation time and exact-time rounding utilities.
//!
//! All scheduling is expressed in an integer tick count; one tick is a
//! fixed sub-second quantum (1/10 second). Real-world fractional times
//! and durations are carried as exact fixed-point values and rounded to
//! the tick grid only when an event is placed on the schedule, with the
//! rounding error retained so that recurring schedules never drift.
//!
//! No floating-point math: exact values use fixed-point arithmetic,
//! which produces identical results on every platform.

use fixed::types::I32F32;

/// Fixed-point number type for all exact-time math.
///
/// Uses 32 bits for the integer part and 32 bits for the fractional part,
/// which covers simulation horizons of billions of ticks at a precision of
/// roughly 2.3e-10 ticks.
pub type Fixed = I32F32;

/// Simulation time in ticks. Non-negative, starts at 0.
pub type SimTime = u64;

/// Ticks per second of simulated time.
pub const TICKS_PER_SECOND: u32 = 10;

/// Half of one tick (0.5 in fixed-point), the largest magnitude a
/// rounding error can reach.
pub const HALF_TICK: Fixed = Fixed::from_bits(1 << 31);

/// One full tick (1.0 in fixed-point).
pub const ONE_TICK: Fixed = Fixed::from_bits(1 << 32);

/// An exact time rounded to the tick grid, together with the error the
/// rounding introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rounded {
    /// The rounded tick.
    pub tick: SimTime,
    /// `rounded − exact`, always in `(−0.5, +0.5]` ticks.
    pub error: Fixed,
}

/// Round an exact tick value to the nearest integer tick.
///
/// The rounding mode is **half up**: an exact value ending in `.5` rounds
/// to the next higher tick. This choice is part of the engine contract;
/// reproducibility at the tick boundary depends on it.
///
/// Negative inputs are clamped to zero (simulation time is non-negative).
#[must_use]
pub fn round_ticks(exact: Fixed) -> Rounded {
    debug_assert!(
        exact >= Fixed::ZERO,
        "rounding a negative time: {}",
        exact
    );
    let clamped = exact.max(Fixed::ZERO);
    let tick: SimTime = (clamped + HALF_TICK).floor().to_num();
    Rounded {
        tick,
        error: tick_to_fixed(tick) - exact,
    }
}

/// Convert a tick count to its exact fixed-point value.
#[must_use]
pub fn tick_to_fixed(tick: SimTime) -> Fixed {
    Fixed::from_num(tick as i64)
}

/// Convert a duration in seconds to exact ticks.
#[must_use]
pub fn secs_to_ticks(seconds: Fixed) -> Fixed {
    seconds * Fixed::from_num(TICKS_PER_SECOND)
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit
/// representation, preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => v.to_bits().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_exact_integer() {
        let r = round_ticks(Fixed::from_num(12));
        assert_eq!(r.tick, 12);
        assert_eq!(r.error, Fixed::ZERO);
    }

    #[test]
    fn test_round_half_goes_up() {
        let r = round_ticks(Fixed::from_num(2.5));
        assert_eq!(r.tick, 3);
        assert_eq!(r.error, HALF_TICK);
    }

    #[test]
    fn test_round_below_half_goes_down() {
        let r = round_ticks(Fixed::from_num(2.4));
        assert_eq!(r.tick, 2);
        assert!(r.error < Fixed::ZERO);
        assert!(r.error.abs() <= HALF_TICK);
    }

    #[test]
    fn test_error_bound_holds() {
        // A third of a tick cannot be represented exactly; the error must
        // still stay within the half-tick bound.
        let third = Fixed::from_num(1) / Fixed::from_num(3);
        for k in 0..100u64 {
            let exact = tick_to_fixed(k) + third;
            let r = round_ticks(exact);
            assert!(r.error.abs() <= HALF_TICK, "error {} out of bound", r.error);
            assert_eq!(r.tick, k); // 1/3 always rounds down
        }
    }

    #[test]
    fn test_secs_to_ticks() {
        assert_eq!(secs_to_ticks(Fixed::from_num(1)), Fixed::from_num(10));
        assert_eq!(secs_to_ticks(Fixed::from_num(1.2)), Fixed::from_num(12));
        assert_eq!(secs_to_ticks(Fixed::from_num(0.05)), HALF_TICK);
    }

    #[test]
    fn test_half_tick_constant() {
        assert_eq!(HALF_TICK + HALF_TICK, ONE_TICK);
        assert_eq!(ONE_TICK, Fixed::from_num(1));
    }
}
