//! Command limit enforcement for outgoing signals.

use std::fmt;

use hc_signals::Limits;
use tracing::warn;

use crate::error::{ControlError, ControlResult};

/// What to do with a ctrl value outside its signal's limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitPolicy {
    /// Send the value unchanged, with a warning.
    #[default]
    Ignore,
    /// Clamp to the nearest limit, with a warning.
    Saturate,
    /// Fail the step before anything is sent.
    Reject,
}

impl fmt::Display for LimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitPolicy::Ignore => "ignore",
            LimitPolicy::Saturate => "saturate",
            LimitPolicy::Reject => "reject",
        };
        f.write_str(s)
    }
}

impl LimitPolicy {
    /// Value to send for ctrl slot `slot`.
    pub fn enforce(self, slot: usize, value: f64, limits: Option<Limits>) -> ControlResult<f64> {
        let Some(lim) = limits else {
            return Ok(value);
        };
        if lim.contains(value) {
            return Ok(value);
        }
        match self {
            LimitPolicy::Ignore => {
                warn!(slot = slot + 1, value, lower = lim.lower, upper = lim.upper, "ctrl signal outside limits");
                Ok(value)
            }
            LimitPolicy::Saturate => {
                let clamped = lim.clamp(value);
                warn!(slot = slot + 1, value, clamped, "ctrl signal saturated");
                Ok(clamped)
            }
            LimitPolicy::Reject => Err(ControlError::LimitExceeded {
                slot,
                value,
                lower: lim.lower,
                upper: lim.upper,
            }),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn saturate_lands_inside_and_keeps_inside_values(
            lower in -100.0_f64..0.0,
            width in 0.0_f64..200.0,
            value in -500.0_f64..500.0,
        ) {
            let lim = Limits::new(lower, lower + width);
            let out = LimitPolicy::Saturate.enforce(0, value, Some(lim)).unwrap();
            prop_assert!(lim.contains(out));
            if lim.contains(value) {
                prop_assert_eq!(out, value);
                prop_assert_eq!(LimitPolicy::Reject.enforce(0, value, Some(lim)).unwrap(), value);
            } else {
                prop_assert!(LimitPolicy::Reject.enforce(0, value, Some(lim)).is_err());
            }
        }
    }
}
