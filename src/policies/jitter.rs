//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to creation-retry delays so that many
//! chains blocked on the same missing external condition do not re-attempt
//! in lockstep.
//!
//! - [`JitterPolicy::None`] — no randomization, predictable delays
//! - [`JitterPolicy::Full`] — random delay in `[0, base]` (most aggressive)
//! - [`JitterPolicy::Equal`] — delay = `base/2 + random[0, base/2]` (balanced)

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of retry delays.
///
/// ## Trade-offs
/// - **None**: predictable, but risks synchronized re-attempts
/// - **Full**: maximum randomness, aggressive load spreading
/// - **Equal**: balanced (recommended when many chains share a resource)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact computed delay.
    #[default]
    None,
    /// Full jitter: random delay in `[0, base]`.
    Full,
    /// Equal jitter: delay = `base/2 + random[0, base/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given base delay.
    pub fn apply(&self, base: Duration) -> Duration {
        match self {
            JitterPolicy::None => base,
            JitterPolicy::Full => {
                if base.is_zero() {
                    return base;
                }
                let nanos = base.as_nanos().min(u128::from(u64::MAX)) as u64;
                Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
            JitterPolicy::Equal => {
                if base.is_zero() {
                    return base;
                }
                let half = base / 2;
                let nanos = half.as_nanos().min(u128::from(u64::MAX)) as u64;
                half + Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(250);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_in_range() {
        let d = Duration::from_millis(100);
        for _ in 0..100 {
            let out = JitterPolicy::Full.apply(d);
            assert!(out <= d);
        }
    }

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
