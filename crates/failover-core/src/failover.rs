//! Confidence counter and failover state machine
//!
//! Turns the noisy per-cycle classification stream into a debounced,
//! edge-triggered decision between the primary and secondary uplink.
//!
//! ## Counter rules
//!
//! - `InPrimary`: counter + 1, capped at the threshold
//! - `InSecondary`: counter reset to 0 (never a decrement)
//! - `Ambiguous`: counter unchanged, no transition possible
//! - Resolution failure: treated like `InSecondary`
//!
//! ## Transitions
//!
//! - `Secondary -> Primary` when the counter reaches the threshold
//! - `Primary -> Secondary` when the counter reaches 0
//!
//! Both fire once per boundary crossing. Cycles spent sitting at a
//! boundary never re-fire.

use std::fmt;

use crate::classifier::Classification;
use crate::error::{Error, Result};

/// Which uplink target the dynamic alias should point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverState {
    /// Failover active: alias points at the secondary target
    #[default]
    Secondary,
    /// Failover inactive: alias points at the primary target
    Primary,
}

impl fmt::Display for FailoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverState::Secondary => f.write_str("secondary"),
            FailoverState::Primary => f.write_str("primary"),
        }
    }
}

/// Result of feeding one cycle into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Counter value after this cycle
    pub confidence: u32,
    /// The state entered this cycle, if a transition fired
    pub transition: Option<FailoverState>,
    /// State after this cycle
    pub state: FailoverState,
}

/// Bounded hysteresis counter plus the failover state it drives
#[derive(Debug, Clone)]
pub struct FailoverStateMachine {
    threshold: u32,
    confidence: u32,
    state: FailoverState,
}

impl FailoverStateMachine {
    /// Create a machine seeded at `threshold / 2` in the `Secondary` state
    pub fn new(threshold: u32) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::config("Confidence threshold must be at least 1"));
        }

        Ok(Self {
            threshold,
            confidence: threshold / 2,
            state: FailoverState::Secondary,
        })
    }

    /// The configured threshold
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current counter value
    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    /// Current failover state
    pub fn state(&self) -> FailoverState {
        self.state
    }

    /// Feed one classification
    pub fn observe(&mut self, classification: Classification) -> Observation {
        match classification {
            Classification::InPrimary => {
                self.confidence = (self.confidence + 1).min(self.threshold);
            }
            Classification::InSecondary => {
                self.confidence = 0;
            }
            Classification::Ambiguous => return self.snapshot(None),
        }

        self.settle()
    }

    /// Record a failed address discovery
    ///
    /// Without an address the primary uplink cannot be confirmed, so this
    /// counts as an unfavorable observation and demotes a `Primary` state.
    pub fn observe_failure(&mut self) -> Observation {
        self.confidence = 0;
        self.settle()
    }

    /// Evaluate both boundaries and enter the new state, if any
    fn settle(&mut self) -> Observation {
        let transition = if self.confidence == self.threshold && self.state != FailoverState::Primary
        {
            Some(FailoverState::Primary)
        } else if self.confidence == 0 && self.state == FailoverState::Primary {
            Some(FailoverState::Secondary)
        } else {
            None
        };

        if let Some(next) = transition {
            self.state = next;
        }

        self.snapshot(transition)
    }

    fn snapshot(&self, transition: Option<FailoverState>) -> Observation {
        Observation {
            confidence: self.confidence,
            transition,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Classification::*;

    #[test]
    fn test_seed_is_half_threshold() {
        for (threshold, seed) in [(1, 0), (2, 1), (4, 2), (5, 2), (9, 4)] {
            let machine = FailoverStateMachine::new(threshold).unwrap();
            assert_eq!(machine.confidence(), seed, "threshold {}", threshold);
            assert_eq!(machine.state(), FailoverState::Secondary);
        }
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(FailoverStateMachine::new(0).is_err());
    }

    #[test]
    fn test_promotes_exactly_on_threshold_from_zero() {
        for threshold in 1..=8 {
            let mut machine = FailoverStateMachine::new(threshold).unwrap();
            machine.observe(InSecondary);
            assert_eq!(machine.confidence(), 0);

            for step in 1..=threshold {
                let obs = machine.observe(InPrimary);
                assert_eq!(obs.confidence, step);
                if step < threshold {
                    assert_eq!(obs.transition, None, "fired early at step {}", step);
                } else {
                    assert_eq!(obs.transition, Some(FailoverState::Primary));
                }
            }
        }
    }

    #[test]
    fn test_seeded_scenario_promotes_after_two() {
        let mut machine = FailoverStateMachine::new(4).unwrap();

        let first = machine.observe(InPrimary);
        assert_eq!((first.confidence, first.transition), (3, None));

        let second = machine.observe(InPrimary);
        assert_eq!(second.confidence, 4);
        assert_eq!(second.transition, Some(FailoverState::Primary));

        for _ in 0..2 {
            let again = machine.observe(InPrimary);
            assert_eq!(again.confidence, 4);
            assert_eq!(again.transition, None);
            assert_eq!(again.state, FailoverState::Primary);
        }
    }

    #[test]
    fn test_single_unfavorable_resets_and_demotes() {
        let mut machine = FailoverStateMachine::new(3).unwrap();
        for _ in 0..3 {
            machine.observe(InPrimary);
        }
        assert_eq!(machine.state(), FailoverState::Primary);

        let obs = machine.observe(InSecondary);
        assert_eq!(obs.confidence, 0);
        assert_eq!(obs.transition, Some(FailoverState::Secondary));
        assert_eq!(obs.state, FailoverState::Secondary);

        let again = machine.observe(InSecondary);
        assert_eq!(again.transition, None);
    }

    #[test]
    fn test_partial_recovery_does_not_demote_or_promote() {
        let mut machine = FailoverStateMachine::new(4).unwrap();
        machine.observe(InPrimary);
        machine.observe(InPrimary);
        assert_eq!(machine.state(), FailoverState::Primary);

        machine.observe(InSecondary);
        let obs = machine.observe(InPrimary);
        assert_eq!(obs.confidence, 1);
        assert_eq!(obs.transition, None);
        assert_eq!(obs.state, FailoverState::Secondary);
    }

    #[test]
    fn test_ambiguous_leaves_counter_untouched() {
        let mut machine = FailoverStateMachine::new(4).unwrap();
        let obs = machine.observe(Ambiguous);
        assert_eq!(obs, Observation {
            confidence: 2,
            transition: None,
            state: FailoverState::Secondary,
        });
    }

    #[test]
    fn test_failure_demotes_primary_once() {
        let mut machine = FailoverStateMachine::new(2).unwrap();
        machine.observe(InPrimary);
        assert_eq!(machine.state(), FailoverState::Primary);

        let obs = machine.observe_failure();
        assert_eq!(obs.confidence, 0);
        assert_eq!(obs.transition, Some(FailoverState::Secondary));
        assert_eq!(obs.state, FailoverState::Secondary);

        for _ in 0..2 {
            let again = machine.observe_failure();
            assert_eq!(again.transition, None);
            assert_eq!(again.state, FailoverState::Secondary);
        }
    }

    #[test]
    fn test_failure_while_secondary_only_resets() {
        let mut machine = FailoverStateMachine::new(4).unwrap();
        let obs = machine.observe_failure();
        assert_eq!(obs, Observation {
            confidence: 0,
            transition: None,
            state: FailoverState::Secondary,
        });
    }
}
