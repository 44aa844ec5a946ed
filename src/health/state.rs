//! Backend health state machine.
//!
//! # States
//! - Unknown: freshly registered, still eligible for traffic
//! - Healthy: backend receives traffic
//! - Unhealthy: backend excluded from selection
//!
//! # State Transitions
//! ```text
//! * → Unhealthy: consecutive failures >= unhealthy_threshold
//! * → Healthy:   consecutive successes >= healthy_threshold
//! ```
//!
//! Counters reset on the opposite outcome, so a single flap does not
//! move the state.

use serde::{Deserialize, Serialize};

/// Health state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    /// Unknown and Healthy backends take traffic.
    pub fn is_eligible(self) -> bool {
        self != HealthState::Unhealthy
    }
}

/// Consecutive-outcome thresholds for probe results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub healthy: u32,
    pub unhealthy: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            healthy: 2,
            unhealthy: 3,
        }
    }
}

/// A state change produced by a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthState,
    pub to: HealthState,
}

/// Per-backend hysteresis counters.
#[derive(Debug, Clone, Default)]
pub struct HealthTracker {
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl HealthTracker {
    /// Record a successful probe; returns the new state if it changes.
    pub fn mark_success(&mut self, current: HealthState, thresholds: Thresholds) -> Option<HealthState> {
        self.consecutive_failures = 0;
        if current == HealthState::Healthy {
            return None;
        }

        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        if self.consecutive_successes >= thresholds.healthy {
            self.consecutive_successes = 0;
            return Some(HealthState::Healthy);
        }
        None
    }

    /// Record a failed probe; returns the new state if it changes.
    pub fn mark_failure(&mut self, current: HealthState, thresholds: Thresholds) -> Option<HealthState> {
        self.consecutive_successes = 0;
        if current == HealthState::Unhealthy {
            return None;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= thresholds.unhealthy {
            self.consecutive_failures = 0;
            return Some(HealthState::Unhealthy);
        }
        None
    }

    /// Forget accumulated outcomes (after a manual override).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_need_threshold() {
        let mut tracker = HealthTracker::default();
        let t = Thresholds { healthy: 2, unhealthy: 3 };

        assert_eq!(tracker.mark_failure(HealthState::Healthy, t), None);
        assert_eq!(tracker.mark_failure(HealthState::Healthy, t), None);
        assert_eq!(
            tracker.mark_failure(HealthState::Healthy, t),
            Some(HealthState::Unhealthy)
        );
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut tracker = HealthTracker::default();
        let t = Thresholds { healthy: 2, unhealthy: 2 };

        tracker.mark_failure(HealthState::Unknown, t);
        tracker.mark_success(HealthState::Unknown, t);
        // streak broken, one more failure is not enough
        assert_eq!(tracker.mark_failure(HealthState::Unknown, t), None);
    }

    #[test]
    fn test_recovery() {
        let mut tracker = HealthTracker::default();
        let t = Thresholds { healthy: 2, unhealthy: 1 };

        assert_eq!(tracker.mark_success(HealthState::Unhealthy, t), None);
        assert_eq!(
            tracker.mark_success(HealthState::Unhealthy, t),
            Some(HealthState::Healthy)
        );
        assert_eq!(tracker.mark_success(HealthState::Healthy, t), None);
    }

    #[test]
    fn test_eligibility() {
        assert!(HealthState::Unknown.is_eligible());
        assert!(HealthState::Healthy.is_eligible());
        assert!(!HealthState::Unhealthy.is_eligible());
    }
}
