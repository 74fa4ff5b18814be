//! Failed-attempt tracking and lockout enforcement.
//!
//! The gate is an explicit authentication check, separate from the
//! encryption path: callers consult it before admitting an identity to
//! protected operations. `protect`/`unprotect` themselves never consult it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::policy::SecurityPolicy;

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    /// The identity is locked out until the given instant.
    Locked { until: DateTime<Utc> },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Per-identity failed-attempt counters and lockout expiries.
pub struct AccessGate {
    policy: Arc<SecurityPolicy>,
    failed_attempts: DashMap<String, u32>,
    lockouts: DashMap<String, DateTime<Utc>>,
}

impl AccessGate {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self {
            policy,
            failed_attempts: DashMap::new(),
            lockouts: DashMap::new(),
        }
    }

    /// Checks whether `identity` may proceed. An expired lockout is cleared
    /// together with the identity's counter.
    pub fn check(&self, identity: &str) -> AccessDecision {
        if let Some(entry) = self.lockouts.get(identity) {
            let until = *entry.value();
            drop(entry);

            if Utc::now() < until {
                return AccessDecision::Locked { until };
            }
            self.lockouts.remove(identity);
            self.failed_attempts.remove(identity);
        }
        AccessDecision::Allowed
    }

    /// Records a failed attempt; imposes a lockout once the policy threshold
    /// is reached and returns the resulting decision.
    pub fn record_failure(&self, identity: &str) -> AccessDecision {
        let attempts = {
            let mut entry = self.failed_attempts.entry(identity.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if attempts >= self.policy.max_failed_attempts {
            let until =
                Utc::now() + Duration::seconds(self.policy.lockout_duration_seconds as i64);
            self.lockouts.insert(identity.to_string(), until);
            tracing::warn!(identity, attempts, %until, "identity locked out");
            return AccessDecision::Locked { until };
        }
        AccessDecision::Allowed
    }

    /// Clears the identity's counter and any lockout after a success.
    pub fn record_success(&self, identity: &str) {
        self.failed_attempts.remove(identity);
        self.lockouts.remove(identity);
    }

    /// Number of lockouts that have not yet expired.
    pub fn active_lockouts(&self) -> usize {
        let now = Utc::now();
        self.lockouts.iter().filter(|entry| *entry.value() > now).count()
    }

    /// Sum of all outstanding failed-attempt counters.
    pub fn total_failed_attempts(&self) -> u64 {
        self.failed_attempts
            .iter()
            .map(|entry| u64::from(*entry.value()))
            .sum()
    }
}
