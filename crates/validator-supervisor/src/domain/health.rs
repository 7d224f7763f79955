//! # Health Domain
//!
//! Liveness classification, retry bounds, and named probe results.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Result of a liveness poll. Computed fresh on every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No poll was attempted (e.g. nothing is running).
    Unknown,
    /// The node answered the liveness call.
    Responding,
    /// Every attempt within the retry budget failed.
    NotResponding,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Responding => "responding",
            HealthStatus::NotResponding => "not responding",
        };
        f.write_str(s)
    }
}

/// Bounded fixed-interval retry budget.
///
/// At most `max_attempts` calls are made, with `interval` between consecutive
/// attempts, and the whole poll is cut off after `max_attempts * interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// A single attempt with no sleep.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wall-clock bound on a whole poll: `max_attempts * interval`.
    /// Zero for `once()`, where only the transport's own timeout applies.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Upper bound on total time spent sleeping between attempts.
    pub fn max_sleep(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(2))
    }
}

/// Named liveness probes run by the `test` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Health,
    Slot,
    Version,
}

impl Probe {
    /// Probes in the order they are run.
    pub const ALL: [Probe; 3] = [Probe::Health, Probe::Slot, Probe::Version];

    /// JSON-RPC method name.
    pub fn method(self) -> &'static str {
        match self {
            Probe::Health => "getHealth",
            Probe::Slot => "getSlot",
            Probe::Version => "getVersion",
        }
    }
}

/// Outcome of one probe. Failure of one probe never affects another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub probe: Probe,
    pub method: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl ProbeReport {
    pub fn pass(probe: Probe, value: &serde_json::Value) -> Self {
        let detail = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            probe,
            method: probe.method(),
            passed: true,
            detail,
        }
    }

    pub fn fail(probe: Probe, reason: impl fmt::Display) -> Self {
        Self {
            probe,
            method: probe.method(),
            passed: false,
            detail: reason.to_string(),
        }
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "{:<10} {} {}", self.method, verdict, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_millis(200));
        assert_eq!(policy.max_sleep(), Duration::from_millis(800));
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts, 1);
        assert_eq!(RetryPolicy::once().max_sleep(), Duration::ZERO);
        assert_eq!(RetryPolicy::default().budget(), Duration::from_secs(60));
        assert_eq!(RetryPolicy::once().budget(), Duration::ZERO);
    }

    #[test]
    fn test_probe_methods() {
        let methods: Vec<_> = Probe::ALL.iter().map(|p| p.method()).collect();
        assert_eq!(methods, ["getHealth", "getSlot", "getVersion"]);
    }

    #[test]
    fn test_probe_report_display() {
        let ok = ProbeReport::pass(Probe::Slot, &serde_json::json!(42));
        assert_eq!(ok.to_string(), "getSlot    PASS 42");

        let failed = ProbeReport::fail(Probe::Health, "connection refused");
        assert!(failed.to_string().contains("FAIL connection refused"));
    }
}
