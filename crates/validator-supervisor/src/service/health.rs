//! # Health Checker
//!
//! Bounded liveness polling and the named diagnostic probes.
//!
//! `poll` makes at most `max_attempts` calls and sleeps `interval` only
//! between attempts. The whole poll, slow requests included, is cut off at
//! `RetryPolicy::budget()`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::health::{HealthStatus, Probe, ProbeReport, RetryPolicy};
use crate::ports::outbound::RpcTransport;

pub struct HealthChecker {
    transport: Arc<dyn RpcTransport>,
}

impl HealthChecker {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Poll `getHealth` until it succeeds or the attempt budget runs out.
    pub async fn poll(&self, policy: RetryPolicy) -> HealthStatus {
        let budget = policy.budget();
        if budget.is_zero() {
            return self.attempt_all(policy).await;
        }
        match tokio::time::timeout(budget, self.attempt_all(policy)).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    endpoint = %self.endpoint(),
                    budget = ?budget,
                    "node not responding within health poll budget"
                );
                HealthStatus::NotResponding
            }
        }
    }

    async fn attempt_all(&self, policy: RetryPolicy) -> HealthStatus {
        for attempt in 1..=policy.max_attempts {
            match self.transport.call(Probe::Health.method()).await {
                Ok(_) => {
                    debug!(attempt, "node responding");
                    return HealthStatus::Responding;
                }
                Err(e) => {
                    debug!(attempt, max = policy.max_attempts, error = %e, "health check failed");
                }
            }
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        warn!(
            endpoint = %self.endpoint(),
            attempts = policy.max_attempts,
            "node not responding after health poll budget"
        );
        HealthStatus::NotResponding
    }

    /// Run one named probe.
    pub async fn probe(&self, probe: Probe) -> ProbeReport {
        match self.transport.call(probe.method()).await {
            Ok(value) => ProbeReport::pass(probe, &value),
            Err(e) => ProbeReport::fail(probe, e),
        }
    }

    /// Run every probe in order. A failure never skips the remaining probes.
    pub async fn run_probes(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::with_capacity(Probe::ALL.len());
        for probe in Probe::ALL {
            reports.push(self.probe(probe).await);
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::adapters::rpc_client::REQUEST_TIMEOUT;
    use crate::domain::errors::RpcError;
    use crate::test_utils::MockRpcTransport;

    #[tokio::test(start_paused = true)]
    async fn test_poll_is_bounded_when_node_is_down() {
        let transport = MockRpcTransport::down();
        let checker = HealthChecker::new(Arc::new(transport.clone()));
        let policy = RetryPolicy::new(5, Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let status = checker.poll(policy).await;

        assert_eq!(status, HealthStatus::NotResponding);
        assert_eq!(transport.call_count(), 5);
        assert_eq!(started.elapsed(), policy.max_sleep());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_is_bounded_when_node_hangs() {
        let transport = MockRpcTransport::down();
        transport.stall(REQUEST_TIMEOUT);
        let checker = HealthChecker::new(Arc::new(transport.clone()));
        let policy = RetryPolicy::default();

        let started = tokio::time::Instant::now();
        let status = checker.poll(policy).await;

        assert_eq!(status, HealthStatus::NotResponding);
        assert!(started.elapsed() <= policy.budget());
        assert!(transport.call_count() < policy.max_attempts as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_at_first_success() {
        let transport = MockRpcTransport::down();
        transport.respond_after(3);
        let checker = HealthChecker::new(Arc::new(transport.clone()));

        let status = checker.poll(RetryPolicy::new(30, Duration::from_secs(2))).await;
        assert_eq!(status, HealthStatus::Responding);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_probes_run_independently() {
        let transport = MockRpcTransport::up();
        transport.fail_method("getSlot", RpcError::Rpc {
            code: -32002,
            message: "slot unavailable".into(),
        });
        let checker = HealthChecker::new(Arc::new(transport.clone()));

        let reports = checker.run_probes().await;
        let verdicts: Vec<(Probe, bool)> = reports.iter().map(|r| (r.probe, r.passed)).collect();
        assert_eq!(
            verdicts,
            vec![(Probe::Health, true), (Probe::Slot, false), (Probe::Version, true)]
        );
        assert_eq!(transport.methods(), vec!["getHealth", "getSlot", "getVersion"]);
    }

    #[tokio::test]
    async fn test_probes_against_dead_node_all_fail() {
        let checker = HealthChecker::new(Arc::new(MockRpcTransport::down()));
        let reports = checker.run_probes().await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| !r.passed));
    }
}
