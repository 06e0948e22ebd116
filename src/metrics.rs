//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! The library does not depend on a metrics backend. Implement
//! [`MetricsSink`] to forward evaluation events to Prometheus,
//! OpenTelemetry or anything else, and install it once with [`set_sink`]:
//!
//! ```ignore
//! use netreach_core::metrics::{EvaluationStats, MetricsSink};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct DenialCounter(AtomicU64);
//!
//! impl MetricsSink for DenialCounter {
//!     fn on_evaluation(&self, stats: &EvaluationStats) {
//!         if !stats.allowed {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! netreach_core::metrics::set_sink(Arc::new(DenialCounter(AtomicU64::new(0))));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

use crate::types::Check;

/// Snapshot of one engine evaluation, passed to [`MetricsSink::on_evaluation`].
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationStats {
    /// Wall-clock time for the whole evaluation.
    pub duration: Duration,
    /// Whether every executed check passed.
    pub allowed: bool,
    pub source_vpc: String,
    pub destination_vpc: String,
    /// The check that decided a denial.
    pub failed_check: Option<Check>,
}

/// Per-check timing of one evaluation, in milliseconds. Checks that did not
/// run report zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationPhases {
    pub network_acl_ms: f64,
    pub security_group_ms: f64,
    pub route_table_ms: f64,
    pub nat_gateway_ms: f64,
    pub total_ms: f64,
}

impl EvaluationPhases {
    /// Time not accounted for by any check.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms
            - (self.network_acl_ms + self.security_group_ms + self.route_table_ms + self.nat_gateway_ms)
    }

    pub(crate) fn slot(&mut self, check: Check) -> &mut f64 {
        match check {
            Check::NetworkAcl => &mut self.network_acl_ms,
            Check::SecurityGroup => &mut self.security_group_ms,
            Check::RouteTable => &mut self.route_table_ms,
            Check::NatGateway => &mut self.nat_gateway_ms,
        }
    }
}

/// Consumer of evaluation metrics.
///
/// Called synchronously on the evaluation path, so implementations must be
/// cheap and `Send + Sync`.
pub trait MetricsSink: Send + Sync {
    /// Called after every evaluation, allowed or not.
    fn on_evaluation(&self, stats: &EvaluationStats);

    /// Called with the per-check breakdown. Does nothing unless overridden.
    fn on_evaluation_phases(&self, _stats: &EvaluationStats, _phases: &EvaluationPhases) {}
}

/// Until a sink is installed, evaluations are not reported anywhere.
static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

/// Install the global metrics sink.
///
/// The sink can be set once; later calls are ignored with a warning.
/// Evaluations that finished before installation are not replayed.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            event = "Metrics",
            phase = "SetSink",
            "Metrics sink was already initialized. Ignoring subsequent set_sink call."
        );
    }
}

pub fn has_sink() -> bool {
    SINK.get().is_some()
}

pub(crate) fn record_evaluation(stats: &EvaluationStats, phases: &EvaluationPhases) {
    if let Some(sink) = SINK.get() {
        sink.on_evaluation(stats);
        sink.on_evaluation_phases(stats, phases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> EvaluationStats {
        EvaluationStats {
            duration: Duration::from_millis(42),
            allowed: false,
            source_vpc: "vpc-app".to_string(),
            destination_vpc: "vpc-db".to_string(),
            failed_check: Some(Check::RouteTable),
        }
    }

    #[test]
    fn test_evaluation_stats_serialization() {
        insta::assert_json_snapshot!(stats(), @r#"
        {
          "duration": {
            "secs": 0,
            "nanos": 42000000
          },
          "allowed": false,
          "source_vpc": "vpc-app",
          "destination_vpc": "vpc-db",
          "failed_check": "route_table"
        }
        "#);
    }

    #[test]
    fn test_overhead() {
        let mut phases = EvaluationPhases {
            total_ms: 10.0,
            ..Default::default()
        };
        *phases.slot(Check::NetworkAcl) += 2.0;
        *phases.slot(Check::RouteTable) += 3.0;
        assert!((phases.overhead_ms() - 5.0).abs() < f64::EPSILON);
    }

    struct CountOnly;

    impl MetricsSink for CountOnly {
        fn on_evaluation(&self, _stats: &EvaluationStats) {}
    }

    #[test]
    fn test_phases_hook_defaults_to_no_op() {
        CountOnly.on_evaluation_phases(&stats(), &EvaluationPhases::default());
    }
}
