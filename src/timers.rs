//! Per-check timing for the reachability pipeline.

use std::time::Instant;

use tracing::trace;

use crate::metrics::EvaluationPhases;
use crate::types::Check;

/// Adds the time spent in one check to its slot of [`EvaluationPhases`]
/// when dropped, so early returns are still counted.
///
/// ```rust,ignore
/// let mut phases = EvaluationPhases::default();
/// {
///     let _timer = CheckTimer::start(Check::RouteTable, &mut phases);
///     // evaluate routes
/// }
/// assert!(phases.route_table_ms > 0.0);
/// ```
pub(crate) struct CheckTimer<'a> {
    check: Check,
    start: Instant,
    phases: &'a mut EvaluationPhases,
}

impl<'a> CheckTimer<'a> {
    pub(crate) fn start(check: Check, phases: &'a mut EvaluationPhases) -> Self {
        CheckTimer {
            check,
            start: Instant::now(),
            phases,
        }
    }
}

impl Drop for CheckTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        *self.phases.slot(self.check) += elapsed_ms;
        trace!(event = "Timer", check = %self.check, elapsed_ms);
    }
}
