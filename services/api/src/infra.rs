use admissions::workflows::admissions::{
    ActivityAction, ActivityEvent, AuditError, AuditSink, MemoryAuditLog,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Audit sink that writes each event to the `audit` log target.
///
/// The long-running server only logs; a retained trail is opt-in for short runs that read it
/// back.
#[derive(Default)]
pub(crate) struct TracingAuditSink {
    trail: Option<MemoryAuditLog>,
}

impl TracingAuditSink {
    pub(crate) fn retaining() -> Self {
        Self {
            trail: Some(MemoryAuditLog::new()),
        }
    }

    pub(crate) fn events(&self) -> Vec<ActivityEvent> {
        self.trail.as_ref().map(MemoryAuditLog::events).unwrap_or_default()
    }

    pub(crate) fn count(&self, action: ActivityAction) -> usize {
        self.trail.as_ref().map_or(0, |trail| trail.count(action))
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: ActivityEvent) -> Result<(), AuditError> {
        info!(
            target: "audit",
            action = event.action.label(),
            actor = %event.actor,
            college_id = %event.college_id,
            entity = %event.entity,
            before = event.before.map(|status| status.label()),
            after = event.after.map(|status| status.label()),
            "activity recorded"
        );
        match &self.trail {
            Some(trail) => trail.record(event),
            None => Ok(()),
        }
    }
}
