use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use shiftfree::leave::{InMemoryLeaveStore, LeaveService, TracingNotifier};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Leave service wired to the process-local store and the logging notifier.
pub(crate) type LocalLeaveService = LeaveService<InMemoryLeaveStore, TracingNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn local_leave_service() -> Arc<LocalLeaveService> {
    Arc::new(LeaveService::new(
        Arc::new(InMemoryLeaveStore::new()),
        Arc::new(TracingNotifier),
    ))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
