use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::domain::{LeaveBalance, LeaveRequest, LeaveStatus, TenantId};
use super::evaluation::{evaluate, BotDecision, EvaluationContext};
use super::ledger::{self, LedgerOp, LedgerOutcome};
use super::repository::{BalanceFilter, DecisionNotifier, LeaveStore, RequestFilter, StoreError};
use super::service::LeaveService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepSkip {
    NoStore,
    AlreadyRunning,
}

/// Tally of one sweep pass over a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub tenant: TenantId,
    pub evaluated: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Verdicts lost to a concurrent writer that moved the request off PENDING first.
    pub contended: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SweepSkip>,
}

impl SweepReport {
    fn empty(tenant: TenantId) -> Self {
        Self {
            tenant,
            evaluated: 0,
            approved: 0,
            rejected: 0,
            contended: 0,
            failed: 0,
            skipped: None,
        }
    }

    pub fn idle(tenant: TenantId) -> Self {
        Self {
            skipped: Some(SweepSkip::NoStore),
            ..Self::empty(tenant)
        }
    }

    pub fn overlapping(tenant: TenantId) -> Self {
        Self {
            skipped: Some(SweepSkip::AlreadyRunning),
            ..Self::empty(tenant)
        }
    }

    /// Requests whose status this pass committed.
    pub fn changed(&self) -> usize {
        self.approved + self.rejected
    }
}

/// One pass over the tenant's PENDING requests.
///
/// Requests are decided one at a time against a working copy of the tenant's requests and
/// balances; each committed verdict is written into that copy before the next request is
/// evaluated, so the first of two conflicting requests wins.
pub async fn sweep_tenant<S>(store: &S, tenant: &TenantId) -> Result<SweepReport, StoreError>
where
    S: LeaveStore + ?Sized,
{
    let mut report = SweepReport::empty(tenant.clone());

    let mut pending = store
        .list_requests(tenant, &RequestFilter::with_status(LeaveStatus::Pending))
        .await?;
    if pending.is_empty() {
        debug!(%tenant, "no pending requests; sweep tick is a no-op");
        return Ok(report);
    }
    pending.sort_by_key(|request| request.requested_at);

    let mut requests = store.list_requests(tenant, &RequestFilter::all()).await?;
    let mut balances = store.list_balances(tenant, &BalanceFilter::all()).await?;
    let rules = store.list_rules(tenant).await?;
    let roster = store.list_employees(tenant).await?;

    for candidate in &pending {
        let requester_balances: Vec<LeaveBalance> = balances
            .iter()
            .filter(|balance| balance.user_id == candidate.user_id)
            .cloned()
            .collect();
        let decision = evaluate(
            candidate,
            &EvaluationContext {
                requests: &requests,
                rules: &rules,
                balances: &requester_balances,
                roster: &roster,
            },
        );
        report.evaluated += 1;

        if decision == BotDecision::Pending {
            continue;
        }

        let next = decision.status();
        match store
            .update_request_status(tenant, &candidate.id, LeaveStatus::Pending, next)
            .await
        {
            Ok(()) => {}
            Err(StoreError::StatusMismatch { actual }) => {
                debug!(%tenant, request_id = %candidate.id, %actual, "request decided elsewhere during sweep");
                set_status(&mut requests, candidate, actual);
                report.contended += 1;
                continue;
            }
            Err(StoreError::NotFound) => {
                debug!(%tenant, request_id = %candidate.id, "request removed during sweep");
                report.contended += 1;
                continue;
            }
            Err(err) => {
                warn!(%tenant, request_id = %candidate.id, error = %err, "sweep could not commit verdict");
                report.failed += 1;
                continue;
            }
        }

        set_status(&mut requests, candidate, next);
        match &decision {
            BotDecision::Rejected(reason) => {
                info!(%tenant, request_id = %candidate.id, reason = %reason.summary(), "sweep rejected request");
                report.rejected += 1;
            }
            _ => {
                info!(%tenant, request_id = %candidate.id, "sweep approved request");
                report.approved += 1;
            }
        }

        if next != LeaveStatus::Approved {
            continue;
        }
        match ledger::adjust(
            store,
            tenant,
            &candidate.user_id,
            candidate.leave_type,
            candidate.days,
            LedgerOp::Deduct,
        )
        .await
        {
            Ok(LedgerOutcome::Applied(updated)) => {
                if let Some(row) = balances.iter_mut().find(|row| row.id == updated.id) {
                    *row = updated;
                }
            }
            Ok(LedgerOutcome::NoBalance) => {}
            Err(err) => {
                error!(%tenant, request_id = %candidate.id, error = %err, "approved during sweep but balance deduction failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn set_status(requests: &mut [LeaveRequest], candidate: &LeaveRequest, status: LeaveStatus) {
    if let Some(request) = requests.iter_mut().find(|request| request.id == candidate.id) {
        request.status = status;
    }
}

/// Drives [`LeaveService::run_sweep`] for every tenant on a fixed interval.
pub struct SweepScheduler<S, N> {
    service: Arc<LeaveService<S, N>>,
    interval: Duration,
}

impl<S, N> SweepScheduler<S, N>
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    pub fn new(service: Arc<LeaveService<S, N>>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Sweep every known tenant once.
    pub async fn tick(&self) -> Vec<SweepReport> {
        let tenants = match self.service.tenants().await {
            Ok(tenants) => tenants,
            Err(err) => {
                debug!(error = %err, "tenant listing unavailable; sweep tick skipped");
                return Vec::new();
            }
        };

        let mut reports = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            match self.service.run_sweep(&tenant).await {
                Ok(report) => reports.push(report),
                Err(err) => error!(%tenant, error = %err, "sweep failed"),
            }
        }
        reports
    }

    /// Start the timer loop. The first tick fires one full interval after spawning.
    pub fn spawn(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reports = self.tick().await;
                        debug!(tenants = reports.len(), "sweep tick finished");
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("sweep scheduler stopped");
        });

        info!(interval_secs = interval.as_secs(), "sweep scheduler started");
        SweepHandle { shutdown_tx, task }
    }
}

/// Dropping the handle without calling [`SweepHandle::shutdown`] also ends the loop.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop the loop and wait for an in-progress tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            error!(error = %err, "sweep scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
