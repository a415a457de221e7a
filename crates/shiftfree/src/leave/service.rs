use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::StatusCode;
use chrono::FixedOffset;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::{SnapshotCache, TenantSnapshot};
use super::clock::{Clock, SystemClock};
use super::domain::{
    AutoApprovalRule, CompanyPolicy, Department, DepartmentId, Employee, EmployeeProfile,
    LeaveRequest, LeaveStatus, LeaveSubmission, LeaveType, NewEmployee, RequestId, RuleDraft,
    RuleId, TenantId, UserId, MAX_DAYS,
};
use super::evaluation::{active_rule_for, evaluate, BotDecision, EvaluationContext};
use super::ledger::{self, LedgerError, LedgerOp, LedgerOutcome};
use super::repository::{
    BalanceFilter, DecisionNotice, DecisionNotifier, LeaveStore, StoreError,
};
use super::sweep::{self, SweepReport};

/// Request lifecycle controller: bot verdicts at submission, manager decisions, ledger
/// bookkeeping, and the administrative policy and rule operations around them.
pub struct LeaveService<S, N> {
    store: Option<Arc<S>>,
    notifier: Arc<N>,
    cache: SnapshotCache,
    clock: Arc<dyn Clock>,
    sweeps_in_flight: Mutex<HashSet<TenantId>>,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DEPARTMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("lr-{id:06}"))
}

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

fn next_department_id() -> DepartmentId {
    let id = DEPARTMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DepartmentId(format!("dept-{id:06}"))
}

/// What the caller learns after submitting a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub request: LeaveRequest,
    pub decision: BotDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerOutcome>,
}

/// Committed status transition and its ledger effect, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub request_id: RequestId,
    pub previous: LeaveStatus,
    pub current: LeaveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyUpdate {
    pub policy: CompanyPolicy,
    pub balances_updated: usize,
}

impl<S, N> LeaveService<S, N>
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self::build(Some(store), notifier)
    }

    /// Service without a backing store. Every operation reports
    /// [`LeaveServiceError::StoreUnavailable`] and leaves no trace.
    pub fn disconnected(notifier: Arc<N>) -> Self {
        Self::build(None, notifier)
    }

    fn build(store: Option<Arc<S>>, notifier: Arc<N>) -> Self {
        Self {
            store,
            notifier,
            cache: SnapshotCache::new(),
            clock: Arc::new(SystemClock),
            sweeps_in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&S, LeaveServiceError> {
        self.store
            .as_deref()
            .ok_or(LeaveServiceError::StoreUnavailable)
    }

    pub async fn tenants(&self) -> Result<Vec<TenantId>, LeaveServiceError> {
        Ok(self.store()?.list_tenants().await?)
    }

    /// Evaluate a new request with the bot and persist it with the verdict already applied.
    pub async fn submit_request(
        &self,
        tenant: &TenantId,
        submission: LeaveSubmission,
    ) -> Result<SubmissionOutcome, LeaveServiceError> {
        let store = self.store()?;

        if submission.end_date < submission.start_date {
            return Err(LeaveServiceError::InvalidRequest(format!(
                "end date {} precedes start date {}",
                submission.end_date, submission.start_date
            )));
        }
        let days = submission.span_days();
        day_count("leave span", days, 1)?;
        let utc_offset_minutes = match submission.utc_offset_minutes {
            Some(minutes) => validate_offset(minutes)?,
            None => self.clock.local_offset().local_minus_utc() / 60,
        };

        let snapshot = self.cache.get_or_load(store, tenant).await?;
        let user_name = snapshot
            .employee(&submission.user_id)
            .map(|employee| employee.name.clone())
            .unwrap_or_else(|| submission.user_id.to_string());

        let pending = LeaveRequest {
            id: next_request_id(),
            tenant_id: tenant.clone(),
            user_id: submission.user_id,
            user_name,
            leave_type: submission.leave_type,
            start_date: submission.start_date,
            end_date: submission.end_date,
            days,
            reason: submission.reason,
            status: LeaveStatus::Pending,
            requested_at: self.clock.now(),
            utc_offset_minutes,
        };

        let balances = snapshot.balances_for(&pending.user_id);
        let decision = evaluate(
            &pending,
            &EvaluationContext {
                requests: &snapshot.requests,
                rules: &snapshot.rules,
                balances: &balances,
                roster: &snapshot.employees,
            },
        );

        let request = LeaveRequest {
            status: decision.status(),
            ..pending
        };
        let stored = store.insert_request(request).await?;

        let ledger = if decision == BotDecision::Approved {
            Some(
                ledger::adjust(
                    store,
                    tenant,
                    &stored.user_id,
                    stored.leave_type,
                    stored.days,
                    LedgerOp::Deduct,
                )
                .await?,
            )
        } else {
            None
        };

        info!(
            %tenant,
            request_id = %stored.id,
            user_id = %stored.user_id,
            leave_type = %stored.leave_type,
            days = stored.days,
            status = %stored.status,
            "leave request submitted"
        );

        self.notify(notice_for(&stored, &decision)).await;
        self.refresh_after_write(tenant).await;

        Ok(SubmissionOutcome {
            request: stored,
            decision,
            ledger,
        })
    }

    /// Manager decision. The ledger follows the transition, not the target state.
    pub async fn decide_request(
        &self,
        tenant: &TenantId,
        request_id: &RequestId,
        next: LeaveStatus,
    ) -> Result<StatusChange, LeaveServiceError> {
        let store = self.store()?;

        let cached = self
            .cache
            .get(tenant)
            .await
            .and_then(|snapshot| snapshot.request(request_id).cloned());
        let mut request = match cached {
            Some(request) => request,
            None => store
                .get_request(tenant, request_id)
                .await?
                .ok_or_else(|| LeaveServiceError::RequestNotFound(request_id.clone()))?,
        };

        let mut retried = false;
        loop {
            match store
                .update_request_status(tenant, request_id, request.status, next)
                .await
            {
                Ok(()) => break,
                Err(StoreError::StatusMismatch { actual }) if !retried => {
                    debug!(
                        %tenant,
                        %request_id,
                        assumed = %request.status,
                        %actual,
                        "cached status was stale; retrying against the stored status"
                    );
                    request.status = actual;
                    retried = true;
                }
                Err(StoreError::StatusMismatch { actual }) => {
                    return Err(LeaveServiceError::ConcurrentUpdate {
                        request_id: request_id.clone(),
                        actual,
                    });
                }
                Err(StoreError::NotFound) => {
                    return Err(LeaveServiceError::RequestNotFound(request_id.clone()));
                }
                Err(other) => return Err(other.into()),
            }
        }

        let previous = request.status;
        let ledger = match ledger::transition_effect(previous, next) {
            Some(op) => Some(
                ledger::adjust(
                    store,
                    tenant,
                    &request.user_id,
                    request.leave_type,
                    request.days,
                    op,
                )
                .await?,
            ),
            None => None,
        };

        info!(%tenant, %request_id, %previous, current = %next, "leave request status changed");
        self.refresh_after_write(tenant).await;

        Ok(StatusChange {
            request_id: request_id.clone(),
            previous,
            current: next,
            ledger,
        })
    }

    /// Remove a request that nobody has decided yet.
    pub async fn delete_request(
        &self,
        tenant: &TenantId,
        request_id: &RequestId,
    ) -> Result<(), LeaveServiceError> {
        let store = self.store()?;

        match store
            .delete_request(tenant, request_id, LeaveStatus::Pending)
            .await
        {
            Ok(()) => {}
            Err(StoreError::StatusMismatch { actual }) => {
                return Err(LeaveServiceError::NotDeletable { status: actual });
            }
            Err(StoreError::NotFound) => {
                return Err(LeaveServiceError::RequestNotFound(request_id.clone()));
            }
            Err(other) => return Err(other.into()),
        }

        info!(%tenant, %request_id, "pending leave request deleted");
        self.refresh_after_write(tenant).await;
        Ok(())
    }

    pub async fn adjust_balance(
        &self,
        tenant: &TenantId,
        user_id: &UserId,
        leave_type: LeaveType,
        days: i32,
        op: LedgerOp,
    ) -> Result<LedgerOutcome, LeaveServiceError> {
        let store = self.store()?;
        day_count("adjustment", days, 1)?;

        let outcome = ledger::adjust(store, tenant, user_id, leave_type, days, op).await?;
        self.refresh_after_write(tenant).await;
        Ok(outcome)
    }

    /// Manual correction of one balance row; `remaining` is derived.
    pub async fn set_user_balance(
        &self,
        tenant: &TenantId,
        user_id: &UserId,
        leave_type: LeaveType,
        total: i32,
        used: i32,
    ) -> Result<LedgerOutcome, LeaveServiceError> {
        let store = self.store()?;
        day_count("total", total, 0)?;
        day_count("used", used, 0)?;

        let current = store
            .list_balances(tenant, &BalanceFilter::entry(user_id, leave_type))
            .await?
            .into_iter()
            .next();
        let Some(current) = current else {
            return Ok(LedgerOutcome::NoBalance);
        };

        let updated = current
            .with_usage(total, used)
            .ok_or_else(|| LedgerError::OutOfRange {
                balance_id: current.id.clone(),
            })?;
        store
            .upsert_balances(tenant, vec![updated.clone()])
            .await?;

        info!(%tenant, %user_id, %leave_type, total, used, "balance corrected");
        self.refresh_after_write(tenant).await;
        Ok(LedgerOutcome::Applied(updated))
    }

    /// Store the policy and push the new totals to every policy-bucket balance,
    /// keeping what each user already used.
    pub async fn update_policy(
        &self,
        tenant: &TenantId,
        policy: CompanyPolicy,
    ) -> Result<PolicyUpdate, LeaveServiceError> {
        let store = self.store()?;
        validate_policy(&policy)?;

        let rows = store.list_balances(tenant, &BalanceFilter::all()).await?;
        let updated = ledger::apply_policy(&rows, &policy)?;
        store.put_policy(tenant, policy).await?;
        let balances_updated = updated.len();
        if !updated.is_empty() {
            store.upsert_balances(tenant, updated).await?;
        }

        info!(%tenant, ?policy, balances_updated, "company policy updated");
        self.refresh_after_write(tenant).await;
        Ok(PolicyUpdate {
            policy,
            balances_updated,
        })
    }

    /// Start a new leave year: totals from the current policy, usage reset to zero.
    pub async fn renew_yearly_balances(
        &self,
        tenant: &TenantId,
    ) -> Result<PolicyUpdate, LeaveServiceError> {
        let store = self.store()?;

        let policy = store.get_policy(tenant).await?.unwrap_or_default();
        let rows = store.list_balances(tenant, &BalanceFilter::all()).await?;
        let renewed = ledger::renew_rows(&rows, &policy)?;
        let balances_updated = renewed.len();
        if !renewed.is_empty() {
            store.upsert_balances(tenant, renewed).await?;
        }

        info!(%tenant, balances_updated, "yearly balances renewed");
        self.refresh_after_write(tenant).await;
        Ok(PolicyUpdate {
            policy,
            balances_updated,
        })
    }

    /// Add someone to the roster with opening balances from the company policy.
    pub async fn provision_employee(
        &self,
        tenant: &TenantId,
        new_employee: NewEmployee,
    ) -> Result<Employee, LeaveServiceError> {
        let store = self.store()?;

        let employee = store
            .insert_employee(Employee {
                id: new_employee.id,
                tenant_id: tenant.clone(),
                name: new_employee.name,
                email: new_employee.email,
                role: new_employee.role,
                job_title: new_employee.job_title,
                department: new_employee.department,
            })
            .await?;

        let policy = store.get_policy(tenant).await?.unwrap_or_default();
        store
            .upsert_balances(tenant, ledger::seed_balances(tenant, &employee.id, &policy))
            .await?;

        info!(%tenant, user_id = %employee.id, "employee provisioned");
        self.refresh_after_write(tenant).await;
        Ok(employee)
    }

    /// Replace a roster entry's profile. Balances and requests are untouched.
    pub async fn update_employee(
        &self,
        tenant: &TenantId,
        user_id: &UserId,
        profile: EmployeeProfile,
    ) -> Result<Employee, LeaveServiceError> {
        let store = self.store()?;

        let employee = Employee {
            id: user_id.clone(),
            tenant_id: tenant.clone(),
            name: profile.name,
            email: profile.email,
            role: profile.role,
            job_title: profile.job_title,
            department: profile.department,
        };
        match store.update_employee(employee.clone()).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                return Err(LeaveServiceError::EmployeeNotFound(user_id.clone()));
            }
            Err(other) => return Err(other.into()),
        }

        info!(%tenant, %user_id, job_title = ?employee.job_title, "employee updated");
        self.refresh_after_write(tenant).await;
        Ok(employee)
    }

    /// Drop someone from the roster together with their balances. Their requests stay as
    /// history.
    pub async fn remove_employee(
        &self,
        tenant: &TenantId,
        user_id: &UserId,
    ) -> Result<(), LeaveServiceError> {
        let store = self.store()?;

        match store.delete_employee(tenant, user_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                return Err(LeaveServiceError::EmployeeNotFound(user_id.clone()));
            }
            Err(other) => return Err(other.into()),
        }
        let balances_removed = store
            .delete_balances(tenant, &BalanceFilter::for_user(user_id))
            .await?;

        info!(%tenant, %user_id, balances_removed, "employee removed");
        self.refresh_after_write(tenant).await;
        Ok(())
    }

    pub async fn add_department(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> Result<Department, LeaveServiceError> {
        let store = self.store()?;
        let name = required_text("department name", name)?;

        let department = store
            .insert_department(Department {
                id: next_department_id(),
                tenant_id: tenant.clone(),
                name,
                roles: Vec::new(),
            })
            .await?;

        info!(%tenant, department_id = %department.id, name = %department.name, "department added");
        self.refresh_after_write(tenant).await;
        Ok(department)
    }

    pub async fn delete_department(
        &self,
        tenant: &TenantId,
        department_id: &DepartmentId,
    ) -> Result<(), LeaveServiceError> {
        let store = self.store()?;

        match store.delete_department(tenant, department_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                return Err(LeaveServiceError::DepartmentNotFound(department_id.clone()));
            }
            Err(other) => return Err(other.into()),
        }

        info!(%tenant, %department_id, "department deleted");
        self.refresh_after_write(tenant).await;
        Ok(())
    }

    /// Offer a job title in the department. Adding a title it already has is a no-op.
    pub async fn add_role_to_department(
        &self,
        tenant: &TenantId,
        department_id: &DepartmentId,
        role: &str,
    ) -> Result<Department, LeaveServiceError> {
        let role = required_text("role", role)?;
        self.edit_roles(tenant, department_id, |roles| {
            if !roles.contains(&role) {
                roles.push(role);
            }
        })
        .await
    }

    pub async fn remove_role_from_department(
        &self,
        tenant: &TenantId,
        department_id: &DepartmentId,
        role: &str,
    ) -> Result<Department, LeaveServiceError> {
        self.edit_roles(tenant, department_id, |roles| {
            roles.retain(|existing| existing != role)
        })
        .await
    }

    async fn edit_roles(
        &self,
        tenant: &TenantId,
        department_id: &DepartmentId,
        edit: impl FnOnce(&mut Vec<String>),
    ) -> Result<Department, LeaveServiceError> {
        let store = self.store()?;

        let mut department = store
            .list_departments(tenant)
            .await?
            .into_iter()
            .find(|department| &department.id == department_id)
            .ok_or_else(|| LeaveServiceError::DepartmentNotFound(department_id.clone()))?;
        edit(&mut department.roles);
        store.update_department(department.clone()).await?;

        info!(%tenant, %department_id, roles = ?department.roles, "department roles updated");
        self.refresh_after_write(tenant).await;
        Ok(department)
    }

    pub async fn add_rule(
        &self,
        tenant: &TenantId,
        draft: RuleDraft,
    ) -> Result<AutoApprovalRule, LeaveServiceError> {
        let store = self.store()?;
        validate_rule(&draft)?;

        let rules = store.list_rules(tenant).await?;
        if draft.enabled {
            ensure_single_active(&rules, draft.leave_type, None)?;
        }

        let rule = store
            .insert_rule(AutoApprovalRule {
                id: next_rule_id(),
                tenant_id: tenant.clone(),
                leave_type: draft.leave_type,
                enabled: draft.enabled,
                min_days_notice: draft.min_days_notice,
                max_duration: draft.max_duration,
                require_sufficient_balance: draft.require_sufficient_balance,
            })
            .await?;

        info!(%tenant, rule_id = %rule.id, leave_type = %rule.leave_type, "auto-approval rule added");
        self.refresh_after_write(tenant).await;
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        tenant: &TenantId,
        rule_id: &RuleId,
        draft: RuleDraft,
    ) -> Result<AutoApprovalRule, LeaveServiceError> {
        let store = self.store()?;
        validate_rule(&draft)?;

        let rules = store.list_rules(tenant).await?;
        let existing = find_rule(&rules, rule_id)?;
        if draft.enabled {
            ensure_single_active(&rules, draft.leave_type, Some(rule_id))?;
        }

        let rule = AutoApprovalRule {
            leave_type: draft.leave_type,
            enabled: draft.enabled,
            min_days_notice: draft.min_days_notice,
            max_duration: draft.max_duration,
            require_sufficient_balance: draft.require_sufficient_balance,
            ..existing.clone()
        };
        store.update_rule(rule.clone()).await?;

        info!(%tenant, %rule_id, "auto-approval rule updated");
        self.refresh_after_write(tenant).await;
        Ok(rule)
    }

    pub async fn toggle_rule(
        &self,
        tenant: &TenantId,
        rule_id: &RuleId,
    ) -> Result<AutoApprovalRule, LeaveServiceError> {
        let store = self.store()?;

        let rules = store.list_rules(tenant).await?;
        let existing = find_rule(&rules, rule_id)?;
        if !existing.enabled {
            ensure_single_active(&rules, existing.leave_type, Some(rule_id))?;
        }

        let rule = AutoApprovalRule {
            enabled: !existing.enabled,
            ..existing.clone()
        };
        store.update_rule(rule.clone()).await?;

        info!(%tenant, %rule_id, enabled = rule.enabled, "auto-approval rule toggled");
        self.refresh_after_write(tenant).await;
        Ok(rule)
    }

    pub async fn delete_rule(
        &self,
        tenant: &TenantId,
        rule_id: &RuleId,
    ) -> Result<(), LeaveServiceError> {
        let store = self.store()?;

        match store.delete_rule(tenant, rule_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                return Err(LeaveServiceError::RuleNotFound(rule_id.clone()));
            }
            Err(other) => return Err(other.into()),
        }

        info!(%tenant, %rule_id, "auto-approval rule deleted");
        self.refresh_after_write(tenant).await;
        Ok(())
    }

    /// Re-evaluate every pending request of the tenant. Overlapping passes for the same
    /// tenant are skipped rather than queued.
    pub async fn run_sweep(&self, tenant: &TenantId) -> Result<SweepReport, LeaveServiceError> {
        let Some(store) = self.store.as_deref() else {
            debug!(%tenant, "no store configured; sweep skipped");
            return Ok(SweepReport::idle(tenant.clone()));
        };

        let Some(_guard) = SweepGuard::acquire(&self.sweeps_in_flight, tenant) else {
            debug!(%tenant, "sweep already running for tenant; tick skipped");
            return Ok(SweepReport::overlapping(tenant.clone()));
        };

        let report = sweep::sweep_tenant(store, tenant).await?;
        if report.changed() > 0 {
            info!(
                %tenant,
                approved = report.approved,
                rejected = report.rejected,
                contended = report.contended,
                failed = report.failed,
                "sweep settled pending requests"
            );
            self.refresh_after_write(tenant).await;
        }
        Ok(report)
    }

    /// Cached tenant view, loading it on first use.
    pub async fn snapshot(
        &self,
        tenant: &TenantId,
    ) -> Result<Arc<TenantSnapshot>, LeaveServiceError> {
        let store = self.store()?;
        Ok(self.cache.get_or_load(store, tenant).await?)
    }

    pub async fn refresh(
        &self,
        tenant: &TenantId,
    ) -> Result<Arc<TenantSnapshot>, LeaveServiceError> {
        let store = self.store()?;
        Ok(self.cache.refresh(store, tenant).await?)
    }

    async fn refresh_after_write(&self, tenant: &TenantId) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        if let Err(err) = self.cache.refresh(store, tenant).await {
            warn!(%tenant, error = %err, "snapshot refresh failed; dropping cached view");
            self.cache.invalidate(tenant).await;
        }
    }

    async fn notify(&self, notice: DecisionNotice) {
        let request_id = notice.request_id().clone();
        if let Err(err) = self.notifier.notify(notice).await {
            warn!(%request_id, error = %err, "decision notification failed");
        }
    }
}

fn notice_for(request: &LeaveRequest, decision: &BotDecision) -> DecisionNotice {
    let request_id = request.id.clone();
    let user_id = request.user_id.clone();
    match decision {
        BotDecision::Approved => DecisionNotice::Approved {
            request_id,
            user_id,
        },
        BotDecision::Rejected(reason) => DecisionNotice::Rejected {
            request_id,
            user_id,
            reason: reason.clone(),
        },
        BotDecision::Pending => DecisionNotice::AwaitingManager {
            request_id,
            user_id,
        },
    }
}

fn day_count(field: &str, value: i32, min: i32) -> Result<i32, LeaveServiceError> {
    if (min..=MAX_DAYS).contains(&value) {
        return Ok(value);
    }
    Err(LeaveServiceError::InvalidRequest(format!(
        "{field} must be between {min} and {MAX_DAYS} day(s), got {value}"
    )))
}

fn validate_offset(minutes: i32) -> Result<i32, LeaveServiceError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .map(|_| minutes)
        .ok_or_else(|| {
            LeaveServiceError::InvalidRequest(format!(
                "utc offset of {minutes} minute(s) is out of range"
            ))
        })
}

fn required_text(field: &str, value: &str) -> Result<String, LeaveServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LeaveServiceError::InvalidRequest(format!(
            "{field} cannot be blank"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_policy(policy: &CompanyPolicy) -> Result<(), LeaveServiceError> {
    day_count("annual allotment", policy.annual, 0)?;
    day_count("sick allotment", policy.sick, 0)?;
    day_count("casual allotment", policy.casual, 0)?;
    Ok(())
}

fn validate_rule(draft: &RuleDraft) -> Result<(), LeaveServiceError> {
    day_count("max duration", draft.max_duration, 0)?;
    day_count("minimum notice", draft.min_days_notice, 0)?;
    Ok(())
}

fn find_rule<'a>(
    rules: &'a [AutoApprovalRule],
    rule_id: &RuleId,
) -> Result<&'a AutoApprovalRule, LeaveServiceError> {
    rules
        .iter()
        .find(|rule| &rule.id == rule_id)
        .ok_or_else(|| LeaveServiceError::RuleNotFound(rule_id.clone()))
}

fn ensure_single_active(
    rules: &[AutoApprovalRule],
    leave_type: LeaveType,
    ignore: Option<&RuleId>,
) -> Result<(), LeaveServiceError> {
    let others: Vec<AutoApprovalRule> = rules
        .iter()
        .filter(|rule| Some(&rule.id) != ignore)
        .cloned()
        .collect();
    match active_rule_for(&others, leave_type) {
        Some(_) => Err(LeaveServiceError::DuplicateActiveRule { leave_type }),
        None => Ok(()),
    }
}

/// Marks a tenant as being swept until dropped.
struct SweepGuard<'a> {
    in_flight: &'a Mutex<HashSet<TenantId>>,
    tenant: TenantId,
}

impl<'a> SweepGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<TenantId>>, tenant: &TenantId) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(tenant.clone()) {
            return None;
        }
        Some(Self {
            in_flight,
            tenant: tenant.clone(),
        })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.tenant);
    }
}

/// Error raised by the leave service.
#[derive(Debug, thiserror::Error)]
pub enum LeaveServiceError {
    #[error("no backing store configured")]
    StoreUnavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("leave request {0} not found")]
    RequestNotFound(RequestId),
    #[error("auto-approval rule {0} not found")]
    RuleNotFound(RuleId),
    #[error("employee {0} not found")]
    EmployeeNotFound(UserId),
    #[error("department {0} not found")]
    DepartmentNotFound(DepartmentId),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("only pending requests can be deleted; this one is {status}")]
    NotDeletable { status: LeaveStatus },
    #[error("leave request {request_id} was changed concurrently and is now {actual}")]
    ConcurrentUpdate {
        request_id: RequestId,
        actual: LeaveStatus,
    },
    #[error("an enabled auto-approval rule already exists for {leave_type} leave")]
    DuplicateActiveRule { leave_type: LeaveType },
}

impl LeaveServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LeaveServiceError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            LeaveServiceError::RequestNotFound(_)
            | LeaveServiceError::RuleNotFound(_)
            | LeaveServiceError::EmployeeNotFound(_)
            | LeaveServiceError::DepartmentNotFound(_) => StatusCode::NOT_FOUND,
            LeaveServiceError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LeaveServiceError::NotDeletable { .. }
            | LeaveServiceError::ConcurrentUpdate { .. }
            | LeaveServiceError::DuplicateActiveRule { .. } => StatusCode::CONFLICT,
            LeaveServiceError::Store(err) => match err {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::Conflict | StoreError::StatusMismatch { .. } => StatusCode::CONFLICT,
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<LedgerError> for LeaveServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Store(err) => LeaveServiceError::Store(err),
            out_of_range @ LedgerError::OutOfRange { .. } => {
                LeaveServiceError::InvalidRequest(out_of_range.to_string())
            }
        }
    }
}
