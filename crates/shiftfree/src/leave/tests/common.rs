use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use crate::leave::domain::{
    AutoApprovalRule, BalanceId, BalanceUsage, CompanyPolicy, Department, DepartmentId,
    Employee, LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, RequestId, Role, RuleId,
    TenantId, UserId,
};
use crate::leave::ledger::balance_id;
use crate::leave::repository::{
    BalanceFilter, DecisionNotice, DecisionNotifier, LeaveStore, NotifyError, RequestFilter,
    StoreError,
};
use crate::leave::{FixedClock, InMemoryLeaveStore, LeaveService};

pub(super) fn tenant() -> TenantId {
    TenantId::new("acme")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Monday 2025-03-03, 09:00 UTC.
pub(super) fn now() -> DateTime<Utc> {
    at(2025, 3, 3, 9)
}

pub(super) fn employee(id: &str, job_title: Option<&str>) -> Employee {
    Employee {
        id: UserId::new(id),
        tenant_id: tenant(),
        name: format!("{} Example", id),
        email: format!("{id}@acme.test"),
        role: Role::Employee,
        job_title: job_title.map(str::to_string),
        department: "Engineering".to_string(),
    }
}

pub(super) fn balance(user: &str, leave_type: LeaveType, total: i32, used: i32) -> LeaveBalance {
    LeaveBalance::new(
        balance_id(&UserId::new(user), leave_type),
        tenant(),
        UserId::new(user),
        leave_type,
        total,
    )
    .with_usage(total, used)
    .expect("fixture balance in range")
}

pub(super) fn rule(
    id: &str,
    leave_type: LeaveType,
    min_days_notice: i32,
    max_duration: i32,
) -> AutoApprovalRule {
    AutoApprovalRule {
        id: RuleId::new(id),
        tenant_id: tenant(),
        leave_type,
        enabled: true,
        min_days_notice,
        max_duration,
        require_sufficient_balance: true,
    }
}

pub(super) fn casual_rule() -> AutoApprovalRule {
    rule("rule-casual", LeaveType::Casual, 1, 2)
}

pub(super) fn request(
    id: &str,
    user: &str,
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    status: LeaveStatus,
) -> LeaveRequest {
    LeaveRequest {
        id: RequestId::new(id),
        tenant_id: tenant(),
        user_id: UserId::new(user),
        user_name: format!("{user} Example"),
        leave_type,
        start_date: start,
        end_date: end,
        days: i32::try_from((end - start).num_days() + 1).expect("small span"),
        reason: String::new(),
        status,
        requested_at: now(),
        utc_offset_minutes: 0,
    }
}

/// Roster of three: two engineers and a designer, each with 10/0 casual and 14/0 annual.
pub(super) async fn seed<S: LeaveStore + ?Sized>(store: &S) {
    for person in [
        employee("alice", Some("Engineer")),
        employee("bob", Some("Engineer")),
        employee("carol", Some("Designer")),
    ] {
        let user = person.id.as_str().to_string();
        store.insert_employee(person).await.expect("seed employee");
        store
            .upsert_balances(
                &tenant(),
                vec![
                    balance(&user, LeaveType::Casual, 10, 0),
                    balance(&user, LeaveType::Annual, 14, 0),
                ],
            )
            .await
            .expect("seed balances");
    }
    store
        .put_policy(&tenant(), CompanyPolicy::default())
        .await
        .expect("seed policy");
}

pub(super) async fn seeded_store() -> Arc<InMemoryLeaveStore> {
    let store = Arc::new(InMemoryLeaveStore::new());
    seed(store.as_ref()).await;
    store
}

pub(super) async fn seeded_store_with_casual_rule() -> Arc<InMemoryLeaveStore> {
    let store = seeded_store().await;
    store
        .insert_rule(casual_rule())
        .await
        .expect("seed rule");
    store
}

pub(super) async fn interleaved_store() -> Arc<InterleavedStore> {
    let store = Arc::new(InterleavedStore::new(InMemoryLeaveStore::new()));
    seed(store.as_ref()).await;
    store
        .insert_rule(casual_rule())
        .await
        .expect("seed rule");
    store
}

pub(super) fn build_service<S: LeaveStore + 'static>(
    store: Arc<S>,
) -> (LeaveService<S, RecordingNotifier>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let service =
        LeaveService::new(store, notifier.clone()).with_clock(Arc::new(FixedClock(now())));
    (service, notifier)
}

pub(super) async fn stored_balance<S: LeaveStore>(
    store: &S,
    user: &str,
    leave_type: LeaveType,
) -> LeaveBalance {
    store
        .list_balances(&tenant(), &BalanceFilter::entry(&UserId::new(user), leave_type))
        .await
        .expect("list balances")
        .into_iter()
        .next()
        .expect("balance row present")
}

pub(super) async fn stored_status<S: LeaveStore>(store: &S, id: &RequestId) -> LeaveStatus {
    store
        .get_request(&tenant(), id)
        .await
        .expect("get request")
        .expect("request present")
        .status
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<DecisionNotice>>,
}

impl RecordingNotifier {
    pub(super) fn notices(&self) -> Vec<DecisionNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl DecisionNotifier for RecordingNotifier {
    async fn notify(&self, notice: DecisionNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct BrokenNotifier;

#[async_trait]
impl DecisionNotifier for BrokenNotifier {
    async fn notify(&self, _notice: DecisionNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

/// Store whose every call fails as if the database were down.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

#[async_trait]
impl LeaveStore for UnavailableStore {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        offline()
    }

    async fn list_requests(
        &self,
        _tenant: &TenantId,
        _filter: &RequestFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        offline()
    }

    async fn get_request(
        &self,
        _tenant: &TenantId,
        _id: &RequestId,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        offline()
    }

    async fn insert_request(&self, _request: LeaveRequest) -> Result<LeaveRequest, StoreError> {
        offline()
    }

    async fn update_request_status(
        &self,
        _tenant: &TenantId,
        _id: &RequestId,
        _expected: LeaveStatus,
        _next: LeaveStatus,
    ) -> Result<(), StoreError> {
        offline()
    }

    async fn delete_request(
        &self,
        _tenant: &TenantId,
        _id: &RequestId,
        _expected: LeaveStatus,
    ) -> Result<(), StoreError> {
        offline()
    }

    async fn list_balances(
        &self,
        _tenant: &TenantId,
        _filter: &BalanceFilter,
    ) -> Result<Vec<LeaveBalance>, StoreError> {
        offline()
    }

    async fn update_balance(
        &self,
        _tenant: &TenantId,
        _id: &BalanceId,
        _usage: BalanceUsage,
    ) -> Result<(), StoreError> {
        offline()
    }

    async fn upsert_balances(
        &self,
        _tenant: &TenantId,
        _rows: Vec<LeaveBalance>,
    ) -> Result<(), StoreError> {
        offline()
    }

    async fn delete_balances(
        &self,
        _tenant: &TenantId,
        _filter: &BalanceFilter,
    ) -> Result<usize, StoreError> {
        offline()
    }

    async fn list_rules(&self, _tenant: &TenantId) -> Result<Vec<AutoApprovalRule>, StoreError> {
        offline()
    }

    async fn insert_rule(&self, _rule: AutoApprovalRule) -> Result<AutoApprovalRule, StoreError> {
        offline()
    }

    async fn update_rule(&self, _rule: AutoApprovalRule) -> Result<(), StoreError> {
        offline()
    }

    async fn delete_rule(&self, _tenant: &TenantId, _id: &RuleId) -> Result<(), StoreError> {
        offline()
    }

    async fn list_employees(&self, _tenant: &TenantId) -> Result<Vec<Employee>, StoreError> {
        offline()
    }

    async fn insert_employee(&self, _employee: Employee) -> Result<Employee, StoreError> {
        offline()
    }

    async fn update_employee(&self, _employee: Employee) -> Result<(), StoreError> {
        offline()
    }

    async fn delete_employee(&self, _tenant: &TenantId, _id: &UserId) -> Result<(), StoreError> {
        offline()
    }

    async fn list_departments(&self, _tenant: &TenantId) -> Result<Vec<Department>, StoreError> {
        offline()
    }

    async fn insert_department(
        &self,
        _department: Department,
    ) -> Result<Department, StoreError> {
        offline()
    }

    async fn update_department(&self, _department: Department) -> Result<(), StoreError> {
        offline()
    }

    async fn delete_department(
        &self,
        _tenant: &TenantId,
        _id: &DepartmentId,
    ) -> Result<(), StoreError> {
        offline()
    }

    async fn get_policy(&self, _tenant: &TenantId) -> Result<Option<CompanyPolicy>, StoreError> {
        offline()
    }

    async fn put_policy(
        &self,
        _tenant: &TenantId,
        _policy: CompanyPolicy,
    ) -> Result<(), StoreError> {
        offline()
    }
}

/// In-memory store that lets a simulated second writer change a request's status right
/// before a conditional status write lands. Each queued interference fires once.
pub(super) struct InterleavedStore {
    inner: InMemoryLeaveStore,
    interference: Mutex<VecDeque<(RequestId, LeaveStatus)>>,
    failing_status_writes: Mutex<Vec<RequestId>>,
    paused_listing: Mutex<Option<Arc<Notify>>>,
    listing_paused: Notify,
}

impl InterleavedStore {
    pub(super) fn new(inner: InMemoryLeaveStore) -> Self {
        Self {
            inner,
            interference: Mutex::new(VecDeque::new()),
            failing_status_writes: Mutex::new(Vec::new()),
            paused_listing: Mutex::new(None),
            listing_paused: Notify::new(),
        }
    }

    /// Before a later status write, force `id` to `status` as another writer would.
    pub(super) fn interfere(&self, id: &RequestId, status: LeaveStatus) {
        self.interference
            .lock()
            .expect("interference mutex poisoned")
            .push_back((id.clone(), status));
    }

    /// Park the next request listing until the returned handle is notified.
    pub(super) fn pause_next_listing(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.paused_listing.lock().expect("pause mutex poisoned") = Some(release.clone());
        release
    }

    pub(super) async fn wait_until_listing_paused(&self) {
        self.listing_paused.notified().await;
    }

    pub(super) fn fail_status_write(&self, id: &RequestId) {
        self.failing_status_writes
            .lock()
            .expect("failure mutex poisoned")
            .push(id.clone());
    }
}

#[async_trait]
impl LeaveStore for InterleavedStore {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        self.inner.list_tenants().await
    }

    async fn list_requests(
        &self,
        tenant: &TenantId,
        filter: &RequestFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let paused = self.paused_listing.lock().expect("pause mutex poisoned").take();
        if let Some(release) = paused {
            self.listing_paused.notify_one();
            release.notified().await;
        }
        self.inner.list_requests(tenant, filter).await
    }

    async fn get_request(
        &self,
        tenant: &TenantId,
        id: &RequestId,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        self.inner.get_request(tenant, id).await
    }

    async fn insert_request(&self, request: LeaveRequest) -> Result<LeaveRequest, StoreError> {
        self.inner.insert_request(request).await
    }

    async fn update_request_status(
        &self,
        tenant: &TenantId,
        id: &RequestId,
        expected: LeaveStatus,
        next: LeaveStatus,
    ) -> Result<(), StoreError> {
        let fails = self
            .failing_status_writes
            .lock()
            .expect("failure mutex poisoned")
            .contains(id);
        if fails {
            return Err(StoreError::Write("status column locked".to_string()));
        }

        let interference = self
            .interference
            .lock()
            .expect("interference mutex poisoned")
            .pop_front();
        if let Some((target, forced)) = interference {
            let current = self
                .inner
                .get_request(tenant, &target)
                .await?
                .map(|request| request.status);
            if let Some(current) = current {
                self.inner
                    .update_request_status(tenant, &target, current, forced)
                    .await?;
            }
        }
        self.inner
            .update_request_status(tenant, id, expected, next)
            .await
    }

    async fn delete_request(
        &self,
        tenant: &TenantId,
        id: &RequestId,
        expected: LeaveStatus,
    ) -> Result<(), StoreError> {
        self.inner.delete_request(tenant, id, expected).await
    }

    async fn list_balances(
        &self,
        tenant: &TenantId,
        filter: &BalanceFilter,
    ) -> Result<Vec<LeaveBalance>, StoreError> {
        self.inner.list_balances(tenant, filter).await
    }

    async fn update_balance(
        &self,
        tenant: &TenantId,
        id: &BalanceId,
        usage: BalanceUsage,
    ) -> Result<(), StoreError> {
        self.inner.update_balance(tenant, id, usage).await
    }

    async fn upsert_balances(
        &self,
        tenant: &TenantId,
        rows: Vec<LeaveBalance>,
    ) -> Result<(), StoreError> {
        self.inner.upsert_balances(tenant, rows).await
    }

    async fn delete_balances(
        &self,
        tenant: &TenantId,
        filter: &BalanceFilter,
    ) -> Result<usize, StoreError> {
        self.inner.delete_balances(tenant, filter).await
    }

    async fn list_rules(&self, tenant: &TenantId) -> Result<Vec<AutoApprovalRule>, StoreError> {
        self.inner.list_rules(tenant).await
    }

    async fn insert_rule(&self, rule: AutoApprovalRule) -> Result<AutoApprovalRule, StoreError> {
        self.inner.insert_rule(rule).await
    }

    async fn update_rule(&self, rule: AutoApprovalRule) -> Result<(), StoreError> {
        self.inner.update_rule(rule).await
    }

    async fn delete_rule(&self, tenant: &TenantId, id: &RuleId) -> Result<(), StoreError> {
        self.inner.delete_rule(tenant, id).await
    }

    async fn list_employees(&self, tenant: &TenantId) -> Result<Vec<Employee>, StoreError> {
        self.inner.list_employees(tenant).await
    }

    async fn insert_employee(&self, employee: Employee) -> Result<Employee, StoreError> {
        self.inner.insert_employee(employee).await
    }

    async fn update_employee(&self, employee: Employee) -> Result<(), StoreError> {
        self.inner.update_employee(employee).await
    }

    async fn delete_employee(&self, tenant: &TenantId, id: &UserId) -> Result<(), StoreError> {
        self.inner.delete_employee(tenant, id).await
    }

    async fn list_departments(&self, tenant: &TenantId) -> Result<Vec<Department>, StoreError> {
        self.inner.list_departments(tenant).await
    }

    async fn insert_department(&self, department: Department) -> Result<Department, StoreError> {
        self.inner.insert_department(department).await
    }

    async fn update_department(&self, department: Department) -> Result<(), StoreError> {
        self.inner.update_department(department).await
    }

    async fn delete_department(
        &self,
        tenant: &TenantId,
        id: &DepartmentId,
    ) -> Result<(), StoreError> {
        self.inner.delete_department(tenant, id).await
    }

    async fn get_policy(&self, tenant: &TenantId) -> Result<Option<CompanyPolicy>, StoreError> {
        self.inner.get_policy(tenant).await
    }

    async fn put_policy(
        &self,
        tenant: &TenantId,
        policy: CompanyPolicy,
    ) -> Result<(), StoreError> {
        self.inner.put_policy(tenant, policy).await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
