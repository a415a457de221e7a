use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    AutoApprovalRule, BalanceId, BalanceUsage, CompanyPolicy, Department, DepartmentId,
    Employee, LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, RequestId, RuleId, TenantId,
    UserId,
};
use super::evaluation::RejectionReason;

/// Equality filter for request listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<LeaveStatus>,
    pub user_id: Option<UserId>,
}

impl RequestFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: LeaveStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &LeaveRequest) -> bool {
        self.status.map_or(true, |status| request.status == status)
            && self
                .user_id
                .as_ref()
                .map_or(true, |user_id| &request.user_id == user_id)
    }
}

/// Equality filter for balance listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceFilter {
    pub user_id: Option<UserId>,
    pub leave_type: Option<LeaveType>,
}

impl BalanceFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: &UserId) -> Self {
        Self {
            user_id: Some(user_id.clone()),
            leave_type: None,
        }
    }

    pub fn entry(user_id: &UserId, leave_type: LeaveType) -> Self {
        Self {
            user_id: Some(user_id.clone()),
            leave_type: Some(leave_type),
        }
    }

    pub fn matches(&self, balance: &LeaveBalance) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |user_id| &balance.user_id == user_id)
            && self
                .leave_type
                .map_or(true, |leave_type| balance.leave_type == leave_type)
    }
}

/// Tenant-scoped persistence used by the leave core.
///
/// Listings come back in creation order; the sweep relies on that for deterministic
/// conflict resolution.
#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, StoreError>;

    async fn list_requests(
        &self,
        tenant: &TenantId,
        filter: &RequestFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError>;

    async fn get_request(
        &self,
        tenant: &TenantId,
        id: &RequestId,
    ) -> Result<Option<LeaveRequest>, StoreError>;

    async fn insert_request(&self, request: LeaveRequest) -> Result<LeaveRequest, StoreError>;

    /// Conditional status write. Fails with [`StoreError::StatusMismatch`] when the
    /// persisted status is no longer `expected`.
    async fn update_request_status(
        &self,
        tenant: &TenantId,
        id: &RequestId,
        expected: LeaveStatus,
        next: LeaveStatus,
    ) -> Result<(), StoreError>;

    async fn delete_request(
        &self,
        tenant: &TenantId,
        id: &RequestId,
        expected: LeaveStatus,
    ) -> Result<(), StoreError>;

    async fn list_balances(
        &self,
        tenant: &TenantId,
        filter: &BalanceFilter,
    ) -> Result<Vec<LeaveBalance>, StoreError>;

    async fn update_balance(
        &self,
        tenant: &TenantId,
        id: &BalanceId,
        usage: BalanceUsage,
    ) -> Result<(), StoreError>;

    /// Insert or replace rows by id.
    async fn upsert_balances(
        &self,
        tenant: &TenantId,
        rows: Vec<LeaveBalance>,
    ) -> Result<(), StoreError>;

    /// Remove every matching row and report how many went.
    async fn delete_balances(
        &self,
        tenant: &TenantId,
        filter: &BalanceFilter,
    ) -> Result<usize, StoreError>;

    async fn list_rules(&self, tenant: &TenantId) -> Result<Vec<AutoApprovalRule>, StoreError>;

    async fn insert_rule(&self, rule: AutoApprovalRule) -> Result<AutoApprovalRule, StoreError>;

    async fn update_rule(&self, rule: AutoApprovalRule) -> Result<(), StoreError>;

    async fn delete_rule(&self, tenant: &TenantId, id: &RuleId) -> Result<(), StoreError>;

    async fn list_employees(&self, tenant: &TenantId) -> Result<Vec<Employee>, StoreError>;

    async fn insert_employee(&self, employee: Employee) -> Result<Employee, StoreError>;

    /// Replace the roster entry with the same id. Email addresses stay unique.
    async fn update_employee(&self, employee: Employee) -> Result<(), StoreError>;

    async fn delete_employee(&self, tenant: &TenantId, id: &UserId) -> Result<(), StoreError>;

    async fn list_departments(&self, tenant: &TenantId) -> Result<Vec<Department>, StoreError>;

    async fn insert_department(&self, department: Department)
        -> Result<Department, StoreError>;

    async fn update_department(&self, department: Department) -> Result<(), StoreError>;

    async fn delete_department(
        &self,
        tenant: &TenantId,
        id: &DepartmentId,
    ) -> Result<(), StoreError>;

    async fn get_policy(&self, tenant: &TenantId) -> Result<Option<CompanyPolicy>, StoreError>;

    async fn put_policy(&self, tenant: &TenantId, policy: CompanyPolicy)
        -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("status precondition failed: record is {actual}")]
    StatusMismatch { actual: LeaveStatus },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    Write(String),
}

/// Outbound hook reporting the bot's verdict for a fresh submission.
#[async_trait]
pub trait DecisionNotifier: Send + Sync {
    async fn notify(&self, notice: DecisionNotice) -> Result<(), NotifyError>;
}

/// One of the three distinguishable submission outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionNotice {
    Approved {
        request_id: RequestId,
        user_id: UserId,
    },
    Rejected {
        request_id: RequestId,
        user_id: UserId,
        reason: RejectionReason,
    },
    AwaitingManager {
        request_id: RequestId,
        user_id: UserId,
    },
}

impl DecisionNotice {
    pub fn request_id(&self) -> &RequestId {
        match self {
            DecisionNotice::Approved { request_id, .. }
            | DecisionNotice::Rejected { request_id, .. }
            | DecisionNotice::AwaitingManager { request_id, .. } => request_id,
        }
    }

    pub fn message(&self) -> String {
        match self {
            DecisionNotice::Approved { .. } => {
                "request approved automatically: it meets the auto-approval criteria".to_string()
            }
            DecisionNotice::Rejected { reason, .. } => {
                format!("request rejected automatically: {}", reason.summary())
            }
            DecisionNotice::AwaitingManager { .. } => {
                "request received and waiting for a manager decision".to_string()
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
