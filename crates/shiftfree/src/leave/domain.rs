use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Company scope; every row belongs to exactly one tenant.
    TenantId
);
string_id!(UserId);
string_id!(RequestId);
string_id!(BalanceId);
string_id!(RuleId);
string_id!(DepartmentId);

/// Upper bound for any day count written to a balance, a policy, or a rule.
pub const MAX_DAYS: i32 = 3_660;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
}

impl LeaveType {
    /// Leave types whose allotment comes from the company policy.
    pub const POLICY_BUCKETS: [LeaveType; 3] =
        [LeaveType::Annual, LeaveType::Casual, LeaveType::Sick];

    pub const fn label(self) -> &'static str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Sick => "sick",
            LeaveType::Casual => "casual",
            LeaveType::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted leave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub user_name: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub reason: String,
    pub status: LeaveStatus,
    pub requested_at: DateTime<Utc>,
    /// Submitter's offset from UTC when the request was filed.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl LeaveRequest {
    /// Calendar date of submission in the submitter's local time.
    pub fn requested_on(&self) -> NaiveDate {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| self.requested_at.with_timezone(&offset).date_naive())
            .unwrap_or_else(|| self.requested_at.date_naive())
    }
}

/// Employee-side payload before the request has an id, a day count, or a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveSubmission {
    pub user_id: UserId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
    /// Submitter's offset from UTC; the service clock's local offset when absent.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl LeaveSubmission {
    /// Inclusive calendar span of the request, never below one day.
    pub fn span_days(&self) -> i32 {
        let span = (self.end_date - self.start_date).num_days().abs() + 1;
        i32::try_from(span).unwrap_or(i32::MAX).max(1)
    }
}

/// Per user and leave type accounting row.
///
/// `remaining` is stored, not derived on read, so every writer goes through
/// [`LeaveBalance::with_usage`] to keep `remaining == total - used`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub id: BalanceId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub leave_type: LeaveType,
    pub total: i32,
    pub used: i32,
    pub remaining: i32,
}

impl LeaveBalance {
    /// Opening row with nothing used yet.
    pub fn new(
        id: BalanceId,
        tenant_id: TenantId,
        user_id: UserId,
        leave_type: LeaveType,
        total: i32,
    ) -> Self {
        Self {
            id,
            tenant_id,
            user_id,
            leave_type,
            total,
            used: 0,
            remaining: total,
        }
    }

    /// Same row with new totals, or `None` when `total - used` does not fit.
    pub fn with_usage(&self, total: i32, used: i32) -> Option<Self> {
        Some(Self {
            total,
            used,
            remaining: total.checked_sub(used)?,
            ..self.clone()
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.total.checked_sub(self.used) == Some(self.remaining)
    }

    pub fn usage(&self) -> BalanceUsage {
        BalanceUsage {
            used: self.used,
            remaining: self.remaining,
        }
    }
}

/// The two columns the ledger primitives are allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUsage {
    pub used: i32,
    pub remaining: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoApprovalRule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    pub leave_type: LeaveType,
    pub enabled: bool,
    pub min_days_notice: i32,
    pub max_duration: i32,
    pub require_sufficient_balance: bool,
}

/// Default allotments for new users and yearly renewals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPolicy {
    pub annual: i32,
    pub sick: i32,
    pub casual: i32,
}

impl Default for CompanyPolicy {
    fn default() -> Self {
        Self {
            annual: 14,
            sick: 10,
            casual: 5,
        }
    }
}

impl CompanyPolicy {
    pub fn allotment_for(&self, leave_type: LeaveType) -> Option<i32> {
        match leave_type {
            LeaveType::Annual => Some(self.annual),
            LeaveType::Sick => Some(self.sick),
            LeaveType::Casual => Some(self.casual),
            LeaveType::Unpaid => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
}

/// Roster entry. The job title drives the team conflict check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: String,
}

impl Employee {
    /// Job title with blank values treated as absent.
    pub fn job_title(&self) -> Option<&str> {
        self.job_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// Administrator input for adding someone to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: String,
}

/// Administrator edit of an existing roster entry. Replaces every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: String,
}

/// Organisational unit and the job titles it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Administrator input for a new auto-approval rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub leave_type: LeaveType,
    pub enabled: bool,
    pub min_days_notice: i32,
    pub max_duration: i32,
    pub require_sufficient_balance: bool,
}
