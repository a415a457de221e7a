//! Leave requests, the auto-approval bot, and the balance ledger behind them.
//!
//! The bot is a pure function over a tenant snapshot ([`evaluation`]). Everything with side
//! effects goes through [`LeaveService`], which owns the store handle, the snapshot cache,
//! and the per-tenant sweep guard.

pub mod cache;
pub mod clock;
pub mod domain;
pub mod evaluation;
pub mod ledger;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use cache::{SnapshotCache, TenantSnapshot};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    AutoApprovalRule, BalanceId, BalanceUsage, CompanyPolicy, Department, DepartmentId,
    Employee, EmployeeProfile, LeaveBalance, LeaveRequest, LeaveStatus, LeaveSubmission,
    LeaveType, NewEmployee, RequestId, Role, RuleDraft, RuleId, TenantId, UserId, MAX_DAYS,
};
pub use evaluation::{evaluate, BotDecision, EvaluationContext, RejectionReason};
pub use ledger::{LedgerError, LedgerOp, LedgerOutcome};
pub use memory::{InMemoryLeaveStore, TracingNotifier};
pub use repository::{
    BalanceFilter, DecisionNotice, DecisionNotifier, LeaveStore, NotifyError, RequestFilter,
    StoreError,
};
pub use router::leave_router;
pub use service::{LeaveService, LeaveServiceError, PolicyUpdate, StatusChange, SubmissionOutcome};
pub use sweep::{SweepHandle, SweepReport, SweepScheduler, SweepSkip};
