//! Leave balance accounting.
//!
//! Only two primitives touch `used`: [`LedgerOp::Deduct`] and [`LedgerOp::Refund`]. Both
//! rewrite `remaining` from `total - used` on the same write. Neither clamps, so a refund
//! without a matching deduction drives `used` below zero; callers pair them through
//! [`transition_effect`]. Arithmetic is checked; a write that would leave `i32` fails
//! with [`LedgerError::OutOfRange`] and touches nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    BalanceId, CompanyPolicy, LeaveBalance, LeaveStatus, LeaveType, TenantId, UserId,
};
use super::repository::{BalanceFilter, LeaveStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOp {
    Deduct,
    Refund,
}

impl LedgerOp {
    /// Moved row, or `None` when `used` or `remaining` would overflow.
    pub fn apply(self, balance: &LeaveBalance, days: i32) -> Option<LeaveBalance> {
        let used = match self {
            LedgerOp::Deduct => balance.used.checked_add(days)?,
            LedgerOp::Refund => balance.used.checked_sub(days)?,
        };
        balance.with_usage(balance.total, used)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("balance {balance_id} cannot absorb that many days")]
    OutOfRange { balance_id: BalanceId },
}

/// Ledger effect of a status transition. Only entering or leaving APPROVED moves days.
pub fn transition_effect(previous: LeaveStatus, next: LeaveStatus) -> Option<LedgerOp> {
    match (previous, next) {
        (previous, next) if previous == next => None,
        (_, LeaveStatus::Approved) => Some(LedgerOp::Deduct),
        (LeaveStatus::Approved, _) => Some(LedgerOp::Refund),
        _ => None,
    }
}

/// Result of a ledger write. A missing row is a defined no-op, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "balance", rename_all = "snake_case")]
pub enum LedgerOutcome {
    Applied(LeaveBalance),
    NoBalance,
}

impl LedgerOutcome {
    pub fn balance(&self) -> Option<&LeaveBalance> {
        match self {
            LedgerOutcome::Applied(balance) => Some(balance),
            LedgerOutcome::NoBalance => None,
        }
    }
}

/// Read-modify-write of one (user, leave type) row.
pub async fn adjust<S>(
    store: &S,
    tenant: &TenantId,
    user_id: &UserId,
    leave_type: LeaveType,
    days: i32,
    op: LedgerOp,
) -> Result<LedgerOutcome, LedgerError>
where
    S: LeaveStore + ?Sized,
{
    let current = store
        .list_balances(tenant, &BalanceFilter::entry(user_id, leave_type))
        .await?
        .into_iter()
        .next();

    let Some(current) = current else {
        debug!(%tenant, %user_id, %leave_type, ?op, "no balance row; ledger adjustment skipped");
        return Ok(LedgerOutcome::NoBalance);
    };

    let updated = op
        .apply(&current, days)
        .ok_or_else(|| LedgerError::OutOfRange {
            balance_id: current.id.clone(),
        })?;
    store
        .update_balance(tenant, &updated.id, updated.usage())
        .await?;

    debug!(
        %tenant,
        %user_id,
        %leave_type,
        ?op,
        days,
        used = updated.used,
        remaining = updated.remaining,
        "balance adjusted"
    );
    Ok(LedgerOutcome::Applied(updated))
}

/// New totals from the policy for every policy-bucket row; `used` is preserved.
pub fn apply_policy(
    rows: &[LeaveBalance],
    policy: &CompanyPolicy,
) -> Result<Vec<LeaveBalance>, LedgerError> {
    retotal(rows, policy, |row| row.used)
}

/// Yearly renewal: totals from the policy, `used` back to zero.
pub fn renew_rows(
    rows: &[LeaveBalance],
    policy: &CompanyPolicy,
) -> Result<Vec<LeaveBalance>, LedgerError> {
    retotal(rows, policy, |_| 0)
}

fn retotal(
    rows: &[LeaveBalance],
    policy: &CompanyPolicy,
    used: impl Fn(&LeaveBalance) -> i32,
) -> Result<Vec<LeaveBalance>, LedgerError> {
    rows.iter()
        .filter_map(|row| {
            let total = policy.allotment_for(row.leave_type)?;
            Some(
                row.with_usage(total, used(row))
                    .ok_or_else(|| LedgerError::OutOfRange {
                        balance_id: row.id.clone(),
                    }),
            )
        })
        .collect()
}

/// Opening balances for a freshly provisioned user.
pub fn seed_balances(
    tenant: &TenantId,
    user_id: &UserId,
    policy: &CompanyPolicy,
) -> Vec<LeaveBalance> {
    LeaveType::POLICY_BUCKETS
        .iter()
        .filter_map(|leave_type| {
            let total = policy.allotment_for(*leave_type)?;
            Some(LeaveBalance::new(
                balance_id(user_id, *leave_type),
                tenant.clone(),
                user_id.clone(),
                *leave_type,
                total,
            ))
        })
        .collect()
}

pub fn balance_id(user_id: &UserId, leave_type: LeaveType) -> BalanceId {
    BalanceId(format!("bal-{}-{}", user_id, leave_type.label()))
}
