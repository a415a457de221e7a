use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::super::domain::{
    AutoApprovalRule, Employee, LeaveBalance, LeaveRequest, LeaveStatus, LeaveType,
};
use super::RejectionReason;

/// First enabled rule for the leave type. Later duplicates are ignored.
pub fn active_rule_for(
    rules: &[AutoApprovalRule],
    leave_type: LeaveType,
) -> Option<&AutoApprovalRule> {
    rules
        .iter()
        .find(|rule| rule.enabled && rule.leave_type == leave_type)
}

/// Leave types with more than one enabled rule, i.e. where only the first one counts.
pub fn ambiguous_rule_types(rules: &[AutoApprovalRule]) -> Vec<LeaveType> {
    let mut counts: BTreeMap<LeaveType, usize> = BTreeMap::new();
    for rule in rules.iter().filter(|rule| rule.enabled) {
        *counts.entry(rule.leave_type).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(leave_type, _)| leave_type)
        .collect()
}

/// Whole days between the local submission date and the first day of leave.
pub fn notice_days(start_date: NaiveDate, requested_on: NaiveDate) -> i64 {
    (start_date - requested_on).num_days()
}

/// Closed-interval overlap.
pub fn ranges_overlap(
    start: NaiveDate,
    end: NaiveDate,
    other_start: NaiveDate,
    other_end: NaiveDate,
) -> bool {
    start <= other_end && end >= other_start
}

pub(super) fn check_balance(
    request: &LeaveRequest,
    rule: &AutoApprovalRule,
    balances: &[LeaveBalance],
) -> Option<RejectionReason> {
    if !rule.require_sufficient_balance {
        return None;
    }

    let remaining = balances
        .iter()
        .find(|balance| balance.leave_type == request.leave_type)
        .map(|balance| balance.remaining)
        .unwrap_or(0);

    (remaining < request.days).then_some(RejectionReason::InsufficientBalance {
        remaining,
        requested: request.days,
    })
}

pub(super) fn check_duration(
    request: &LeaveRequest,
    rule: &AutoApprovalRule,
) -> Option<RejectionReason> {
    (request.days > rule.max_duration).then_some(RejectionReason::DurationExceeded {
        max_duration: rule.max_duration,
    })
}

pub(super) fn check_notice(
    request: &LeaveRequest,
    rule: &AutoApprovalRule,
) -> Option<RejectionReason> {
    let notice = notice_days(request.start_date, request.requested_on());
    (notice < i64::from(rule.min_days_notice)).then_some(RejectionReason::InsufficientNotice {
        min_days_notice: rule.min_days_notice,
        notice_days: notice,
    })
}

pub(super) fn check_team_conflict(
    request: &LeaveRequest,
    requests: &[LeaveRequest],
    roster: &[Employee],
) -> Option<RejectionReason> {
    let job_title = roster
        .iter()
        .find(|employee| employee.id == request.user_id)
        .and_then(Employee::job_title)?;

    let conflicting = requests.iter().find(|other| {
        other.id != request.id
            && other.user_id != request.user_id
            && other.status == LeaveStatus::Approved
            && roster
                .iter()
                .find(|employee| employee.id == other.user_id)
                .and_then(Employee::job_title)
                == Some(job_title)
            && ranges_overlap(
                request.start_date,
                request.end_date,
                other.start_date,
                other.end_date,
            )
    })?;

    Some(RejectionReason::TeamConflict {
        job_title: job_title.to_string(),
        conflicting_request: conflicting.id.clone(),
    })
}
