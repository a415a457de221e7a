mod policy;
mod rules;

pub use policy::{BotDecision, RejectionReason};
pub use rules::{active_rule_for, ambiguous_rule_types, notice_days, ranges_overlap};

use super::domain::{AutoApprovalRule, Employee, LeaveBalance, LeaveRequest};

/// Everything the bot may look at besides the request itself.
///
/// `balances` holds the requester's rows only; `requests` is the whole tenant so the
/// conflict check can see colleagues' approved leave.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub requests: &'a [LeaveRequest],
    pub rules: &'a [AutoApprovalRule],
    pub balances: &'a [LeaveBalance],
    pub roster: &'a [Employee],
}

/// Decide a pending request. Checks short-circuit in a fixed order: active rule,
/// balance, duration, notice, team conflict.
pub fn evaluate(request: &LeaveRequest, ctx: &EvaluationContext<'_>) -> BotDecision {
    let Some(rule) = active_rule_for(ctx.rules, request.leave_type) else {
        return BotDecision::Pending;
    };

    if let Some(reason) = rules::check_balance(request, rule, ctx.balances) {
        return BotDecision::Rejected(reason);
    }

    if let Some(reason) = rules::check_duration(request, rule) {
        return BotDecision::Rejected(reason);
    }

    if let Some(reason) = rules::check_notice(request, rule) {
        return BotDecision::Rejected(reason);
    }

    if let Some(reason) = rules::check_team_conflict(request, ctx.requests, ctx.roster) {
        return BotDecision::Rejected(reason);
    }

    BotDecision::Approved
}
