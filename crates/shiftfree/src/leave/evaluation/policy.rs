use serde::{Deserialize, Serialize};

use super::super::domain::{LeaveStatus, RequestId};

/// Verdict produced by the auto-approval bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum BotDecision {
    Approved,
    Rejected(RejectionReason),
    /// No active rule for the leave type; a manager has to decide.
    Pending,
}

impl BotDecision {
    pub fn status(&self) -> LeaveStatus {
        match self {
            BotDecision::Approved => LeaveStatus::Approved,
            BotDecision::Rejected(_) => LeaveStatus::Rejected,
            BotDecision::Pending => LeaveStatus::Pending,
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            BotDecision::Approved => Some("automatic approval".to_string()),
            BotDecision::Rejected(reason) => Some(reason.summary()),
            BotDecision::Pending => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            BotDecision::Approved => "automatic approval".to_string(),
            BotDecision::Rejected(reason) => format!("rejected: {}", reason.summary()),
            BotDecision::Pending => "awaiting manager decision".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    InsufficientBalance {
        remaining: i32,
        requested: i32,
    },
    DurationExceeded {
        max_duration: i32,
    },
    InsufficientNotice {
        min_days_notice: i32,
        notice_days: i64,
    },
    TeamConflict {
        job_title: String,
        conflicting_request: RequestId,
    },
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::InsufficientBalance {
                remaining,
                requested,
            } => format!("insufficient balance ({remaining} day(s) left, {requested} requested)"),
            RejectionReason::DurationExceeded { max_duration } => {
                format!("max duration exceeded: at most {max_duration} day(s)")
            }
            RejectionReason::InsufficientNotice {
                min_days_notice, ..
            } => format!("early notice: at least {min_days_notice} day(s) in advance"),
            RejectionReason::TeamConflict { job_title, .. } => {
                format!("team conflict: another {job_title} is already on approved leave")
            }
        }
    }
}
