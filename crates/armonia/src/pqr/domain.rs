use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    Petition,
    Complaint,
    Claim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PqrStatus {
    Open,
    InProgress,
    Closed,
    Rejected,
}

impl PqrStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PqrStatus::Open => "OPEN",
            PqrStatus::InProgress => "IN_PROGRESS",
            PqrStatus::Closed => "CLOSED",
            PqrStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PqrStatus::Closed | PqrStatus::Rejected)
    }

    pub fn can_transition_to(self, next: PqrStatus) -> bool {
        use PqrStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | Closed | Rejected) | (InProgress, Closed | Rejected)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PqrPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PqrTicket {
    pub id: u64,
    pub reported_by: u64,
    pub assigned_to: Option<u64>,
    pub ticket_type: TicketType,
    pub subject: String,
    pub description: String,
    pub category: Option<String>,
    pub status: PqrStatus,
    pub priority: PqrPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PqrComment {
    pub id: u64,
    pub ticket_id: u64,
    pub author_id: u64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl_entity!(PqrTicket, "pqr ticket");
impl_entity!(PqrComment, "pqr comment");

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub ticket_type: TicketType,
    pub subject: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: Option<PqrPriority>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<PqrPriority>,
    pub ticket_type: Option<TicketType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<PqrStatus>,
    pub priority: Option<PqrPriority>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: PqrTicket,
    pub comments: Vec<PqrComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    pub assigned_to: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketStatusChange {
    pub status: PqrStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_ticket_lifecycle() {
        use PqrStatus::*;
        assert!(Open.can_transition_to(InProgress));
        assert!(Open.can_transition_to(Rejected));
        assert!(InProgress.can_transition_to(Closed));
        assert!(!InProgress.can_transition_to(Open));
        assert!(!Closed.can_transition_to(InProgress));
        assert!(!Rejected.can_transition_to(Closed));
        assert!(!Open.can_transition_to(Open));
    }
}
