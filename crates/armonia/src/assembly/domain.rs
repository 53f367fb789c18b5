use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssemblyType {
    Ordinary,
    Extraordinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssemblyStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AssemblyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssemblyStatus::Scheduled => "SCHEDULED",
            AssemblyStatus::InProgress => "IN_PROGRESS",
            AssemblyStatus::Completed => "COMPLETED",
            AssemblyStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuorumStatus {
    NotReached,
    Reached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub assembly_type: AssemblyType,
    pub status: AssemblyStatus,
    pub date: DateTime<Utc>,
    pub location: String,
    pub agenda: Vec<AgendaItem>,
    pub required_coefficient: f64,
    pub current_coefficient: f64,
    pub quorum_status: QuorumStatus,
    pub quorum_reached_at: Option<DateTime<Utc>>,
    pub realtime_channel: String,
    pub created_by: u64,
    pub end_time: Option<DateTime<Utc>>,
    pub conclusions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceType {
    InPerson,
    Virtual,
    Proxy,
}

impl AttendanceType {
    pub const fn label(self) -> &'static str {
        match self {
            AttendanceType::InPerson => "IN_PERSON",
            AttendanceType::Virtual => "VIRTUAL",
            AttendanceType::Proxy => "PROXY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: u64,
    pub assembly_id: u64,
    pub user_id: u64,
    pub property_unit_id: u64,
    pub coefficient: f64,
    pub attendance_type: AttendanceType,
    pub proxy_user_id: Option<u64>,
    pub proxy_document_url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub checked_in_at: DateTime<Utc>,
}

impl Attendee {
    /// The owner, or the proxy holder when attendance is delegated.
    pub fn may_vote_as(&self, user_id: u64) -> bool {
        self.user_id == user_id || self.proxy_user_id == Some(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotingType {
    SimpleMajority,
    QualifiedMajority,
    Unanimous,
    CoefficientBased,
}

impl VotingType {
    pub const fn label(self) -> &'static str {
        match self {
            VotingType::SimpleMajority => "SIMPLE_MAJORITY",
            VotingType::QualifiedMajority => "QUALIFIED_MAJORITY",
            VotingType::Unanimous => "UNANIMOUS",
            VotingType::CoefficientBased => "COEFFICIENT_BASED",
        }
    }

    pub fn needs_percentage(self) -> bool {
        matches!(
            self,
            VotingType::QualifiedMajority | VotingType::CoefficientBased
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PercentageBase {
    #[default]
    VotedCoefficients,
    TotalCoefficients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotingStatus {
    Pending,
    Active,
    Closed,
}

impl VotingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VotingStatus::Pending => "PENDING",
            VotingStatus::Active => "ACTIVE",
            VotingStatus::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OptionTally {
    pub count: u64,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voting {
    pub id: u64,
    pub assembly_id: u64,
    pub agenda_point: u32,
    pub title: String,
    pub description: Option<String>,
    pub voting_type: VotingType,
    pub options: Vec<String>,
    pub required_percentage: Option<f64>,
    pub base_for_percentage: PercentageBase,
    pub status: VotingStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_votes: u64,
    pub total_coefficient_voted: f64,
    pub result: BTreeMap<String, OptionTally>,
    pub is_approved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: u64,
    pub voting_id: u64,
    pub attendee_id: u64,
    pub user_id: u64,
    pub property_unit_id: u64,
    pub coefficient: f64,
    pub value: String,
    pub comments: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MinutesStatus {
    Generating,
    Generated,
    Signing,
    Signed,
    Failed,
}

impl MinutesStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MinutesStatus::Generating => "GENERATING",
            MinutesStatus::Generated => "GENERATED",
            MinutesStatus::Signing => "SIGNING",
            MinutesStatus::Signed => "SIGNED",
            MinutesStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyMinutes {
    pub id: u64,
    pub assembly_id: u64,
    pub status: MinutesStatus,
    pub content: Option<String>,
    pub pdf_url: Option<String>,
    pub signed_pdf_url: Option<String>,
    pub signatures_required: u32,
    pub signatures_completed: u32,
    pub generated_at: Option<DateTime<Utc>>,
    pub generation_log: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureStatus {
    Pending,
    Signed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalSignature {
    pub id: u64,
    pub minutes_id: u64,
    pub signer_user_id: u64,
    pub signer_name: String,
    pub signer_role: String,
    pub status: SignatureStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub signature_data: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl_entity!(Assembly, "assembly");
impl_entity!(Attendee, "attendee");
impl_entity!(Voting, "voting");
impl_entity!(Vote, "vote");
impl_entity!(AssemblyMinutes, "assembly minutes");
impl_entity!(DigitalSignature, "digital signature");

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssembly {
    pub title: String,
    pub description: Option<String>,
    pub assembly_type: AssemblyType,
    pub date: DateTime<Utc>,
    pub location: String,
    #[serde(default)]
    pub agenda: Vec<AgendaItem>,
    pub required_coefficient: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssemblyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assembly_type: Option<AssemblyType>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub agenda: Option<Vec<AgendaItem>>,
    pub required_coefficient: Option<f64>,
    pub conclusions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssemblyFilter {
    pub status: Option<AssemblyStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttendance {
    pub user_id: u64,
    pub property_unit_id: u64,
    pub coefficient: f64,
    pub attendance_type: AttendanceType,
    pub proxy_user_id: Option<u64>,
    pub proxy_document_url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVoting {
    pub agenda_point: u32,
    pub title: String,
    pub description: Option<String>,
    pub voting_type: VotingType,
    #[serde(default)]
    pub options: Vec<String>,
    pub required_percentage: Option<f64>,
    #[serde(default)]
    pub base_for_percentage: PercentageBase,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVote {
    pub attendee_id: u64,
    pub value: String,
    pub comments: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signer {
    pub user_id: u64,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuorumSnapshot {
    pub current_coefficient: f64,
    pub required_coefficient: f64,
    pub quorum_status: QuorumStatus,
    pub quorum_reached: bool,
    pub percentage: u32,
    pub attendees: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionResult {
    pub option: String,
    pub count: u64,
    pub coefficient: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingResults {
    pub voting_id: u64,
    pub title: String,
    pub status: VotingStatus,
    pub total_votes: u64,
    pub total_coefficient_voted: f64,
    pub options: Vec<OptionResult>,
    pub is_approved: Option<bool>,
}

/// Assembly closed by `end_assembly` together with the minutes record it opened.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyClosure {
    pub assembly: Assembly,
    pub minutes: AssemblyMinutes,
}
