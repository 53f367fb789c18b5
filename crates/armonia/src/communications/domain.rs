use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;
use crate::tenancy::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnouncementType {
    #[default]
    General,
    Emergency,
    Maintenance,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    RoleRestricted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub announcement_type: AnnouncementType,
    pub visibility: Visibility,
    pub target_roles: Vec<Role>,
    pub requires_confirmation: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether `actor` may see this announcement at `now`.
    pub fn visible_to(&self, actor: &Actor, now: DateTime<Utc>) -> bool {
        if actor.is_admin() {
            return true;
        }
        if self.is_expired(now) {
            return false;
        }
        match self.visibility {
            Visibility::Public => true,
            Visibility::RoleRestricted => self.target_roles.contains(&actor.role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementRead {
    pub id: u64,
    pub announcement_id: u64,
    pub user_id: u64,
    pub read_at: DateTime<Utc>,
}

impl_entity!(Announcement, "announcement");
impl_entity!(AnnouncementRead, "announcement read");

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub announcement_type: AnnouncementType,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub target_roles: Vec<Role>,
    #[serde(default)]
    pub requires_confirmation: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnouncementUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub announcement_type: Option<AnnouncementType>,
    pub visibility: Option<Visibility>,
    pub target_roles: Option<Vec<Role>>,
    pub requires_confirmation: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnouncementFilter {
    pub announcement_type: Option<AnnouncementType>,
    pub read: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementView {
    #[serde(flatten)]
    pub announcement: Announcement,
    pub read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    #[default]
    General,
    Meeting,
    Social,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityEvent {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub event_type: EventType,
    pub visibility: Visibility,
    pub target_roles: Vec<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<u32>,
    pub organizer_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunityEvent {
    pub fn visible_to(&self, actor: &Actor) -> bool {
        actor.is_admin()
            || match self.visibility {
                Visibility::Public => true,
                Visibility::RoleRestricted => self.target_roles.contains(&actor.role),
            }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Confirmed,
    Tentative,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAttendee {
    pub id: u64,
    pub event_id: u64,
    pub user_id: u64,
    pub status: AttendanceStatus,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(CommunityEvent, "event");
impl_entity!(EventAttendee, "event attendee");

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub target_roles: Vec<Role>,
    pub max_attendees: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub event_type: Option<EventType>,
    pub visibility: Option<Visibility>,
    pub target_roles: Option<Vec<Role>>,
    pub max_attendees: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub upcoming: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceRequest {
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: CommunityEvent,
    pub confirmed_attendees: usize,
    pub user_attendance: Option<EventAttendee>,
}
