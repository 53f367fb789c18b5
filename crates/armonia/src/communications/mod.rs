//! Building-wide announcements with role targeting and read receipts, plus the community
//! event calendar.

mod domain;
mod events;
mod router;
mod service;

pub use domain::{
    Announcement, AnnouncementFilter, AnnouncementRead, AnnouncementType, AnnouncementUpdate,
    AnnouncementView, AttendanceRequest, AttendanceStatus, CommunityEvent, EventAttendee,
    EventFilter, EventType, EventUpdate, EventView, NewAnnouncement, NewEvent, Visibility,
};
pub use events::EventService;
pub use router::{announcements_router, events_router};
pub use service::{AnnouncementService, ANNOUNCEMENTS_CHANNEL};
