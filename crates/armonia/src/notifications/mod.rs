//! User notifications, realtime fan-out and the activity trail.

mod activity;
mod center;
mod realtime;
mod router;

pub use activity::{ActivityEntry, ActivityLogger};
pub use center::{
    Notification, NotificationCenter, NotificationConfirmation, NotificationDraft,
    NotificationFilter, NotificationKind, NotificationPriority, NotificationSource, RoleBroadcast,
};
pub(crate) use realtime::publish;
pub use realtime::{EventPublisher, PublishError, RealtimeEvent, RealtimeHub};
pub use router::{activity_router, notification_router};
