use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::realtime::{publish, EventPublisher, RealtimeEvent};
use crate::error::{require_text, ServiceError};
use crate::members::{active_user_ids, Member};
use crate::store::{impl_entity, require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, Role, SchemaName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationSource {
    System,
    Reservation,
    Assembly,
    Financial,
    Security,
    Message,
    Pqr,
    Marketplace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub source_type: NotificationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<u64>,
    pub priority: NotificationPriority,
    #[serde(default)]
    pub require_confirmation: bool,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Receipt stored when a recipient confirms a notification that asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfirmation {
    pub id: u64,
    pub notification_id: u64,
    pub user_id: u64,
    pub confirmed_at: DateTime<Utc>,
}

impl_entity!(Notification, "notification");
impl_entity!(NotificationConfirmation, "notification confirmation");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread: bool,
    pub kind: Option<NotificationKind>,
    pub source_type: Option<NotificationSource>,
    pub priority: Option<NotificationPriority>,
    pub limit: Option<usize>,
}

impl NotificationFilter {
    fn matches(&self, notification: &Notification) -> bool {
        (!self.unread || !notification.read)
            && self.kind.map_or(true, |kind| notification.kind == kind)
            && self
                .source_type
                .map_or(true, |source| notification.source_type == source)
            && self
                .priority
                .map_or(true, |priority| notification.priority == priority)
    }
}

/// Administrator message addressed to every active member holding `role`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleBroadcast {
    pub role: Role,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub priority: NotificationPriority,
    pub link: Option<String>,
    #[serde(default)]
    pub require_confirmation: bool,
}

/// Content of a notification before it is addressed to a user.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub source_type: NotificationSource,
    pub source_id: Option<u64>,
    pub priority: NotificationPriority,
    pub require_confirmation: bool,
}

impl NotificationDraft {
    pub fn new(
        source_type: NotificationSource,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            message: message.into(),
            link: None,
            source_type,
            source_id: None,
            priority: NotificationPriority::Medium,
            require_confirmation: false,
        }
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn source_id(mut self, id: u64) -> Self {
        self.source_id = Some(id);
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn require_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }
}

/// Persists per-user notifications and pushes them to `user-{id}` channels.
pub struct NotificationCenter {
    repository: Arc<dyn Repository<Notification>>,
    confirmations: Arc<dyn Repository<NotificationConfirmation>>,
    members: Arc<dyn Repository<Member>>,
    publisher: Arc<dyn EventPublisher>,
}

impl NotificationCenter {
    pub fn new(database: &Database, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repository: database.notifications.clone(),
            confirmations: database.notification_confirmations.clone(),
            members: database.members.clone(),
            publisher,
        }
    }

    pub fn notify_user(
        &self,
        schema: &SchemaName,
        user_id: u64,
        draft: NotificationDraft,
    ) -> Result<Notification, ServiceError> {
        let notification = Notification {
            id: 0,
            user_id,
            kind: draft.kind,
            title: draft.title,
            message: draft.message,
            link: draft.link,
            source_type: draft.source_type,
            source_id: draft.source_id,
            priority: draft.priority,
            require_confirmation: draft.require_confirmation,
            read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        let stored = self.repository.insert(schema, notification)?;

        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new("NOTIFICATION", format!("user-{user_id}"), json!(stored)),
        );
        Ok(stored)
    }

    pub fn notify_users(
        &self,
        schema: &SchemaName,
        user_ids: &[u64],
        draft: NotificationDraft,
    ) -> Result<Vec<Notification>, ServiceError> {
        user_ids
            .iter()
            .map(|user_id| self.notify_user(schema, *user_id, draft.clone()))
            .collect()
    }

    /// Notify every active member holding `role`.
    pub fn notify_by_role(
        &self,
        schema: &SchemaName,
        role: Role,
        draft: NotificationDraft,
    ) -> Result<Vec<Notification>, ServiceError> {
        let user_ids = active_user_ids(self.members.as_ref(), schema, Some(&[role]))?;
        tracing::info!(%schema, role = role.label(), recipients = user_ids.len(), "notifying role");
        self.notify_users(schema, &user_ids, draft)
    }

    pub fn broadcast_to_role(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: RoleBroadcast,
    ) -> Result<Vec<Notification>, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden(
                "only administrators can notify a role",
            ));
        }
        let mut draft = NotificationDraft::new(
            NotificationSource::System,
            require_text("title", &input.title)?,
            require_text("message", &input.message)?,
        )
        .kind(input.kind)
        .priority(input.priority);
        if let Some(link) = input.link {
            draft = draft.link(link);
        }
        if input.require_confirmation {
            draft = draft.require_confirmation();
        }
        self.notify_by_role(schema, input.role, draft)
    }

    /// Recipients of a tenant-wide or role-targeted message; every active member when `roles` is `None`.
    pub(crate) fn audience(
        &self,
        schema: &SchemaName,
        roles: Option<&[Role]>,
    ) -> Result<Vec<u64>, ServiceError> {
        Ok(active_user_ids(self.members.as_ref(), schema, roles)?)
    }

    /// Notify without surfacing failures to the caller.
    pub(crate) fn deliver(&self, schema: &SchemaName, user_id: u64, draft: NotificationDraft) {
        if let Err(err) = self.notify_user(schema, user_id, draft) {
            tracing::warn!(%schema, user_id, error = %err, "notification delivery failed");
        }
    }

    pub fn notifications_for(
        &self,
        schema: &SchemaName,
        user_id: u64,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError> {
        let mut notifications = self.repository.find(schema, &|notification| {
            notification.user_id == user_id && filter.matches(notification)
        })?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        notifications.truncate(filter.limit.unwrap_or(usize::MAX));
        Ok(notifications)
    }

    pub fn mark_read(
        &self,
        schema: &SchemaName,
        id: u64,
        actor: &Actor,
    ) -> Result<Notification, ServiceError> {
        self.repository.modify(schema, id, &mut |notification| {
            if notification.user_id != actor.user_id {
                return Err(ServiceError::forbidden(
                    "notifications can only be read by their recipient",
                ));
            }
            if !notification.read {
                notification.read = true;
                notification.read_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    /// Record that the recipient acknowledged a notification and mark it read.
    pub fn confirm(
        &self,
        schema: &SchemaName,
        id: u64,
        actor: &Actor,
    ) -> Result<NotificationConfirmation, ServiceError> {
        let notification = require(self.repository.as_ref(), schema, id)?;
        if notification.user_id != actor.user_id {
            return Err(ServiceError::forbidden(
                "notifications can only be confirmed by their recipient",
            ));
        }
        if !notification.require_confirmation {
            return Err(ServiceError::invalid_state(format!(
                "notification {id} does not ask for confirmation"
            )));
        }

        let receipt = NotificationConfirmation {
            id: 0,
            notification_id: id,
            user_id: actor.user_id,
            confirmed_at: Utc::now(),
        };
        let confirmation = match self.confirmations.insert_unique(schema, receipt, &|existing| {
            existing.notification_id == id && existing.user_id == actor.user_id
        }) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => self
                .confirmations
                .find(schema, &|existing| {
                    existing.notification_id == id && existing.user_id == actor.user_id
                })?
                .into_iter()
                .next()
                .ok_or_else(|| ServiceError::not_found("notification confirmation", id))?,
            Err(err) => return Err(err.into()),
        };
        self.mark_read(schema, id, actor)?;
        tracing::info!(%schema, notification_id = id, user_id = actor.user_id, "notification confirmed");
        Ok(confirmation)
    }

    pub fn confirmations_of(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Vec<NotificationConfirmation>, ServiceError> {
        let notification = require(self.repository.as_ref(), schema, id)?;
        if !actor.is_admin() && notification.user_id != actor.user_id {
            return Err(ServiceError::not_found("notification", id));
        }
        Ok(self
            .confirmations
            .find(schema, &|confirmation| confirmation.notification_id == id)?)
    }

    pub fn mark_all_read(&self, schema: &SchemaName, user_id: u64) -> Result<usize, ServiceError> {
        let unread = self.repository.find(schema, &|notification| {
            notification.user_id == user_id && !notification.read
        })?;
        let now = Utc::now();
        let mut count = 0;
        for notification in unread {
            let mut newly_read = false;
            self.repository.modify(schema, notification.id, &mut |notification| {
                newly_read = !notification.read;
                notification.read = true;
                notification.read_at.get_or_insert(now);
                Ok(())
            })?;
            if newly_read {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::RealtimeHub;

    fn center() -> (NotificationCenter, Arc<RealtimeHub>) {
        let hub = Arc::new(RealtimeHub::new());
        let center = NotificationCenter::new(&Database::in_memory(), hub.clone());
        (center, hub)
    }

    fn enrol(center: &NotificationCenter, user_id: u64, role: Role, active: bool) {
        let now = Utc::now();
        center
            .members
            .insert(
                &schema(),
                Member {
                    id: 0,
                    user_id,
                    name: format!("Usuario {user_id}"),
                    email: None,
                    phone: None,
                    role,
                    property_id: None,
                    active,
                    created_at: now,
                    updated_at: now,
                },
            )
            .expect("member stored");
    }

    fn schema() -> SchemaName {
        SchemaName::parse("tenant_a").expect("valid schema")
    }

    #[tokio::test]
    async fn notify_user_broadcasts_on_user_channel() {
        let (center, hub) = center();
        let mut receiver = hub.subscribe(&schema(), "user-7").expect("subscribe");

        let stored = center
            .notify_user(
                &schema(),
                7,
                NotificationDraft::new(NotificationSource::Pqr, "Ticket closed", "Resolved"),
            )
            .expect("notification stored");

        let event = receiver.recv().await.expect("event delivered");
        assert_eq!(event.event_type, "NOTIFICATION");
        assert_eq!(event.payload["id"], stored.id);
        assert_eq!(event.payload["source_type"], "PQR");
    }

    #[test]
    fn only_recipient_can_mark_read() {
        let (center, _) = center();
        let stored = center
            .notify_user(
                &schema(),
                7,
                NotificationDraft::new(NotificationSource::System, "Hello", "World"),
            )
            .expect("stored");

        let error = center
            .mark_read(&schema(), stored.id, &Actor::resident(8))
            .expect_err("other user rejected");
        assert!(matches!(error, ServiceError::Forbidden(_)));

        let read = center
            .mark_read(&schema(), stored.id, &Actor::resident(7))
            .expect("owner marks read");
        assert!(read.read);
        assert!(read.read_at.is_some());
    }

    #[test]
    fn mark_all_read_counts_only_unread() {
        let (center, _) = center();
        let draft = NotificationDraft::new(NotificationSource::System, "a", "b");
        center
            .notify_users(&schema(), &[7, 7, 9], draft)
            .expect("stored");

        assert_eq!(center.mark_all_read(&schema(), 7).expect("marked"), 2);
        assert_eq!(center.mark_all_read(&schema(), 7).expect("marked"), 0);
        assert_eq!(
            center
                .notifications_for(
                    &schema(),
                    9,
                    &NotificationFilter {
                        unread: true,
                        ..NotificationFilter::default()
                    }
                )
                .expect("listed")
                .len(),
            1
        );
    }

    #[test]
    fn role_notifications_reach_active_holders_only() {
        let (center, _) = center();
        enrol(&center, 20, Role::Staff, true);
        enrol(&center, 21, Role::Staff, false);
        enrol(&center, 22, Role::Resident, true);

        let sent = center
            .notify_by_role(
                &schema(),
                Role::Staff,
                NotificationDraft::new(NotificationSource::Security, "Ronda", "Turno nocturno"),
            )
            .expect("sent");
        let recipients: Vec<u64> = sent.iter().map(|notification| notification.user_id).collect();
        assert_eq!(recipients, vec![20]);

        let err = center
            .broadcast_to_role(
                &schema(),
                &Actor::resident(22),
                RoleBroadcast {
                    role: Role::Staff,
                    title: "x".to_string(),
                    message: "y".to_string(),
                    kind: NotificationKind::Info,
                    priority: NotificationPriority::Low,
                    link: None,
                    require_confirmation: false,
                },
            )
            .expect_err("residents cannot broadcast");
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn confirmation_is_recorded_once_and_marks_read() {
        let (center, _) = center();
        let plain = center
            .notify_user(
                &schema(),
                7,
                NotificationDraft::new(NotificationSource::System, "Hola", "Sin acuse"),
            )
            .expect("plain");
        let err = center
            .confirm(&schema(), plain.id, &Actor::resident(7))
            .expect_err("no confirmation asked");
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let asked = center
            .notify_user(
                &schema(),
                7,
                NotificationDraft::new(NotificationSource::Assembly, "Convocatoria", "Confirme")
                    .require_confirmation(),
            )
            .expect("asked");
        let err = center
            .confirm(&schema(), asked.id, &Actor::resident(8))
            .expect_err("not the recipient");
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let first = center
            .confirm(&schema(), asked.id, &Actor::resident(7))
            .expect("confirmed");
        let again = center
            .confirm(&schema(), asked.id, &Actor::resident(7))
            .expect("confirmed again");
        assert_eq!(first.id, again.id);
        assert_eq!(
            center
                .confirmations_of(&schema(), &Actor::admin(1), asked.id)
                .expect("receipts")
                .len(),
            1
        );
        let stored = require(center.repository.as_ref(), &schema(), asked.id).expect("stored");
        assert!(stored.read);
    }
}
