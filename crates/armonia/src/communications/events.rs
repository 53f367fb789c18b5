use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::domain::{
    AttendanceStatus, CommunityEvent, EventAttendee, EventFilter, EventUpdate, EventView,
    NewEvent, Visibility,
};
use super::service::ANNOUNCEMENTS_CHANNEL;
use crate::error::{require_text, ServiceError};
use crate::notifications::{
    publish, ActivityLogger, EventPublisher, NotificationCenter, NotificationDraft,
    NotificationSource, RealtimeEvent,
};
use crate::store::{require, Database, Repository};
use crate::tenancy::{Actor, Role, SchemaName};

fn admin_only(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "only administrators can {action} community events"
        )))
    }
}

fn check_schedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::validation(
            "end_time",
            "must be after start_time",
        ));
    }
    Ok(())
}

fn check_audience(visibility: Visibility, roles: &[Role]) -> Result<(), ServiceError> {
    if visibility == Visibility::RoleRestricted && roles.is_empty() {
        return Err(ServiceError::validation(
            "target_roles",
            "role restricted events need at least one role",
        ));
    }
    Ok(())
}

fn confirmed(attendees: &[EventAttendee]) -> usize {
    attendees
        .iter()
        .filter(|attendee| attendee.status == AttendanceStatus::Confirmed)
        .count()
}

/// Community calendar: events with role targeting, capacity and RSVPs.
pub struct EventService {
    events: Arc<dyn Repository<CommunityEvent>>,
    attendees: Arc<dyn Repository<EventAttendee>>,
    publisher: Arc<dyn EventPublisher>,
    notifications: Arc<NotificationCenter>,
    activity: Arc<ActivityLogger>,
}

impl EventService {
    pub fn new(
        database: &Database,
        publisher: Arc<dyn EventPublisher>,
        notifications: Arc<NotificationCenter>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            events: database.community_events.clone(),
            attendees: database.event_attendees.clone(),
            publisher,
            notifications,
            activity,
        }
    }

    pub fn create(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewEvent,
    ) -> Result<CommunityEvent, ServiceError> {
        admin_only(actor, "create")?;
        let title = require_text("title", &input.title)?;
        let location = require_text("location", &input.location)?;
        check_schedule(input.start_time, input.end_time)?;
        check_audience(input.visibility, &input.target_roles)?;
        if input.max_attendees == Some(0) {
            return Err(ServiceError::validation(
                "max_attendees",
                "must be at least 1",
            ));
        }

        let now = Utc::now();
        let stored = self.events.insert(
            schema,
            CommunityEvent {
                id: 0,
                title,
                description: input.description.trim().to_string(),
                location,
                start_time: input.start_time,
                end_time: input.end_time,
                event_type: input.event_type,
                visibility: input.visibility,
                target_roles: input.target_roles,
                max_attendees: input.max_attendees,
                organizer_id: actor.user_id,
                created_at: now,
                updated_at: now,
            },
        )?;

        tracing::info!(%schema, event_id = stored.id, start = %stored.start_time, "community event created");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_EVENT",
            "event",
            stored.id,
            json!({ "type": stored.event_type, "visibility": stored.visibility }),
        );

        let roles = match stored.visibility {
            Visibility::Public => None,
            Visibility::RoleRestricted => Some(stored.target_roles.as_slice()),
        };
        let draft = NotificationDraft::new(
            NotificationSource::System,
            "Nuevo evento",
            format!(
                "{} - {}",
                stored.title,
                stored.start_time.format("%d/%m/%Y")
            ),
        )
        .source_id(stored.id)
        .link(format!("/events/{}", stored.id));
        match self.notifications.audience(schema, roles) {
            Ok(audience) => {
                for user_id in audience {
                    self.notifications.deliver(schema, user_id, draft.clone());
                }
            }
            Err(err) => {
                tracing::warn!(%schema, event_id = stored.id, error = %err, "event audience lookup failed");
            }
        }
        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new("COMMUNITY_EVENT", ANNOUNCEMENTS_CHANNEL, json!(stored)),
        );
        Ok(stored)
    }

    pub fn update(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: EventUpdate,
    ) -> Result<CommunityEvent, ServiceError> {
        admin_only(actor, "edit")?;
        let attendees = self.attendees.as_ref();
        let stored = self.events.modify(schema, id, &mut |event| {
            if let Some(title) = &update.title {
                event.title = require_text("title", title)?;
            }
            if let Some(description) = &update.description {
                event.description = description.trim().to_string();
            }
            if let Some(location) = &update.location {
                event.location = require_text("location", location)?;
            }
            if let Some(start) = update.start_time {
                event.start_time = start;
            }
            if let Some(end) = update.end_time {
                event.end_time = end;
            }
            if let Some(kind) = update.event_type {
                event.event_type = kind;
            }
            if let Some(visibility) = update.visibility {
                event.visibility = visibility;
            }
            if let Some(roles) = &update.target_roles {
                event.target_roles = roles.clone();
            }
            if let Some(max) = update.max_attendees {
                let taken = confirmed(&attendees.find(schema, &|attendee| attendee.event_id == id)?);
                if max == 0 || (max as usize) < taken {
                    return Err(ServiceError::validation(
                        "max_attendees",
                        format!("must be at least 1 and not below the {taken} confirmed attendees"),
                    ));
                }
                event.max_attendees = Some(max);
            }
            check_schedule(event.start_time, event.end_time)?;
            check_audience(event.visibility, &event.target_roles)?;
            event.updated_at = Utc::now();
            Ok(())
        })?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_EVENT",
            "event",
            id,
            json!({}),
        );
        Ok(stored)
    }

    pub fn delete(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<CommunityEvent, ServiceError> {
        admin_only(actor, "delete")?;
        require(self.events.as_ref(), schema, id)?;
        for attendee in self.attendees.find(schema, &|attendee| attendee.event_id == id)? {
            self.attendees.delete(schema, attendee.id)?;
        }
        let removed = self.events.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_EVENT",
            "event",
            id,
            json!({}),
        );
        Ok(removed)
    }

    /// Events the caller may see. `upcoming` lists future events soonest first; otherwise newest first.
    pub fn list_for(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        filter: &EventFilter,
    ) -> Result<Vec<EventView>, ServiceError> {
        let now = Utc::now();
        let mut events = self.events.find(schema, &|event| {
            event.visible_to(actor)
                && filter.event_type.map_or(true, |kind| event.event_type == kind)
                && (!filter.upcoming || event.start_time >= now)
                && filter.from.map_or(true, |from| event.start_time >= from)
                && filter.to.map_or(true, |to| event.end_time <= to)
        })?;
        if filter.upcoming {
            events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        } else {
            events.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        }
        events.truncate(filter.limit.unwrap_or(usize::MAX));

        let attendees = self.attendees.list(schema)?;
        Ok(events
            .into_iter()
            .map(|event| {
                let rsvps: Vec<EventAttendee> = attendees
                    .iter()
                    .filter(|attendee| attendee.event_id == event.id)
                    .cloned()
                    .collect();
                let user_attendance = rsvps
                    .iter()
                    .find(|attendee| attendee.user_id == actor.user_id)
                    .cloned();
                EventView {
                    confirmed_attendees: confirmed(&rsvps),
                    user_attendance,
                    event,
                }
            })
            .collect())
    }

    /// Create or change the caller's RSVP. Confirming is refused once the event is full.
    pub fn register_attendance(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        event_id: u64,
        status: AttendanceStatus,
    ) -> Result<EventAttendee, ServiceError> {
        let event = require(self.events.as_ref(), schema, event_id)?;
        if !event.visible_to(actor) {
            return Err(ServiceError::not_found("event", event_id));
        }

        let attendees = self.attendees.as_ref();
        let mut recorded = None;
        self.events.modify(schema, event_id, &mut |event| {
            let rsvps = attendees.find(schema, &|attendee| attendee.event_id == event_id)?;
            let existing = rsvps
                .iter()
                .find(|attendee| attendee.user_id == actor.user_id)
                .cloned();
            let already_confirmed = existing
                .as_ref()
                .is_some_and(|attendee| attendee.status == AttendanceStatus::Confirmed);
            if status == AttendanceStatus::Confirmed && !already_confirmed {
                if let Some(max) = event.max_attendees {
                    if confirmed(&rsvps) >= max as usize {
                        return Err(ServiceError::conflict(
                            "the event has reached its maximum capacity",
                        ));
                    }
                }
            }
            let now = Utc::now();
            recorded = Some(match existing {
                Some(mut attendee) => {
                    attendee.status = status;
                    attendee.updated_at = now;
                    attendees.update(schema, attendee)?
                }
                None => attendees.insert(
                    schema,
                    EventAttendee {
                        id: 0,
                        event_id,
                        user_id: actor.user_id,
                        status,
                        updated_at: now,
                    },
                )?,
            });
            Ok(())
        })?;
        let attendee =
            recorded.ok_or_else(|| ServiceError::invalid_state("attendance was not recorded"))?;
        tracing::debug!(%schema, event_id, user_id = actor.user_id, status = ?attendee.status, "attendance registered");
        Ok(attendee)
    }
}
