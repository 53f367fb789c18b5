use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::domain::{
    Announcement, AnnouncementFilter, AnnouncementRead, AnnouncementUpdate, AnnouncementView,
    NewAnnouncement, Visibility,
};
use crate::error::{require_text, ServiceError};
use crate::notifications::{publish, ActivityLogger, EventPublisher, RealtimeEvent};
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, Role, SchemaName};

pub const ANNOUNCEMENTS_CHANNEL: &str = "announcements";

fn admin_only(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "only administrators can {action} announcements"
        )))
    }
}

fn check_targeting(visibility: Visibility, roles: &[Role]) -> Result<(), ServiceError> {
    if visibility == Visibility::RoleRestricted && roles.is_empty() {
        return Err(ServiceError::validation(
            "target_roles",
            "role restricted announcements need at least one role",
        ));
    }
    Ok(())
}

pub struct AnnouncementService {
    announcements: Arc<dyn Repository<Announcement>>,
    reads: Arc<dyn Repository<AnnouncementRead>>,
    publisher: Arc<dyn EventPublisher>,
    activity: Arc<ActivityLogger>,
}

impl AnnouncementService {
    pub fn new(
        database: &Database,
        publisher: Arc<dyn EventPublisher>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            announcements: database.announcements.clone(),
            reads: database.announcement_reads.clone(),
            publisher,
            activity,
        }
    }

    pub fn create(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewAnnouncement,
    ) -> Result<Announcement, ServiceError> {
        admin_only(actor, "publish")?;
        let title = require_text("title", &input.title)?;
        let content = require_text("content", &input.content)?;
        check_targeting(input.visibility, &input.target_roles)?;
        let now = Utc::now();
        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(ServiceError::validation(
                "expires_at",
                "must be in the future",
            ));
        }

        let stored = self.announcements.insert(
            schema,
            Announcement {
                id: 0,
                title,
                content,
                announcement_type: input.announcement_type,
                visibility: input.visibility,
                target_roles: input.target_roles,
                requires_confirmation: input.requires_confirmation,
                expires_at: input.expires_at,
                created_by: actor.user_id,
                created_at: now,
                updated_at: now,
            },
        )?;

        tracing::info!(%schema, announcement_id = stored.id, "announcement published");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_ANNOUNCEMENT",
            "announcement",
            stored.id,
            json!({ "type": stored.announcement_type, "visibility": stored.visibility }),
        );
        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new("ANNOUNCEMENT", ANNOUNCEMENTS_CHANNEL, json!(stored)),
        );
        Ok(stored)
    }

    pub fn list_for(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        filter: &AnnouncementFilter,
    ) -> Result<Vec<AnnouncementView>, ServiceError> {
        let now = Utc::now();
        let read_ids: Vec<u64> = self
            .reads
            .find(schema, &|read| read.user_id == actor.user_id)?
            .into_iter()
            .map(|read| read.announcement_id)
            .collect();

        let mut announcements = self.announcements.find(schema, &|announcement| {
            announcement.visible_to(actor, now)
                && filter
                    .announcement_type
                    .map_or(true, |kind| announcement.announcement_type == kind)
        })?;
        announcements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let views = announcements
            .into_iter()
            .map(|announcement| {
                let read = read_ids.contains(&announcement.id);
                AnnouncementView { announcement, read }
            })
            .filter(|view| filter.read.map_or(true, |read| view.read == read))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(views)
    }

    pub fn update(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: AnnouncementUpdate,
    ) -> Result<Announcement, ServiceError> {
        admin_only(actor, "edit")?;
        let mut announcement = require(self.announcements.as_ref(), schema, id)?;
        if let Some(title) = update.title {
            announcement.title = require_text("title", &title)?;
        }
        if let Some(content) = update.content {
            announcement.content = require_text("content", &content)?;
        }
        if let Some(kind) = update.announcement_type {
            announcement.announcement_type = kind;
        }
        if let Some(visibility) = update.visibility {
            announcement.visibility = visibility;
        }
        if let Some(roles) = update.target_roles {
            announcement.target_roles = roles;
        }
        if let Some(requires_confirmation) = update.requires_confirmation {
            announcement.requires_confirmation = requires_confirmation;
        }
        if update.expires_at.is_some() {
            announcement.expires_at = update.expires_at;
        }
        check_targeting(announcement.visibility, &announcement.target_roles)?;
        announcement.updated_at = Utc::now();

        let stored = self.announcements.update(schema, announcement)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_ANNOUNCEMENT",
            "announcement",
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
    ) -> Result<Announcement, ServiceError> {
        admin_only(actor, "delete")?;
        require(self.announcements.as_ref(), schema, id)?;
        for read in self.reads.find(schema, &|read| read.announcement_id == id)? {
            self.reads.delete(schema, read.id)?;
        }
        let removed = self.announcements.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_ANNOUNCEMENT",
            "announcement",
            id,
            json!({}),
        );
        Ok(removed)
    }

    pub fn mark_read(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<AnnouncementRead, ServiceError> {
        let announcement = require(self.announcements.as_ref(), schema, id)?;
        if !announcement.visible_to(actor, Utc::now()) {
            return Err(ServiceError::not_found("announcement", id));
        }

        let existing = |reads: &dyn Repository<AnnouncementRead>| {
            reads
                .find(schema, &|read| {
                    read.announcement_id == id && read.user_id == actor.user_id
                })
                .map(|found| found.into_iter().next())
        };
        if let Some(read) = existing(self.reads.as_ref())? {
            return Ok(read);
        }

        let receipt = AnnouncementRead {
            id: 0,
            announcement_id: id,
            user_id: actor.user_id,
            read_at: Utc::now(),
        };
        match self.reads.insert_unique(schema, receipt, &|read| {
            read.announcement_id == id && read.user_id == actor.user_id
        }) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict) => existing(self.reads.as_ref())?
                .ok_or_else(|| ServiceError::not_found("announcement read", id)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn read_receipts(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Vec<AnnouncementRead>, ServiceError> {
        admin_only(actor, "audit")?;
        require(self.announcements.as_ref(), schema, id)?;
        let mut reads = self.reads.find(schema, &|read| read.announcement_id == id)?;
        reads.sort_by_key(|read| (read.read_at, read.id));
        Ok(reads)
    }
}
