use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::domain::{
    NewTicket, PqrComment, PqrStatus, PqrTicket, TicketDetail, TicketFilter, TicketUpdate,
};
use crate::error::{require_text, ServiceError};
use crate::notifications::{
    ActivityLogger, NotificationCenter, NotificationDraft, NotificationPriority,
    NotificationSource,
};
use crate::store::{require, Database, Repository};
use crate::tenancy::{Actor, Role, SchemaName};

/// Petitions, complaints and claims raised by residents.
pub struct PqrService {
    tickets: Arc<dyn Repository<PqrTicket>>,
    comments: Arc<dyn Repository<PqrComment>>,
    notifications: Arc<NotificationCenter>,
    activity: Arc<ActivityLogger>,
}

fn handles_tickets(actor: &Actor) -> bool {
    actor.is_admin() || actor.role == Role::Staff
}

impl PqrService {
    pub fn new(
        database: &Database,
        notifications: Arc<NotificationCenter>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            tickets: database.pqr_tickets.clone(),
            comments: database.pqr_comments.clone(),
            notifications,
            activity,
        }
    }

    /// Ticket visible to `actor`: residents only reach their own.
    fn visible(&self, schema: &SchemaName, actor: &Actor, id: u64) -> Result<PqrTicket, ServiceError> {
        let ticket = require(self.tickets.as_ref(), schema, id)?;
        if !handles_tickets(actor) && ticket.reported_by != actor.user_id {
            return Err(ServiceError::not_found("pqr ticket", id));
        }
        Ok(ticket)
    }

    fn staff_only(actor: &Actor, action: &str) -> Result<(), ServiceError> {
        if handles_tickets(actor) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!(
                "only staff can {action} tickets"
            )))
        }
    }

    pub fn list(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        filter: &TicketFilter,
    ) -> Result<Vec<PqrTicket>, ServiceError> {
        let search = filter
            .search
            .as_deref()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());
        let own_only = !handles_tickets(actor);

        let mut tickets = self.tickets.find(schema, &|ticket| {
            (!own_only || ticket.reported_by == actor.user_id)
                && filter.status.map_or(true, |status| ticket.status == status)
                && filter.priority.map_or(true, |priority| ticket.priority == priority)
                && search.as_ref().map_or(true, |term| {
                    ticket.subject.to_lowercase().contains(term)
                        || ticket.description.to_lowercase().contains(term)
                })
        })?;
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    pub fn get(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<TicketDetail, ServiceError> {
        let ticket = self.visible(schema, actor, id)?;
        let mut comments = self.comments.find(schema, &|comment| comment.ticket_id == id)?;
        comments.sort_by_key(|comment| (comment.created_at, comment.id));
        Ok(TicketDetail { ticket, comments })
    }

    pub fn create(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewTicket,
    ) -> Result<PqrTicket, ServiceError> {
        let subject = require_text("subject", &input.subject)?;
        let description = require_text("description", &input.description)?;
        let now = Utc::now();

        let stored = self.tickets.insert(
            schema,
            PqrTicket {
                id: 0,
                reported_by: actor.user_id,
                assigned_to: None,
                ticket_type: input.ticket_type,
                subject,
                description,
                category: input.category,
                status: PqrStatus::Open,
                priority: input.priority.unwrap_or_default(),
                created_at: now,
                updated_at: now,
                closed_at: None,
            },
        )?;

        tracing::info!(%schema, ticket_id = stored.id, "pqr ticket opened");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_PQR",
            "pqr",
            stored.id,
            json!({ "type": stored.ticket_type, "priority": stored.priority }),
        );
        Ok(stored)
    }

    pub fn update(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: TicketUpdate,
    ) -> Result<PqrTicket, ServiceError> {
        let mut ticket = self.visible(schema, actor, id)?;
        if ticket.status.is_terminal() {
            return Err(ServiceError::invalid_state(format!(
                "cannot edit a ticket with status {}",
                ticket.status.label()
            )));
        }
        if let Some(subject) = update.subject {
            ticket.subject = require_text("subject", &subject)?;
        }
        if let Some(description) = update.description {
            ticket.description = require_text("description", &description)?;
        }
        if update.category.is_some() {
            ticket.category = update.category;
        }
        if let Some(priority) = update.priority {
            ticket.priority = priority;
        }
        if let Some(ticket_type) = update.ticket_type {
            ticket.ticket_type = ticket_type;
        }
        ticket.updated_at = Utc::now();

        let stored = self.tickets.update(schema, ticket)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_PQR",
            "pqr",
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
    ) -> Result<PqrTicket, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("only administrators can delete tickets"));
        }
        require(self.tickets.as_ref(), schema, id)?;
        for comment in self.comments.find(schema, &|comment| comment.ticket_id == id)? {
            self.comments.delete(schema, comment.id)?;
        }
        let removed = self.tickets.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_PQR",
            "pqr",
            id,
            json!({}),
        );
        Ok(removed)
    }

    pub fn add_comment(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        comment: &str,
    ) -> Result<PqrComment, ServiceError> {
        let comment = require_text("comment", comment)?;
        let ticket = self.visible(schema, actor, id)?;

        let stored = self.comments.insert(
            schema,
            PqrComment {
                id: 0,
                ticket_id: ticket.id,
                author_id: actor.user_id,
                comment,
                created_at: Utc::now(),
            },
        )?;

        if ticket.reported_by != actor.user_id {
            self.notifications.deliver(
                schema,
                ticket.reported_by,
                NotificationDraft::new(
                    NotificationSource::Pqr,
                    "New reply on your request",
                    format!("\"{}\" has a new comment", ticket.subject),
                )
                .source_id(ticket.id),
            );
        }
        Ok(stored)
    }

    pub fn assign(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        assignee: u64,
    ) -> Result<PqrTicket, ServiceError> {
        Self::staff_only(actor, "assign")?;
        let mut ticket = require(self.tickets.as_ref(), schema, id)?;
        if ticket.status.is_terminal() {
            return Err(ServiceError::invalid_state(format!(
                "cannot assign a ticket with status {}",
                ticket.status.label()
            )));
        }
        ticket.assigned_to = Some(assignee);
        if ticket.status == PqrStatus::Open {
            ticket.status = PqrStatus::InProgress;
        }
        ticket.updated_at = Utc::now();

        let stored = self.tickets.update(schema, ticket)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "ASSIGN_PQR",
            "pqr",
            id,
            json!({ "assigned_to": assignee }),
        );
        self.notifications.deliver(
            schema,
            assignee,
            NotificationDraft::new(
                NotificationSource::Pqr,
                "Ticket assigned",
                format!("You are now responsible for \"{}\"", stored.subject),
            )
            .source_id(stored.id),
        );
        Ok(stored)
    }

    pub fn change_status(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        status: PqrStatus,
    ) -> Result<PqrTicket, ServiceError> {
        Self::staff_only(actor, "change the status of")?;
        let mut ticket = require(self.tickets.as_ref(), schema, id)?;
        let previous = ticket.status;
        if !previous.can_transition_to(status) {
            return Err(ServiceError::invalid_state(format!(
                "cannot move a ticket from {} to {}",
                previous.label(),
                status.label()
            )));
        }

        let now = Utc::now();
        ticket.status = status;
        ticket.updated_at = now;
        if status.is_terminal() {
            ticket.closed_at = Some(now);
        }
        let stored = self.tickets.update(schema, ticket)?;

        tracing::info!(%schema, ticket_id = id, from = previous.label(), to = status.label(), "pqr status changed");
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CHANGE_PQR_STATUS",
            "pqr",
            id,
            json!({ "from": previous, "to": status }),
        );
        let priority = if status.is_terminal() {
            NotificationPriority::High
        } else {
            NotificationPriority::Medium
        };
        self.notifications.deliver(
            schema,
            stored.reported_by,
            NotificationDraft::new(
                NotificationSource::Pqr,
                "Request updated",
                format!("\"{}\" is now {}", stored.subject, status.label()),
            )
            .priority(priority)
            .source_id(stored.id),
        );
        Ok(stored)
    }
}
