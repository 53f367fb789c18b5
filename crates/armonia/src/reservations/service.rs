use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::domain::{
    NewReservation, Reservation, ReservationFilter, ReservationStatus, ReservationUpdate,
};
use crate::error::{require_text, ServiceError};
use crate::inventory::CommonArea;
use crate::notifications::{
    ActivityLogger, NotificationCenter, NotificationDraft, NotificationKind, NotificationSource,
};
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

/// Common-area booking workflow.
pub struct ReservationService {
    reservations: Arc<dyn Repository<Reservation>>,
    common_areas: Arc<dyn Repository<CommonArea>>,
    notifications: Arc<NotificationCenter>,
    activity: Arc<ActivityLogger>,
}

/// Charge for a booking: hourly rate times the booked hours, rounded up to the next minor unit.
pub fn booking_charge(
    hourly_rate: u64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u64, ServiceError> {
    let minutes = (end - start).num_minutes().max(0) as u64;
    hourly_rate
        .checked_mul(minutes)
        .map(|total| total.div_ceil(60))
        .ok_or_else(|| ServiceError::validation("payment_amount", "booking charge is too large"))
}

/// Whether `other` holds time that `candidate` wants.
fn clashes(candidate: &Reservation, other: &Reservation) -> bool {
    candidate.status.blocks_slot()
        && other.common_area_id == candidate.common_area_id
        && other.status.blocks_slot()
        && other.overlaps(candidate.start_time, candidate.end_time)
}

fn booked(area: &CommonArea, err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Repository(RepositoryError::Conflict) => ServiceError::conflict(format!(
            "{} is already booked for part of that time",
            area.name
        )),
        other => other,
    }
}

fn expect_pending(reservation: &Reservation, action: &str) -> Result<(), ServiceError> {
    if reservation.status == ReservationStatus::Pending {
        Ok(())
    } else {
        Err(ServiceError::invalid_state(format!(
            "cannot {action} a reservation with status {}",
            reservation.status.label()
        )))
    }
}

impl ReservationService {
    pub fn new(
        database: &Database,
        notifications: Arc<NotificationCenter>,
        activity: Arc<ActivityLogger>,
    ) -> Self {
        Self {
            reservations: database.reservations.clone(),
            common_areas: database.common_areas.clone(),
            notifications,
            activity,
        }
    }

    fn bookable_area(&self, schema: &SchemaName, id: u64) -> Result<CommonArea, ServiceError> {
        let area = require(self.common_areas.as_ref(), schema, id)?;
        if !area.is_active {
            return Err(ServiceError::not_found("common area", id));
        }
        Ok(area)
    }

    /// Time window and capacity checks; overlap is enforced by the store on write.
    fn check_slot(
        area: &CommonArea,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        attendees: u32,
    ) -> Result<(), ServiceError> {
        if start >= end {
            return Err(ServiceError::validation(
                "end_time",
                "must be after start_time",
            ));
        }
        if attendees > area.capacity {
            return Err(ServiceError::validation(
                "attendees",
                format!("capacity exceeded: {} allows {}", area.name, area.capacity),
            ));
        }
        Ok(())
    }

    fn notify(&self, schema: &SchemaName, reservation: &Reservation, title: &str, message: String) {
        let kind = match reservation.status {
            ReservationStatus::Rejected | ReservationStatus::Cancelled => NotificationKind::Warning,
            _ => NotificationKind::Info,
        };
        self.notifications.deliver(
            schema,
            reservation.user_id,
            NotificationDraft::new(NotificationSource::Reservation, title, message)
                .kind(kind)
                .source_id(reservation.id)
                .link(format!("/reservations/{}", reservation.id)),
        );
    }

    pub fn create_reservation(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        input: NewReservation,
    ) -> Result<Reservation, ServiceError> {
        let title = require_text("title", &input.title)?;
        let area = self.bookable_area(schema, input.common_area_id)?;
        Self::check_slot(&area, input.start_time, input.end_time, input.attendees)?;

        let requires_payment = input
            .requires_payment
            .unwrap_or(area.hourly_rate.is_some());
        let payment_amount = match (requires_payment, input.payment_amount, area.hourly_rate) {
            (false, _, _) => None,
            (true, Some(amount), _) => Some(amount),
            (true, None, Some(rate)) => {
                Some(booking_charge(rate, input.start_time, input.end_time)?)
            }
            (true, None, None) => None,
        };
        let status = if area.requires_approval {
            ReservationStatus::Pending
        } else {
            ReservationStatus::Approved
        };

        let now = Utc::now();
        let candidate = Reservation {
            id: 0,
            common_area_id: area.id,
            user_id: actor.user_id,
            title,
            description: input.description,
            start_time: input.start_time,
            end_time: input.end_time,
            status,
            attendees: input.attendees,
            requires_payment,
            payment_amount,
            rejection_reason: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .reservations
            .insert_unique(schema, candidate.clone(), &|existing| {
                clashes(&candidate, existing)
            })
            .map_err(|err| booked(&area, err.into()))?;

        tracing::info!(
            %schema,
            reservation_id = stored.id,
            common_area_id = area.id,
            status = stored.status.label(),
            "reservation created"
        );
        self.activity.record(
            schema,
            Some(actor.user_id),
            "CREATE_RESERVATION",
            "reservation",
            stored.id,
            json!({ "common_area_id": area.id, "status": stored.status }),
        );
        let message = match stored.status {
            ReservationStatus::Approved => format!("Your booking of {} is confirmed", area.name),
            _ => format!("Your booking of {} is awaiting approval", area.name),
        };
        self.notify(schema, &stored, "Reservation received", message);
        Ok(stored)
    }

    pub fn list_reservations(
        &self,
        schema: &SchemaName,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, ServiceError> {
        let mut reservations = self
            .reservations
            .find(schema, &|reservation| filter.matches(reservation))?;
        reservations.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(reservations)
    }

    pub fn get_reservation(&self, schema: &SchemaName, id: u64) -> Result<Reservation, ServiceError> {
        require(self.reservations.as_ref(), schema, id)
    }

    fn owned(&self, schema: &SchemaName, actor: &Actor, id: u64) -> Result<Reservation, ServiceError> {
        let reservation = require(self.reservations.as_ref(), schema, id)?;
        if reservation.user_id != actor.user_id && !actor.is_admin() {
            return Err(ServiceError::forbidden(
                "only the owner or an administrator can modify this reservation",
            ));
        }
        Ok(reservation)
    }

    pub fn update_reservation(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        update: ReservationUpdate,
    ) -> Result<Reservation, ServiceError> {
        let current = self.owned(schema, actor, id)?;
        let reschedules = update.common_area_id.is_some()
            || update.start_time.is_some()
            || update.end_time.is_some()
            || update.attendees.is_some();
        let area_id = update.common_area_id.unwrap_or(current.common_area_id);
        let area = if reschedules {
            Some(self.bookable_area(schema, area_id)?)
        } else {
            None
        };

        let stored = self
            .reservations
            .modify_unique(
                schema,
                id,
                &mut |reservation| {
                    if let Some(title) = update.title.as_deref() {
                        reservation.title = require_text("title", title)?;
                    }
                    if update.description.is_some() {
                        reservation.description = update.description.clone();
                    }
                    reservation.common_area_id = area_id;
                    reservation.start_time = update.start_time.unwrap_or(reservation.start_time);
                    reservation.end_time = update.end_time.unwrap_or(reservation.end_time);
                    reservation.attendees = update.attendees.unwrap_or(reservation.attendees);
                    if let Some(requires_payment) = update.requires_payment {
                        reservation.requires_payment = requires_payment;
                    }
                    if update.payment_amount.is_some() {
                        reservation.payment_amount = update.payment_amount;
                    }
                    if let Some(area) = &area {
                        Self::check_slot(
                            area,
                            reservation.start_time,
                            reservation.end_time,
                            reservation.attendees,
                        )?;
                    }
                    reservation.updated_at = Utc::now();
                    Ok(())
                },
                &|changed, other| reschedules && clashes(changed, other),
            )
            .map_err(|err| match &area {
                Some(area) => booked(area, err),
                None => err,
            })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_RESERVATION",
            "reservation",
            id,
            json!({ "rescheduled": reschedules }),
        );
        Ok(stored)
    }

    pub fn update_status(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        status: ReservationStatus,
    ) -> Result<Reservation, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden(
                "only administrators can set a reservation status",
            ));
        }
        let mut previous = status;
        let stored = self.reservations.modify(schema, id, &mut |reservation| {
            previous = reservation.status;
            reservation.status = status;
            reservation.updated_at = Utc::now();
            Ok(())
        })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "UPDATE_RESERVATION_STATUS",
            "reservation",
            id,
            json!({ "from": previous, "to": status }),
        );
        self.notify(
            schema,
            &stored,
            "Reservation updated",
            format!("Your reservation is now {}", status.label()),
        );
        Ok(stored)
    }

    pub fn delete_reservation(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Reservation, ServiceError> {
        self.owned(schema, actor, id)?;
        let removed = self.reservations.delete(schema, id)?;
        self.activity.record(
            schema,
            Some(actor.user_id),
            "DELETE_RESERVATION",
            "reservation",
            id,
            json!({}),
        );
        Ok(removed)
    }

    pub fn approve(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
    ) -> Result<Reservation, ServiceError> {
        let stored = self.reservations.modify(schema, id, &mut |reservation| {
            expect_pending(reservation, "approve")?;
            reservation.status = ReservationStatus::Approved;
            reservation.updated_at = Utc::now();
            Ok(())
        })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "APPROVE_RESERVATION",
            "reservation",
            id,
            json!({}),
        );
        self.notify(
            schema,
            &stored,
            "Reservation approved",
            format!("Your reservation \"{}\" was approved", stored.title),
        );
        Ok(stored)
    }

    pub fn reject(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        reason: Option<String>,
    ) -> Result<Reservation, ServiceError> {
        let reason = require_text("reason", reason.as_deref().unwrap_or_default())?;
        let stored = self.reservations.modify(schema, id, &mut |reservation| {
            expect_pending(reservation, "reject")?;
            reservation.status = ReservationStatus::Rejected;
            reservation.rejection_reason = Some(reason.clone());
            reservation.updated_at = Utc::now();
            Ok(())
        })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "REJECT_RESERVATION",
            "reservation",
            id,
            json!({ "reason": reason }),
        );
        self.notify(
            schema,
            &stored,
            "Reservation rejected",
            format!("Your reservation \"{}\" was rejected: {reason}", stored.title),
        );
        Ok(stored)
    }

    pub fn cancel(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        id: u64,
        reason: Option<String>,
    ) -> Result<Reservation, ServiceError> {
        self.owned(schema, actor, id)?;
        let reason = reason.filter(|text| !text.trim().is_empty());
        let stored = self.reservations.modify(schema, id, &mut |reservation| {
            if !reservation.status.blocks_slot() {
                return Err(ServiceError::invalid_state(format!(
                    "cannot cancel a reservation with status {}",
                    reservation.status.label()
                )));
            }
            reservation.status = ReservationStatus::Cancelled;
            reservation.cancellation_reason = reason.clone();
            reservation.updated_at = Utc::now();
            Ok(())
        })?;

        self.activity.record(
            schema,
            Some(actor.user_id),
            "CANCEL_RESERVATION",
            "reservation",
            id,
            json!({ "by_owner": stored.user_id == actor.user_id }),
        );
        if stored.user_id != actor.user_id {
            self.notify(
                schema,
                &stored,
                "Reservation cancelled",
                format!("Your reservation \"{}\" was cancelled by the administration", stored.title),
            );
        }
        Ok(stored)
    }
}
