use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Approved => "APPROVED",
            ReservationStatus::Rejected => "REJECTED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Completed => "COMPLETED",
        }
    }

    /// Pending and approved bookings hold their time slot.
    pub fn blocks_slot(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Approved)
    }
}

/// Booking of a common area. `payment_amount` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: u64,
    pub common_area_id: u64,
    pub user_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ReservationStatus,
    pub attendees: u32,
    pub requires_payment: bool,
    pub payment_amount: Option<u64>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Reservation, "reservation");

impl Reservation {
    /// Half-open interval overlap: a booking ending at 10:00 does not clash with one starting then.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReservation {
    pub common_area_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_attendees")]
    pub attendees: u32,
    pub requires_payment: Option<bool>,
    pub payment_amount: Option<u64>,
}

fn default_attendees() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationUpdate {
    pub common_area_id: Option<u64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub attendees: Option<u32>,
    pub requires_payment: Option<bool>,
    pub payment_amount: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationFilter {
    pub common_area_id: Option<u64>,
    pub user_id: Option<u64>,
    pub status: Option<ReservationStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.common_area_id
            .map_or(true, |id| reservation.common_area_id == id)
            && self.user_id.map_or(true, |id| reservation.user_id == id)
            && self.status.map_or(true, |status| reservation.status == status)
            && self.from.map_or(true, |from| reservation.end_time > from)
            && self.to.map_or(true, |to| reservation.start_time < to)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReasonBody {
    pub reason: Option<String>,
}
