//! Common-area reservations with capacity, overlap and approval rules.

mod domain;
mod router;
mod service;

pub use domain::{
    NewReservation, ReasonBody, Reservation, ReservationFilter, ReservationStatus,
    ReservationUpdate, StatusChange,
};
pub use router::reservation_router;
pub use service::{booking_charge, ReservationService};
