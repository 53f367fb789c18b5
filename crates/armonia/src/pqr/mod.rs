//! Petitions, complaints and claims (PQR) with comments and a status lifecycle.

mod domain;
mod router;
mod service;

pub use domain::{
    Assignment, NewComment, NewTicket, PqrComment, PqrPriority, PqrStatus, PqrTicket,
    TicketDetail, TicketFilter, TicketStatusChange, TicketType, TicketUpdate,
};
pub use router::pqr_router;
pub use service::PqrService;
