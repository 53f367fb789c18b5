//! Tenant member directory: who lives or works in the complex, and under which role.

mod domain;
mod router;
mod service;

pub use domain::{Member, MemberFilter, MemberUpdate, NewMember};
pub use router::members_router;
pub(crate) use service::{active_user_ids, display_name};
pub use service::MemberService;
