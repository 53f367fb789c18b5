use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::impl_entity;
use crate::tenancy::Role;

/// A user registered in the tenant, keyed by the gateway's `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<u64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Member, "member");

#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub user_id: u64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub property_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub property_id: Option<u64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub search: Option<String>,
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        let search = self
            .search
            .as_deref()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());
        self.role.map_or(true, |role| member.role == role)
            && self.active.map_or(true, |active| member.active == active)
            && search.map_or(true, |term| {
                member.name.to_lowercase().contains(&term)
                    || member
                        .email
                        .as_deref()
                        .is_some_and(|email| email.to_lowercase().contains(&term))
            })
    }
}
