//! Tenant schema selection and caller identity.
//!
//! Each request names the tenant schema it operates on through `X-Tenant-Schema`. All
//! repositories key their rows by [`SchemaName`], so data never crosses tenants.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const TENANT_HEADER: &str = "x-tenant-schema";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const MAX_SCHEMA_LEN: usize = 63;

/// Validated tenant schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SchemaName(String);

impl SchemaName {
    pub fn parse(raw: &str) -> Result<Self, TenancyError> {
        let value = raw.trim();
        let mut chars = value.chars();
        let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let valid_tail =
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !valid_head || !valid_tail || value.len() > MAX_SCHEMA_LEN {
            return Err(TenancyError::InvalidSchema(value.to_string()));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SchemaName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        SchemaName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Allow-list of schemas a deployment serves. Installed as a request extension.
#[derive(Debug, Clone, Default)]
pub struct TenantDirectory {
    schemas: Arc<BTreeSet<SchemaName>>,
}

impl TenantDirectory {
    pub fn new(schemas: impl IntoIterator<Item = SchemaName>) -> Self {
        Self {
            schemas: Arc::new(schemas.into_iter().collect()),
        }
    }

    pub fn allows(&self, schema: &SchemaName) -> bool {
        self.schemas.contains(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenancyError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid tenant schema '{0}'")]
    InvalidSchema(String),
    #[error("tenant schema '{0}' is not served by this instance")]
    UnknownSchema(String),
    #[error("invalid user id '{0}'")]
    InvalidUser(String),
    #[error("unknown role '{0}'")]
    InvalidRole(String),
}

impl IntoResponse for TenancyError {
    fn into_response(self) -> Response {
        let status = match self {
            TenancyError::UnknownSchema(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Tenant schema resolved from the request headers.
#[derive(Debug, Clone)]
pub struct Tenant(pub SchemaName);

fn header_value<'a>(parts: &'a Parts, name: &'static str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = TenancyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = header_value(parts, TENANT_HEADER)
            .ok_or(TenancyError::MissingHeader(TENANT_HEADER))?;
        let schema = SchemaName::parse(raw)?;

        if let Some(directory) = parts.extensions.get::<TenantDirectory>() {
            if !directory.allows(&schema) {
                return Err(TenancyError::UnknownSchema(schema.0));
            }
        }

        Ok(Tenant(schema))
    }
}

/// Roles recognised across the tenant modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ComplexAdmin,
    Staff,
    Resident,
}

impl Role {
    pub fn parse(raw: &str) -> Result<Self, TenancyError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "COMPLEX_ADMIN" => Ok(Role::ComplexAdmin),
            "STAFF" => Ok(Role::Staff),
            "RESIDENT" => Ok(Role::Resident),
            _ => Err(TenancyError::InvalidRole(raw.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::ComplexAdmin => "COMPLEX_ADMIN",
            Role::Staff => "STAFF",
            Role::Resident => "RESIDENT",
        }
    }
}

/// Caller identity forwarded by the gateway in front of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: u64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: u64) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn resident(user_id: u64) -> Self {
        Self::new(user_id, Role::Resident)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::ComplexAdmin)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = TenancyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = header_value(parts, USER_ID_HEADER)
            .ok_or(TenancyError::MissingHeader(USER_ID_HEADER))?;
        let user_id = raw_id
            .parse::<u64>()
            .map_err(|_| TenancyError::InvalidUser(raw_id.to_string()))?;

        let role = match header_value(parts, USER_ROLE_HEADER) {
            Some(raw) => Role::parse(raw)?,
            None => Role::Resident,
        };

        Ok(Actor { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).expect("request builds").into_parts();
        parts
    }

    #[test]
    fn schema_names_follow_identifier_rules() {
        assert!(SchemaName::parse("tenant_01").is_ok());
        assert!(SchemaName::parse("  armonia ").is_ok());
        assert!(SchemaName::parse("").is_err());
        assert!(SchemaName::parse("1tenant").is_err());
        assert!(SchemaName::parse("Tenant").is_err());
        assert!(SchemaName::parse("tenant-a").is_err());
        assert!(SchemaName::parse(&"a".repeat(64)).is_err());
    }

    #[tokio::test]
    async fn tenant_extractor_requires_header() {
        let mut parts = parts_with(&[]);
        let err = Tenant::from_request_parts(&mut parts, &())
            .await
            .expect_err("missing header rejected");
        assert_eq!(err, TenancyError::MissingHeader(TENANT_HEADER));
    }

    #[tokio::test]
    async fn tenant_extractor_honours_directory() {
        let mut parts = parts_with(&[(TENANT_HEADER, "tenant_b")]);
        parts.extensions.insert(TenantDirectory::new([
            SchemaName::parse("tenant_a").expect("valid schema"),
        ]));
        let err = Tenant::from_request_parts(&mut parts, &())
            .await
            .expect_err("unknown schema rejected");
        assert!(matches!(err, TenancyError::UnknownSchema(_)));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn actor_defaults_to_resident_role() {
        let mut parts = parts_with(&[(USER_ID_HEADER, "42")]);
        let actor = Actor::from_request_parts(&mut parts, &())
            .await
            .expect("actor resolves");
        assert_eq!(actor, Actor::resident(42));
        assert!(!actor.is_admin());

        let mut parts = parts_with(&[(USER_ID_HEADER, "7"), (USER_ROLE_HEADER, "complex_admin")]);
        let actor = Actor::from_request_parts(&mut parts, &())
            .await
            .expect("actor resolves");
        assert!(actor.is_admin());
    }
}
