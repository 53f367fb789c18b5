use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::center::{NotificationFilter, RoleBroadcast};
use super::{ActivityLogger, NotificationCenter};
use crate::error::{reply, ServiceError};
use crate::tenancy::{Actor, Tenant};

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub resource_type: Option<String>,
    pub resource_id: Option<u64>,
}

pub fn notification_router(center: Arc<NotificationCenter>) -> Router {
    Router::new()
        .route("/api/v1/notifications", get(list_handler))
        .route("/api/v1/notifications/read-all", post(read_all_handler))
        .route("/api/v1/notifications/by-role", post(by_role_handler))
        .route("/api/v1/notifications/:id/read", post(read_handler))
        .route("/api/v1/notifications/:id/confirm", post(confirm_handler))
        .route(
            "/api/v1/notifications/:id/confirmations",
            get(confirmations_handler),
        )
        .with_state(center)
}

pub fn activity_router(logger: Arc<ActivityLogger>) -> Router {
    Router::new()
        .route("/api/v1/activity", get(activity_handler))
        .with_state(logger)
}

async fn list_handler(
    State(center): State<Arc<NotificationCenter>>,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(filter): Query<NotificationFilter>,
) -> Response {
    reply(
        StatusCode::OK,
        center.notifications_for(&schema, actor.user_id, &filter),
    )
}

async fn read_handler(
    State(center): State<Arc<NotificationCenter>>,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, center.mark_read(&schema, id, &actor))
}

async fn confirm_handler(
    State(center): State<Arc<NotificationCenter>>,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::CREATED, center.confirm(&schema, id, &actor))
}

async fn confirmations_handler(
    State(center): State<Arc<NotificationCenter>>,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, center.confirmations_of(&schema, &actor, id))
}

async fn by_role_handler(
    State(center): State<Arc<NotificationCenter>>,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<RoleBroadcast>,
) -> Response {
    reply(
        StatusCode::CREATED,
        center.broadcast_to_role(&schema, &actor, input),
    )
}

async fn read_all_handler(
    State(center): State<Arc<NotificationCenter>>,
    Tenant(schema): Tenant,
    actor: Actor,
) -> Response {
    match center.mark_all_read(&schema, actor.user_id) {
        Ok(updated) => (StatusCode::OK, axum::Json(json!({ "updated": updated }))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn activity_handler(
    State(logger): State<Arc<ActivityLogger>>,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(query): Query<ActivityQuery>,
) -> Response {
    if !actor.is_admin() {
        return ServiceError::forbidden("activity log is restricted to administrators")
            .into_response();
    }
    reply(
        StatusCode::OK,
        logger.entries(&schema, query.resource_type.as_deref(), query.resource_id),
    )
}
