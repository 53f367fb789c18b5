use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use super::domain::{MemberFilter, MemberUpdate, NewMember};
use super::service::MemberService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<MemberService>>;

/// Router builder for `/api/v1/members`.
pub fn members_router(service: Arc<MemberService>) -> Router {
    Router::new()
        .route("/api/v1/members", get(list).post(create))
        .route(
            "/api/v1/members/:id",
            get(fetch).put(update).delete(remove),
        )
        .with_state(service)
}

async fn list(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(filter): Query<MemberFilter>,
) -> Response {
    reply(StatusCode::OK, service.list(&schema, &actor, &filter))
}

async fn create(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewMember>,
) -> Response {
    reply(StatusCode::CREATED, service.create(&schema, &actor, input))
}

async fn fetch(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get(&schema, &actor, id))
}

async fn update(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<MemberUpdate>,
) -> Response {
    reply(StatusCode::OK, service.update(&schema, &actor, id, update))
}

async fn remove(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete(&schema, &actor, id))
}
