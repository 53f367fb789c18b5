use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use super::domain::{Assignment, NewComment, NewTicket, TicketFilter, TicketStatusChange, TicketUpdate};
use super::service::PqrService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<PqrService>>;

/// Router builder for `/api/v1/pqr`.
pub fn pqr_router(service: Arc<PqrService>) -> Router {
    Router::new()
        .route("/api/v1/pqr", get(list).post(create))
        .route("/api/v1/pqr/:id", get(detail).put(update).delete(remove))
        .route("/api/v1/pqr/:id/comments", post(comment))
        .route("/api/v1/pqr/:id/assign", post(assign))
        .route("/api/v1/pqr/:id/status", put(change_status))
        .with_state(service)
}

async fn list(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(filter): Query<TicketFilter>,
) -> Response {
    reply(StatusCode::OK, service.list(&schema, &actor, &filter))
}

async fn create(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewTicket>,
) -> Response {
    reply(StatusCode::CREATED, service.create(&schema, &actor, input))
}

async fn detail(
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
    Json(update): Json<TicketUpdate>,
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

async fn comment(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<NewComment>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.add_comment(&schema, &actor, id, &input.comment),
    )
}

async fn assign(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<Assignment>,
) -> Response {
    reply(
        StatusCode::OK,
        service.assign(&schema, &actor, id, input.assigned_to),
    )
}

async fn change_status(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<TicketStatusChange>,
) -> Response {
    reply(
        StatusCode::OK,
        service.change_status(&schema, &actor, id, input.status),
    )
}
