use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use super::domain::{
    AnnouncementFilter, AnnouncementUpdate, AttendanceRequest, EventFilter, EventUpdate,
    NewAnnouncement, NewEvent,
};
use super::events::EventService;
use super::service::AnnouncementService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<AnnouncementService>>;
type Events = State<Arc<EventService>>;

/// Router builder for `/api/v1/announcements`.
pub fn announcements_router(service: Arc<AnnouncementService>) -> Router {
    Router::new()
        .route("/api/v1/announcements", get(list).post(create))
        .route("/api/v1/announcements/:id", put(update).delete(remove))
        .route("/api/v1/announcements/:id/read", post(mark_read))
        .route("/api/v1/announcements/:id/reads", get(read_receipts))
        .with_state(service)
}

async fn list(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(filter): Query<AnnouncementFilter>,
) -> Response {
    reply(StatusCode::OK, service.list_for(&schema, &actor, &filter))
}

async fn create(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewAnnouncement>,
) -> Response {
    reply(StatusCode::CREATED, service.create(&schema, &actor, input))
}

async fn update(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<AnnouncementUpdate>,
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

async fn mark_read(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.mark_read(&schema, &actor, id))
}

async fn read_receipts(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.read_receipts(&schema, &actor, id))
}

/// Router builder for `/api/v1/events`.
pub fn events_router(service: Arc<EventService>) -> Router {
    Router::new()
        .route("/api/v1/events", get(list_events).post(create_event))
        .route("/api/v1/events/:id", put(update_event).delete(remove_event))
        .route("/api/v1/events/:id/attendance", post(register_attendance))
        .with_state(service)
}

async fn list_events(
    State(service): Events,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(filter): Query<EventFilter>,
) -> Response {
    reply(StatusCode::OK, service.list_for(&schema, &actor, &filter))
}

async fn create_event(
    State(service): Events,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewEvent>,
) -> Response {
    reply(StatusCode::CREATED, service.create(&schema, &actor, input))
}

async fn update_event(
    State(service): Events,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<EventUpdate>,
) -> Response {
    reply(StatusCode::OK, service.update(&schema, &actor, id, update))
}

async fn remove_event(
    State(service): Events,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete(&schema, &actor, id))
}

async fn register_attendance(
    State(service): Events,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(request): Json<AttendanceRequest>,
) -> Response {
    reply(
        StatusCode::OK,
        service.register_attendance(&schema, &actor, id, request.status),
    )
}
