use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};

use super::domain::{NewReservation, ReasonBody, ReservationFilter, ReservationUpdate, StatusChange};
use super::service::ReservationService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<ReservationService>>;

/// Router builder for `/api/v1/reservations`.
pub fn reservation_router(service: Arc<ReservationService>) -> Router {
    Router::new()
        .route(
            "/api/v1/reservations",
            get(list_handler).post(create_handler),
        )
        .route(
            "/api/v1/reservations/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/api/v1/reservations/:id/status", put(status_handler))
        .route("/api/v1/reservations/:id/approve", post(approve_handler))
        .route("/api/v1/reservations/:id/reject", post(reject_handler))
        .route("/api/v1/reservations/:id/cancel", post(cancel_handler))
        .with_state(service)
}

async fn create_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewReservation>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_reservation(&schema, &actor, input),
    )
}

async fn list_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(filter): Query<ReservationFilter>,
) -> Response {
    reply(StatusCode::OK, service.list_reservations(&schema, &filter))
}

async fn get_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_reservation(&schema, id))
}

async fn update_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<ReservationUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_reservation(&schema, &actor, id, update),
    )
}

async fn delete_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.delete_reservation(&schema, &actor, id),
    )
}

async fn status_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(change): Json<StatusChange>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_status(&schema, &actor, id, change.status),
    )
}

async fn approve_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.approve(&schema, &actor, id))
}

async fn reject_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(body): Json<ReasonBody>,
) -> Response {
    reply(
        StatusCode::OK,
        service.reject(&schema, &actor, id, body.reason),
    )
}

async fn cancel_handler(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    body: Option<Json<ReasonBody>>,
) -> Response {
    let reason = body.and_then(|Json(body)| body.reason);
    reply(StatusCode::OK, service.cancel(&schema, &actor, id, reason))
}
