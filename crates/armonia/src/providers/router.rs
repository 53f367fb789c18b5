use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use super::domain::{NewProvider, NewReview, ProviderFilter, ProviderUpdate};
use super::service::ProviderService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<ProviderService>>;

/// Router builder for `/api/v1/service-providers`.
pub fn providers_router(service: Arc<ProviderService>) -> Router {
    Router::new()
        .route("/api/v1/service-providers", get(list).post(create))
        .route(
            "/api/v1/service-providers/:id",
            get(fetch).put(update).delete(remove),
        )
        .route(
            "/api/v1/service-providers/:id/reviews",
            get(reviews).post(add_review),
        )
        .with_state(service)
}

async fn list(
    State(service): Service,
    Tenant(schema): Tenant,
    _actor: Actor,
    Query(filter): Query<ProviderFilter>,
) -> Response {
    reply(StatusCode::OK, service.list(&schema, &filter))
}

async fn create(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewProvider>,
) -> Response {
    reply(StatusCode::CREATED, service.create(&schema, &actor, input))
}

async fn fetch(
    State(service): Service,
    Tenant(schema): Tenant,
    _actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get(&schema, id))
}

async fn update(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<ProviderUpdate>,
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

async fn reviews(
    State(service): Service,
    Tenant(schema): Tenant,
    _actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.reviews_for(&schema, id))
}

async fn add_review(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<NewReview>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.add_review(&schema, &actor, id, input),
    )
}
