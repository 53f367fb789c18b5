use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{ListingFilter, ListingUpdate, NewListing, NewMessage, NewReport, Resolution};
use super::service::{MarketplaceService, MAX_IMAGE_BYTES};
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
}

type Service = State<Arc<MarketplaceService>>;

/// Router builder for `/api/v1/marketplace`.
pub fn marketplace_router(service: Arc<MarketplaceService>) -> Router {
    Router::new()
        .route(
            "/api/v1/marketplace/listings",
            get(list_listings).post(create_listing),
        )
        .route("/api/v1/marketplace/listings/report", post(report_listing))
        .route(
            "/api/v1/marketplace/listings/:id",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
        .route("/api/v1/marketplace/listings/:id/sold", post(mark_sold))
        .route("/api/v1/marketplace/moderation/reports", get(reported))
        .route(
            "/api/v1/marketplace/moderation/reports/:id/resolve",
            post(resolve_report),
        )
        .route("/api/v1/marketplace/messages", post(send_message))
        .route("/api/v1/marketplace/messages/:listing_id", get(messages))
        .route("/api/v1/marketplace/categories", get(categories))
        .route(
            "/api/v1/marketplace/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .with_state(service)
}

async fn create_listing(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewListing>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_listing(&schema, &actor, input),
    )
}

async fn list_listings(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(filter): Query<ListingFilter>,
) -> Response {
    reply(StatusCode::OK, service.list_listings(&schema, &filter))
}

async fn get_listing(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_listing(&schema, id))
}

async fn update_listing(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<ListingUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_listing(&schema, &actor, id, update),
    )
}

async fn delete_listing(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete_listing(&schema, &actor, id))
}

async fn mark_sold(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.mark_sold(&schema, &actor, id))
}

async fn report_listing(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewReport>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.report_listing(&schema, &actor, input),
    )
}

async fn reported(State(service): Service, Tenant(schema): Tenant, actor: Actor) -> Response {
    reply(StatusCode::OK, service.reported_listings(&schema, &actor))
}

async fn resolve_report(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(resolution): Json<Resolution>,
) -> Response {
    reply(
        StatusCode::OK,
        service.resolve_report(&schema, &actor, id, resolution),
    )
}

async fn send_message(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewMessage>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.send_message(&schema, &actor, input),
    )
}

async fn messages(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(listing_id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.messages_for(&schema, listing_id, actor.user_id),
    )
}

async fn categories(State(service): Service) -> Response {
    (StatusCode::OK, Json(service.categories())).into_response()
}

async fn upload_image(
    State(service): Service,
    Tenant(schema): Tenant,
    _actor: Actor,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.upload_image(&schema, &query.file_name, &body),
    )
}
