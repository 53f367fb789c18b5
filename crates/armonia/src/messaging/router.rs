use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use super::domain::{MessageQuery, NewConversation, NewMessage};
use super::service::MessagingService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<MessagingService>>;

/// Router builder for `/api/v1/messages`.
pub fn messaging_router(service: Arc<MessagingService>) -> Router {
    Router::new()
        .route(
            "/api/v1/messages/conversations",
            get(conversations).post(open_direct),
        )
        .route(
            "/api/v1/messages/conversations/:id/messages",
            get(messages).post(send),
        )
        .route("/api/v1/messages/:id/read", post(mark_read))
        .with_state(service)
}

async fn conversations(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
) -> Response {
    reply(StatusCode::OK, service.conversations_for(&schema, &actor))
}

async fn open_direct(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewConversation>,
) -> Response {
    reply(
        StatusCode::OK,
        service.direct_conversation(&schema, &actor, input.user_id),
    )
}

async fn messages(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Query(query): Query<MessageQuery>,
) -> Response {
    reply(StatusCode::OK, service.messages(&schema, &actor, id, &query))
}

async fn send(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<NewMessage>,
) -> Response {
    reply(StatusCode::CREATED, service.send(&schema, &actor, id, input))
}

async fn mark_read(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.mark_read(&schema, &actor, id))
}
